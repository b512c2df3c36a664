//! Small value types shared by readers and writers.

use binrw::{BinRead, BinWrite};

/// Byte order of multi-byte values
///
/// PC and Xbox 360 era files mostly use little endian, while Wii, Wii U and PS3 builds use big endian.
/// Some files embed a big endian sub-header inside an otherwise little endian stream, so the order is
/// chosen per stream and can be flipped at any point.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Endian {
    /// Least significant byte first
    #[default]
    Little,

    /// Most significant byte first
    Big,
}

impl Endian {
    /// The marker byte used by signature headers (`'L'` or `'B'`)
    pub const fn marker(self) -> u8 {
        match self {
            Endian::Little => b'L',
            Endian::Big => b'B',
        }
    }

    /// Parse a signature header marker byte
    pub const fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'L' => Some(Endian::Little),
            b'B' => Some(Endian::Big),
            _ => None,
        }
    }
}

impl From<Endian> for binrw::Endian {
    fn from(value: Endian) -> Self {
        match value {
            Endian::Little => binrw::Endian::Little,
            Endian::Big => binrw::Endian::Big,
        }
    }
}

impl From<binrw::Endian> for Endian {
    fn from(value: binrw::Endian) -> Self {
        match value {
            binrw::Endian::Little => Endian::Little,
            binrw::Endian::Big => Endian::Big,
        }
    }
}

/// Three packed `f32` components (12 bytes)
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Four packed `f32` components (16 bytes)
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
pub struct Vector4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

/// A rotation stored as four packed `f32` components (16 bytes)
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}
