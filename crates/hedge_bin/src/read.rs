//! Endian-aware stream reading
//!

use binrw::BinRead;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{self, Read, Seek, SeekFrom};

use crate::{
    error::{Error, Result},
    pointer_table::decode_pointer_table,
    types::{Endian, Quaternion, Vector3, Vector4},
};

macro_rules! read_scalar {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $method:ident) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> Result<$ty> {
            let value = match self.endian {
                Endian::Little => self.inner.$method::<LittleEndian>(),
                Endian::Big => self.inner.$method::<BigEndian>(),
            };
            value.map_err(|e| self.map_io(e))
        }
    };
}

/// Reads scalars, aggregates and strings from a seekable stream
///
/// Every multi-byte read honors the endian currently set on the reader.
///
/// ```
/// # fn doit() -> hedge_bin::error::Result<()> {
/// use hedge_bin::{BinaryReader, Endian};
///
/// let mut reader = BinaryReader::new(std::io::Cursor::new([0x00, 0x01, 0x01, 0x00]), Endian::Big);
/// assert_eq!(reader.read_u16()?, 1);
///
/// reader.set_endian(Endian::Little);
/// assert_eq!(reader.read_u16()?, 1);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct BinaryReader<R: Read + Seek> {
    inner: R,
    endian: Endian,
}

impl<R: Read + Seek> BinaryReader<R> {
    /// Wrap a stream, reading multi-byte values in the given order
    pub fn new(inner: R, endian: Endian) -> Self {
        Self { inner, endian }
    }

    /// The byte order currently used for reads
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Change the byte order for all following reads
    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Run `f` with a temporary byte order, restoring the previous one afterwards
    pub fn with_endian<T>(
        &mut self,
        endian: Endian,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = std::mem::replace(&mut self.endian, endian);
        let result = f(self);
        self.endian = previous;
        result
    }

    /// Current absolute position
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Total length of the underlying stream
    pub fn len(&mut self) -> Result<u64> {
        let resume = self.inner.stream_position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(resume))?;
        Ok(end)
    }

    /// Whether the underlying stream holds no bytes at all
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Seek to an absolute position
    pub fn seek_to(&mut self, position: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Seek relative to the current position
    pub fn seek_by(&mut self, delta: i64) -> Result<()> {
        self.inner.seek(SeekFrom::Current(delta))?;
        Ok(())
    }

    /// Skip forward until the position is a multiple of `alignment`
    pub fn align(&mut self, alignment: u64) -> Result<()> {
        if alignment > 1 {
            let position = self.position()?;
            let remainder = position % alignment;
            if remainder != 0 {
                self.seek_to(position + alignment - remainder)?;
            }
        }
        Ok(())
    }

    /// Jump to `offset`, run `f`, then return to where the reader was
    pub fn read_at<T>(&mut self, offset: u64, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let resume = self.position()?;
        self.seek_to(offset)?;
        let result = f(self);
        self.seek_to(resume)?;
        result
    }

    /// Unwrap and return the inner stream
    ///
    /// The position of the stream is wherever the last read left it.
    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let value = self.inner.read_u8();
        value.map_err(|e| self.map_io(e))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        let value = self.inner.read_i8();
        value.map_err(|e| self.map_io(e))
    }

    read_scalar!(read_u16, u16, read_u16);
    read_scalar!(read_i16, i16, read_i16);
    read_scalar!(read_u32, u32, read_u32);
    read_scalar!(read_i32, i32, read_i32);
    read_scalar!(read_u64, u64, read_u64);
    read_scalar!(read_i64, i64, read_i64);
    read_scalar!(read_f32, f32, read_f32);
    read_scalar!(read_f64, f64, read_f64);

    pub fn read_vector3(&mut self) -> Result<Vector3> {
        self.read_struct()
    }

    pub fn read_vector4(&mut self) -> Result<Vector4> {
        self.read_struct()
    }

    pub fn read_quaternion(&mut self) -> Result<Quaternion> {
        self.read_struct()
    }

    /// Read any [`BinRead`] type using the reader's current byte order
    pub fn read_struct<T>(&mut self) -> Result<T>
    where
        T: BinRead,
        for<'a> T::Args<'a>: Default,
    {
        let value = T::read_options(&mut self.inner, self.endian.into(), Default::default());
        match value {
            Ok(value) => Ok(value),
            Err(e) if is_eof(&e) => Err(Error::UnexpectedEndOfData {
                position: self.inner.stream_position().unwrap_or_default(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Read exactly `count` bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; count];
        let value = self.inner.read_exact(&mut buffer);
        value.map_err(|e| self.map_io(e))?;
        Ok(buffer)
    }

    /// Read a null-terminated UTF-8 string, consuming the terminator
    pub fn read_cstring(&mut self) -> Result<String> {
        let start = self.position()?;
        let mut raw = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                c => raw.push(c),
            }
        }
        String::from_utf8(raw).map_err(|_| Error::InvalidString { position: start })
    }

    /// Read a string stored in a fixed-size, null-padded slot
    pub fn read_fixed_string(&mut self, size: usize) -> Result<String> {
        let start = self.position()?;
        let mut raw = self.read_bytes(size)?;
        if let Some(end) = raw.iter().position(|&c| c == 0) {
            raw.truncate(end);
        }
        String::from_utf8(raw).map_err(|_| Error::InvalidString { position: start })
    }

    /// Read and decode a packed pointer table of `size` bytes at the current position
    pub fn read_pointer_table(&mut self, size: usize, base: u32) -> Result<Vec<u32>> {
        let table = self.read_bytes(size)?;
        decode_pointer_table(&table, base)
    }

    fn map_io(&mut self, error: io::Error) -> Error {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEndOfData {
                position: self.inner.stream_position().unwrap_or_default(),
            }
        } else {
            error.into()
        }
    }
}

fn is_eof(error: &binrw::Error) -> bool {
    matches!(error.root_cause(), binrw::Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
}
