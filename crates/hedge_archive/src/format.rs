//! Format detection and dispatch over every supported archive type.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use derive_more::Display;
use tracing::{debug, instrument};

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::gens::{GensArchive, GensWriteOptions};
use crate::one::OneArchive;
use crate::pac::{PacArchive, PacWriteOptions};
use crate::split::strip_split_suffix;
use crate::storybook::StorybookArchive;
use crate::u8::{U8Archive, U8WriteOptions};

/// Every archive format this crate reads and writes
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    /// AR archives, `.ar`, `.pfd` and split `.ar.NN` with `.arl` lists
    #[display("AR")]
    Gens,

    /// PACx archives, `.pac` and split `.pac.NNN`
    #[display("PACx")]
    Pac,

    /// Heroes and Shadow ONE archives
    #[display("ONE")]
    One,

    /// U8 archives, `.arc`
    #[display("U8")]
    U8,

    /// Storybook ONE archives
    #[display("Storybook ONE")]
    Storybook,
}

const GENS_SIGNATURE: [u8; 12] = [0, 0, 0, 0, 0x10, 0, 0, 0, 0x14, 0, 0, 0];
const ONE_MAGICS: [u32; 4] = [0x1400FFFF, 0x1003FFFF, 0x1C020037, 0x1C020020];

impl Format {
    /// Guess the format of the file at `path`
    ///
    /// The first bytes decide when they carry a known signature, otherwise the extension does.
    #[instrument(skip(path), fields(path = %path.as_ref().display()), err)]
    pub fn detect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut head = Vec::with_capacity(16);
        if path.is_file() {
            File::open(path)?.take(16).read_to_end(&mut head)?;
        }

        let format = Self::from_magic(&head)
            .or_else(|| Self::from_extension(path))
            .ok_or_else(|| {
                Error::CustomError(format!("unable to detect the format of {}", path.display()))
            })?;
        debug!("detected {format}");
        Ok(format)
    }

    /// Format identified by the first bytes of a file
    pub fn from_magic(head: &[u8]) -> Option<Self> {
        let le = |at: usize| {
            head.get(at..at + 4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        };
        let be = |at: usize| {
            head.get(at..at + 4)
                .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        };

        if head.starts_with(b"PACx") {
            Some(Format::Pac)
        } else if head.starts_with(&GENS_SIGNATURE) || head.starts_with(b"ARL2") {
            Some(Format::Gens)
        } else if be(0) == Some(0x55AA382D) {
            Some(Format::U8)
        } else if le(0) == Some(0) && le(8).is_some_and(|m| ONE_MAGICS.contains(&m)) {
            Some(Format::One)
        } else if be(4) == Some(0x10) && be(12) == Some(0) {
            Some(Format::Storybook)
        } else {
            None
        }
    }

    /// Format identified by a file's extension, ignoring split suffixes
    pub fn from_extension(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let path = strip_split_suffix(path, 3)
            .or_else(|| strip_split_suffix(path, 2))
            .unwrap_or_else(|| path.to_path_buf());

        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "ar" | "arl" | "pfd" => Some(Format::Gens),
            "pac" => Some(Format::Pac),
            "one" => Some(Format::One),
            "arc" | "u8" => Some(Format::U8),
            _ => None,
        }
    }

    /// Whether the format can spread an archive over several files
    pub const fn supports_splits(self) -> bool {
        matches!(self, Format::Gens | Format::Pac)
    }
}

/// An archive of any supported format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnyArchive {
    Gens(GensArchive),
    Pac(PacArchive),
    One(OneArchive),
    U8(U8Archive),
    Storybook(StorybookArchive),
}

impl AnyArchive {
    /// An empty archive with the default settings of `format`
    pub fn new(format: Format) -> Self {
        match format {
            Format::Gens => AnyArchive::Gens(GensArchive::default()),
            Format::Pac => AnyArchive::Pac(PacArchive::default()),
            Format::One => AnyArchive::One(OneArchive::default()),
            Format::U8 => AnyArchive::U8(U8Archive::default()),
            Format::Storybook => AnyArchive::Storybook(StorybookArchive::default()),
        }
    }

    /// Load an archive, following split parts for the formats that have them
    pub fn load(format: Format, path: impl AsRef<Path>) -> Result<Self> {
        Ok(match format {
            Format::Gens => AnyArchive::Gens(GensArchive::load(path)?),
            Format::Pac => AnyArchive::Pac(PacArchive::load(path)?),
            Format::One => AnyArchive::One(OneArchive::load(path)?),
            Format::U8 => AnyArchive::U8(U8Archive::load(path)?),
            Format::Storybook => AnyArchive::Storybook(StorybookArchive::load(path)?),
        })
    }

    /// Save the archive, keeping the settings it was loaded or created with
    ///
    /// A split size is only accepted by formats that support splitting.
    pub fn save(&mut self, path: impl AsRef<Path>, split_size: Option<u64>) -> Result<()> {
        let format = self.format();
        if split_size.is_some() && !format.supports_splits() {
            return Err(Error::not_implemented("split saving", format.to_string()));
        }

        match self {
            AnyArchive::Gens(archive) => {
                let options = GensWriteOptions::builder()
                    .padding(archive.padding())
                    .maybe_split_size(split_size)
                    .build();
                archive.save(path, &options)
            }
            AnyArchive::Pac(archive) => {
                let options = PacWriteOptions::builder()
                    .endian(archive.endian())
                    .uid(archive.uid())
                    .maybe_split_size(split_size)
                    .build();
                archive.save(path, &options)
            }
            AnyArchive::One(archive) => archive.save(path),
            AnyArchive::U8(archive) => archive.save(path, &U8WriteOptions::default()),
            AnyArchive::Storybook(archive) => archive.save(path),
        }
    }

    /// Every physical file that makes up the archive at `path`
    pub fn split_archives(format: Format, path: impl AsRef<Path>) -> Vec<PathBuf> {
        let path = path.as_ref();
        match format {
            Format::Gens => GensArchive::split_archives(path),
            Format::Pac => PacArchive::split_archives(path),
            _ if path.is_file() => vec![path.to_path_buf()],
            _ => Vec::new(),
        }
    }

    pub fn format(&self) -> Format {
        match self {
            AnyArchive::Gens(_) => Format::Gens,
            AnyArchive::Pac(_) => Format::Pac,
            AnyArchive::One(_) => Format::One,
            AnyArchive::U8(_) => Format::U8,
            AnyArchive::Storybook(_) => Format::Storybook,
        }
    }

    pub fn archive(&self) -> &Archive {
        match self {
            AnyArchive::Gens(archive) => &**archive,
            AnyArchive::Pac(archive) => &**archive,
            AnyArchive::One(archive) => &**archive,
            AnyArchive::U8(archive) => &**archive,
            AnyArchive::Storybook(archive) => &**archive,
        }
    }

    pub fn archive_mut(&mut self) -> &mut Archive {
        match self {
            AnyArchive::Gens(archive) => &mut **archive,
            AnyArchive::Pac(archive) => &mut **archive,
            AnyArchive::One(archive) => &mut **archive,
            AnyArchive::U8(archive) => &mut **archive,
            AnyArchive::Storybook(archive) => &mut **archive,
        }
    }
}
