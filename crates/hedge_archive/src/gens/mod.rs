//! AR archives used by Sonic Unleashed and Sonic Generations.
//!
//! An AR archive is a flat list of entries, each made of a small header, a null-terminated name and
//! the entry data aligned to the archive's padding. Large archives are split into numbered parts
//! (`ghz200.ar.00`, `ghz200.ar.01`, ...), each of which is a complete archive on its own. An ARL list
//! (`ghz200.arl`) next to them stores the size of every part and the name of every file.

pub mod read;
pub mod types;
pub mod write;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use derive_more::{Deref, DerefMut};
use tracing::{debug, info, instrument};

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::split::{split_archives, split_path, strip_split_suffix};

pub use types::{DEFAULT_PADDING, PFD_PADDING};
pub use write::GensWriteOptions;

/// Number of digits in the split suffix of AR parts
pub const SPLIT_DIGITS: usize = 2;

pub(crate) const FORMAT: &str = "AR";

/// An AR archive, or every part of a split AR archive, loaded into memory
#[derive(Debug, Clone, PartialEq, Eq, Deref, DerefMut)]
pub struct GensArchive {
    #[deref]
    #[deref_mut]
    archive: Archive,
    padding: u32,
}

impl Default for GensArchive {
    fn default() -> Self {
        Self::new(DEFAULT_PADDING)
    }
}

impl GensArchive {
    pub fn new(padding: u32) -> Self {
        Self {
            archive: Archive::new(),
            padding,
        }
    }

    pub fn from_archive(archive: Archive, padding: u32) -> Self {
        Self { archive, padding }
    }

    /// Alignment of entry data
    pub fn padding(&self) -> u32 {
        self.padding
    }

    pub fn set_padding(&mut self, padding: u32) {
        self.padding = padding;
    }

    pub fn into_archive(self) -> Archive {
        self.archive
    }

    /// Every physical file that makes up the archive at `path`
    ///
    /// Accepts `name.ar`, `name.arl` or any `name.ar.NN`. When `name.ar` exists it is returned on its
    /// own, otherwise the numbered parts are probed.
    pub fn split_archives(path: impl AsRef<Path>) -> Vec<PathBuf> {
        let path = path.as_ref();
        let base = Self::base_path(path);

        if path.extension().is_some_and(|e| e == "arl") || base != path {
            return split_archives(&base, SPLIT_DIGITS);
        }
        if path.is_file() {
            return vec![path.to_path_buf()];
        }
        split_archives(&base, SPLIT_DIGITS)
    }

    /// Load an archive from disk, following split parts and ARL lists
    #[instrument(skip(path), fields(path = %path.as_ref().display()), err)]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let parts = Self::split_archives(path);
        if parts.is_empty() {
            return Err(Error::IOError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no archive found at {}", path.display()),
            )));
        }

        let standalone = parts.len() == 1 && parts[0] == path;
        let list = Self::base_path(path).with_extension("arl");
        if !standalone && list.is_file() {
            let listed = Self::read_list(BufReader::new(File::open(&list)?))?;
            if listed.part_sizes.len() != parts.len() {
                return Err(Error::Integrity(format!(
                    "{} lists {} parts but {} were found",
                    list.display(),
                    listed.part_sizes.len(),
                    parts.len()
                )));
            }
        }

        let mut merged: Option<GensArchive> = None;
        for part in &parts {
            debug!("reading {}", part.display());
            let archive = Self::read(BufReader::new(File::open(part)?))?;
            match merged.as_mut() {
                Some(merged) => merged
                    .archive
                    .entries_mut()
                    .extend(archive.archive.into_entries()),
                None => merged = Some(archive),
            }
        }

        let mut archive = merged.unwrap_or_default();
        archive.mark_saved();
        info!("loaded {} files from {} parts", archive.len(), parts.len());
        Ok(archive)
    }

    /// Save the archive to disk
    ///
    /// Without a split size the archive is written to `path` as is. With one, the parts are written
    /// next to it as `path.00`, `path.01`, ... and, unless disabled, an ARL list as `path` with an
    /// `arl` extension.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()), err)]
    pub fn save(&mut self, path: impl AsRef<Path>, options: &GensWriteOptions) -> Result<()> {
        let path = path.as_ref();

        let Some(split_size) = options.split_size else {
            let writer = BufWriter::new(File::create(path)?);
            self.write(writer, options)?;
            return Ok(());
        };

        let base = Self::base_path(path);
        let parts = self.write_parts(split_size, options, |index| {
            Ok(BufWriter::new(File::create(split_path(&base, index, SPLIT_DIGITS))?))
        })?;

        if options.write_list {
            let writer = BufWriter::new(File::create(base.with_extension("arl"))?);
            Self::write_list(writer, &parts)?;
        }

        info!("wrote {} parts", parts.len());
        Ok(())
    }

    /// `name.ar` for any of `name.ar`, `name.arl` and `name.ar.NN`
    fn base_path(path: &Path) -> PathBuf {
        if path.extension().is_some_and(|e| e == "arl") {
            return path.with_extension("ar");
        }
        strip_split_suffix(path, SPLIT_DIGITS).unwrap_or_else(|| path.to_path_buf())
    }
}
