//! PACx archives used by Sonic Forces.
//!
//! A PACx archive indexes its files with two levels of prefix-sharing node trees: a type tree whose
//! names are `extension:ResourceType`, each pointing at a file tree whose names are file stems. Every
//! pointer in the file is listed in a packed pointer table at the end so the game can relocate it.
//!
//! | Section        | Contents                                                   |
//! |----------------|------------------------------------------------------------|
//! | Header         | `PACx301` + endian marker, section sizes, kind flags       |
//! | Node trees     | type tree followed by one file tree per type               |
//! | Split table    | names of the split parts (root archives with splits only)  |
//! | Data entries   | size, pointer and kind of every file                       |
//! | String table   | node and split names                                       |
//! | Data           | file contents, each aligned to 16 bytes                    |
//! | Pointer table  | location of every pointer, see [`hedge_bin::pointer_table`] |
//!
//! Large archives keep some file types in the root (`name.pac`) and move the rest into numbered parts
//! (`name.pac.000`, `name.pac.001`, ...). The root lists the parts and keeps proxy entries for the files
//! they hold.

pub mod read;
pub mod types;
pub mod write;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Component, Path, PathBuf};

use derive_more::{Deref, DerefMut};
use hedge_bin::Endian;
use tracing::{debug, info, instrument};

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::split::{split_archives, split_path, strip_split_suffix};

pub use write::PacWriteOptions;

/// Number of digits in the split suffix of PACx parts
pub const SPLIT_DIGITS: usize = 3;

pub(crate) const FORMAT: &str = "PACx";

/// A PACx archive, including the files of its split parts when loaded from a root
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut)]
pub struct PacArchive {
    #[deref]
    #[deref_mut]
    archive: Archive,
    uid: u32,
    endian: Endian,
    split_names: Vec<String>,
}

impl PacArchive {
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            ..Default::default()
        }
    }

    pub fn from_archive(archive: Archive, endian: Endian) -> Self {
        Self {
            archive,
            endian,
            ..Default::default()
        }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// File names of the split parts listed by the root archive
    pub fn split_names(&self) -> &[String] {
        &self.split_names
    }

    pub fn into_archive(self) -> Archive {
        self.archive
    }

    /// Every physical file that makes up the archive at `path`: the root followed by its parts
    ///
    /// For a split part only the part itself is returned.
    pub fn split_archives(path: impl AsRef<Path>) -> Vec<PathBuf> {
        let path = path.as_ref();
        if strip_split_suffix(path, SPLIT_DIGITS).is_some() {
            return if path.is_file() {
                vec![path.to_path_buf()]
            } else {
                Vec::new()
            };
        }

        let mut parts = Vec::new();
        if path.is_file() {
            parts.push(path.to_path_buf());
        }
        parts.extend(split_archives(path, SPLIT_DIGITS));
        parts
    }

    /// Load an archive from disk
    ///
    /// Loading a root also loads every part it lists, while loading a part yields only its own files.
    #[instrument(skip(path), fields(path = %path.as_ref().display()), err)]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut archive = Self::read(BufReader::new(File::open(path)?))?;

        let directory = path.parent().unwrap_or_else(|| Path::new(""));
        for name in archive.split_names.clone() {
            let part_path = directory.join(part_file_name(&name)?);
            debug!("reading {}", part_path.display());
            let part = Self::read(BufReader::new(File::open(&part_path)?))?;
            if part.uid != archive.uid {
                return Err(Error::Integrity(format!(
                    "{name} belongs to archive {:#X}, not {:#X}",
                    part.uid, archive.uid
                )));
            }
            archive
                .archive
                .entries_mut()
                .extend(part.archive.into_entries());
        }

        archive.mark_saved();
        info!(
            "loaded {} files from {} parts",
            archive.len(),
            archive.split_names.len() + 1
        );
        Ok(archive)
    }

    /// Save the archive to disk
    ///
    /// With a split size, parts are written next to `path` as `path.000`, `path.001`, ... and the root
    /// at `path` lists them.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()), err)]
    pub fn save(&mut self, path: impl AsRef<Path>, options: &PacWriteOptions) -> Result<()> {
        let path = path.as_ref();

        let Some(split_size) = options.split_size else {
            let writer = BufWriter::new(File::create(path)?);
            return self.write(writer, options);
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::CustomError(format!("{} has no file name", path.display())))?;

        let files = self.pac_files()?;
        let plan = Self::plan_splits(files, split_size)?;
        let split_names = write::write_split(&plan, options, |index| {
            Ok(match index {
                Some(index) => {
                    let part = split_path(path, index, SPLIT_DIGITS);
                    let name = format!("{file_name}.{index:03}");
                    (BufWriter::new(File::create(part)?), name)
                }
                None => (BufWriter::new(File::create(path)?), file_name.clone()),
            })
        })?;

        info!("wrote root and {} parts", split_names.len());
        self.uid = options.uid;
        self.endian = options.endian;
        self.split_names = split_names;
        self.mark_saved();
        Ok(())
    }
}

/// A part named by a root's split table, which has to be a file beside the root
fn part_file_name(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(path),
        _ => Err(Error::Integrity(format!("split part {name:?} is not a file name"))),
    }
}
