//! ONE archives used by Sonic Heroes and Shadow the Hedgehog.
//!
//! Both games share the extension and the first 12 bytes, but the magic stored in those bytes selects
//! one of two unrelated layouts.
//!
//! | Magic        | Layout | Index                                          |
//! |--------------|--------|------------------------------------------------|
//! | `0x1400FFFF` | Heroes | 256 name slots of 64 bytes, then records       |
//! | `0x1003FFFF` | Heroes | same, used by early builds                     |
//! | `0x1C020037` | Shadow | version string, then 0x38 byte entries         |
//! | `0x1C020020` | Shadow | same, older version string                     |
//!
//! Game data stored in Heroes archives is PRS compressed; the bytes are kept as they are.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use derive_more::{Deref, DerefMut};
use hedge_bin::{BinaryReader, BinaryWriter, Endian};
use tracing::{debug, instrument, trace};

use crate::archive::{Archive, ArchiveFile};
use crate::error::{fit_u32, Error, Result};

pub(crate) const FORMAT: &str = "ONE";

/// Size of the header shared by both layouts
const COMMON_HEADER_SIZE: u64 = 0xC;

/// Number of name slots in a Heroes archive
const HEROES_NAME_SLOTS: usize = 256;
/// Size of a Heroes name slot
const HEROES_NAME_SIZE: usize = 64;
/// Name slots 0 and 1 are never used
const HEROES_FIRST_NAME: usize = 2;
/// Offset of the first Heroes record
const HEROES_RECORDS_START: u64 = 0x18 + (HEROES_NAME_SLOTS * HEROES_NAME_SIZE) as u64;

/// Size of the version string in a Shadow archive
const SHADOW_VERSION_SIZE: usize = 16;
/// Size of a Shadow entry name
const SHADOW_NAME_SIZE: usize = 0x2C;
/// Size of a Shadow entry
const SHADOW_ENTRY_SIZE: u64 = SHADOW_NAME_SIZE as u64 + 12;
/// Most files a Shadow archive can hold
const SHADOW_MAX_FILES: usize = 255;

/// Magic value identifying the layout and version of a ONE archive
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum OneMagic {
    /// Sonic Heroes retail
    #[default]
    Heroes = 0x1400FFFF,

    /// Sonic Heroes early builds
    HeroesPrototype = 0x1003FFFF,

    /// Shadow the Hedgehog, `One Ver 0.60`
    Shadow060 = 0x1C020037,

    /// Shadow the Hedgehog, `One Ver 0.50`
    Shadow050 = 0x1C020020,
}

impl OneMagic {
    pub const fn is_shadow(self) -> bool {
        matches!(self, OneMagic::Shadow060 | OneMagic::Shadow050)
    }

    /// Version string stored by the Shadow layout
    pub const fn version_string(self) -> &'static str {
        match self {
            OneMagic::Shadow050 => "One Ver 0.50",
            _ => "One Ver 0.60",
        }
    }
}

impl TryFrom<u32> for OneMagic {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0x1400FFFF => Ok(OneMagic::Heroes),
            0x1003FFFF => Ok(OneMagic::HeroesPrototype),
            0x1C020037 => Ok(OneMagic::Shadow060),
            0x1C020020 => Ok(OneMagic::Shadow050),
            _ => Err(Error::invalid(FORMAT, format!("unknown magic {value:#010X}"))),
        }
    }
}

/// A Heroes or Shadow ONE archive loaded into memory
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut)]
pub struct OneArchive {
    #[deref]
    #[deref_mut]
    archive: Archive,
    magic: OneMagic,
}

impl OneArchive {
    pub fn new(magic: OneMagic) -> Self {
        Self {
            archive: Archive::new(),
            magic,
        }
    }

    pub fn from_archive(archive: Archive, magic: OneMagic) -> Self {
        Self { archive, magic }
    }

    /// Magic written to the header, which also selects the layout
    pub fn magic(&self) -> OneMagic {
        self.magic
    }

    pub fn set_magic(&mut self, magic: OneMagic) {
        self.magic = magic;
    }

    pub fn into_archive(self) -> Archive {
        self.archive
    }

    #[instrument(skip(path), fields(path = %path.as_ref().display()), err)]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::read(BufReader::new(File::open(path)?))
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display()), err)]
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.write(BufWriter::new(File::create(path)?))
    }

    /// Read either layout from a stream
    #[instrument(skip(reader), err)]
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut reader = BinaryReader::new(reader, Endian::Little);
        let len = reader.len()?;

        let zero = reader.read_u32().map_err(Error::from_header(FORMAT))?;
        let _size = reader.read_u32().map_err(Error::from_header(FORMAT))?;
        let magic = reader.read_u32().map_err(Error::from_header(FORMAT))?;
        if zero != 0 {
            return Err(Error::invalid(FORMAT, "header does not start with zero"));
        }
        let magic = OneMagic::try_from(magic)?;

        let mut archive = if magic.is_shadow() {
            read_shadow(&mut reader, len)?
        } else {
            read_heroes(&mut reader, len)?
        };
        archive.mark_saved();

        debug!("read {} files with magic {magic:?}", archive.len());
        Ok(Self { archive, magic })
    }

    /// Write the layout selected by the magic
    ///
    /// Directories are flattened; every entry is named after its file name alone.
    #[instrument(skip(self, writer), err)]
    pub fn write<W: Write + Seek>(&mut self, writer: W) -> Result<()> {
        let files: Vec<_> = self
            .files(true)
            .into_iter()
            .map(|f| (f.file.name(), f.file.data()))
            .collect();

        let mut writer = BinaryWriter::new(writer, Endian::Little);
        writer.write_u32(0)?;
        let size = writer.reserve_u32()?;
        writer.write_u32(self.magic as u32)?;

        if self.magic.is_shadow() {
            write_shadow(&mut writer, &files, self.magic)?;
        } else {
            write_heroes(&mut writer, &files, self.magic)?;
        }

        let end = writer.position()?;
        writer.backpatch_with(size, end - COMMON_HEADER_SIZE)?;
        writer.finish()?;

        self.mark_saved();
        Ok(())
    }
}

fn read_heroes<R: Read + Seek>(reader: &mut BinaryReader<R>, len: u64) -> Result<Archive> {
    let container = reader.read_u32()?;
    let names_size = reader.read_u32()?;
    let _magic = reader.read_u32()?;
    if container != 1 || names_size as usize != HEROES_NAME_SLOTS * HEROES_NAME_SIZE {
        return Err(Error::Integrity(format!(
            "unexpected name table header {container}, {names_size:#X}"
        )));
    }

    let names = (0..HEROES_NAME_SLOTS)
        .map(|_| reader.read_fixed_string(HEROES_NAME_SIZE))
        .collect::<hedge_bin::error::Result<Vec<_>>>()?;

    let mut archive = Archive::new();
    let mut position = HEROES_RECORDS_START;
    while position + 12 <= len {
        reader.seek_to(position)?;
        let name_index = reader.read_u32()? as usize;
        let data_size = u64::from(reader.read_u32()?);
        let _magic = reader.read_u32()?;

        let name = names.get(name_index).ok_or_else(|| {
            Error::Integrity(format!("record at {position:#X} uses name slot {name_index}"))
        })?;
        if position + 12 + data_size > len {
            return Err(Error::Integrity(format!(
                "record {name} at {position:#X} runs past the end of the archive"
            )));
        }

        trace!("record {name}: {data_size:#X} bytes");
        let data = reader.read_bytes(data_size as usize)?;
        archive.push(ArchiveFile::new(name.clone(), data));
        position += 12 + data_size;
    }

    Ok(archive)
}

fn write_heroes<W: Write + Seek>(
    writer: &mut BinaryWriter<W>,
    files: &[(&str, &[u8])],
    magic: OneMagic,
) -> Result<()> {
    let max_files = HEROES_NAME_SLOTS - HEROES_FIRST_NAME;
    if files.len() > max_files {
        return Err(Error::CapacityExceeded {
            what: "files in a Heroes ONE archive",
            limit: max_files,
            actual: files.len(),
        });
    }
    check_names(files, HEROES_NAME_SIZE - 1)?;

    writer.write_u32(1)?;
    writer.write_u32((HEROES_NAME_SLOTS * HEROES_NAME_SIZE) as u32)?;
    writer.write_u32(magic as u32)?;

    writer.write_zeros(HEROES_FIRST_NAME * HEROES_NAME_SIZE)?;
    for (name, _) in files {
        writer.write_fixed_string(name, HEROES_NAME_SIZE)?;
    }
    writer.write_zeros((max_files - files.len()) * HEROES_NAME_SIZE)?;

    for (index, (_, data)) in files.iter().enumerate() {
        writer.write_u32((HEROES_FIRST_NAME + index) as u32)?;
        writer.write_u32(data_size(data)?)?;
        writer.write_u32(magic as u32)?;
        writer.write_bytes(data)?;
    }

    Ok(())
}

fn read_shadow<R: Read + Seek>(reader: &mut BinaryReader<R>, len: u64) -> Result<Archive> {
    let _version = reader.read_fixed_string(SHADOW_VERSION_SIZE)?;
    let count = u64::from(reader.read_u32()?);
    if COMMON_HEADER_SIZE + SHADOW_VERSION_SIZE as u64 + 4 + count * SHADOW_ENTRY_SIZE > len {
        return Err(Error::Integrity(format!(
            "{count} entries do not fit in the archive"
        )));
    }

    let mut archive = Archive::new();
    for _ in 0..count {
        let name = reader.read_fixed_string(SHADOW_NAME_SIZE)?;
        let size = u64::from(reader.read_u32()?);
        let offset = u64::from(reader.read_u32()?);
        let compressed = reader.read_u32()?;

        if compressed != 0 {
            return Err(Error::not_implemented("reading", "compressed Shadow ONE entries"));
        }
        if offset + size > len {
            return Err(Error::Integrity(format!(
                "entry {name} at {offset:#X} runs past the end of the archive"
            )));
        }

        let data = reader.read_at(offset, |r| r.read_bytes(size as usize))?;
        archive.push(ArchiveFile::new(name, data));
    }

    Ok(archive)
}

fn write_shadow<W: Write + Seek>(
    writer: &mut BinaryWriter<W>,
    files: &[(&str, &[u8])],
    magic: OneMagic,
) -> Result<()> {
    if files.len() > SHADOW_MAX_FILES {
        return Err(Error::CapacityExceeded {
            what: "files in a Shadow ONE archive",
            limit: SHADOW_MAX_FILES,
            actual: files.len(),
        });
    }
    check_names(files, SHADOW_NAME_SIZE - 1)?;

    writer.write_fixed_string(magic.version_string(), SHADOW_VERSION_SIZE)?;
    writer.write_u32(files.len() as u32)?;

    let mut offsets = Vec::with_capacity(files.len());
    for (name, data) in files {
        writer.write_fixed_string(name, SHADOW_NAME_SIZE)?;
        writer.write_u32(data_size(data)?)?;
        offsets.push(writer.reserve_u32()?);
        writer.write_u32(0)?;
    }

    for (offset, (_, data)) in offsets.into_iter().zip(files) {
        writer.backpatch(offset)?;
        writer.write_bytes(data)?;
    }

    Ok(())
}

fn check_names(files: &[(&str, &[u8])], limit: usize) -> Result<()> {
    match files.iter().find(|(name, _)| name.len() > limit) {
        Some((name, _)) => Err(Error::CapacityExceeded {
            what: "bytes in a ONE file name",
            limit,
            actual: name.len(),
        }),
        None => Ok(()),
    }
}

fn data_size(data: &[u8]) -> Result<u32> {
    fit_u32("bytes in a ONE entry", data.len())
}
