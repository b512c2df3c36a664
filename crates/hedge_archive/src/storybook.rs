//! ONE archives used by the Storybook series on the Wii.
//!
//! Unlike the Heroes and Shadow archives sharing the extension, these are big endian and start with
//! the file count instead of a magic.
//!
//! | Offset               | Contents                                                   |
//! |----------------------|------------------------------------------------------------|
//! | `0x00`               | [`StorybookHeader`]                                        |
//! | `0x10`               | one 32 byte name slot per file                             |
//! | `file_table_offset`  | one [`StorybookEntry`] per file                            |
//! | after the table      | file data, every file aligned to 0x10                      |

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use binrw::{BinRead, BinWrite};
use derive_more::{Deref, DerefMut};
use hedge_bin::{BinaryReader, BinaryWriter, Endian};
use tracing::{debug, instrument, trace};

use crate::archive::{Archive, ArchiveFile};
use crate::error::{fit_u32, Error, Result};

pub(crate) const FORMAT: &str = "Storybook ONE";

/// Offset of the name table
pub const NAMES_OFFSET: u32 = 0x10;

/// Size of a name slot
pub const NAME_SIZE: usize = 32;

/// Size of a [`StorybookEntry`]
pub const ENTRY_SIZE: u32 = 16;

/// Alignment of every file's data
pub const DATA_ALIGNMENT: u64 = 0x10;

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct StorybookHeader {
    pub file_count: u32,
    #[br(assert(names_offset == NAMES_OFFSET, "names start at {:#X}", names_offset))]
    pub names_offset: u32,
    pub file_table_offset: u32,
    pub reserved: u32,
}

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct StorybookEntry {
    /// Index of the entry's name slot
    pub index: u32,
    pub data_offset: u32,
    pub stored_size: u32,
    pub size: u32,
}

/// A Storybook ONE archive loaded into memory
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut)]
pub struct StorybookArchive {
    #[deref]
    #[deref_mut]
    archive: Archive,
}

impl StorybookArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_archive(archive: Archive) -> Self {
        Self { archive }
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

    #[instrument(skip(reader), err)]
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut reader = BinaryReader::new(reader, Endian::Big);
        let len = reader.len()?;

        let header: StorybookHeader = reader
            .read_struct()
            .map_err(|e| match e {
                hedge_bin::error::Error::BinRWError(_) => {
                    Error::invalid(FORMAT, "unexpected name table offset")
                }
                e => Error::from_header(FORMAT)(e),
            })?;

        let count = u64::from(header.file_count);
        let names_end = u64::from(NAMES_OFFSET) + count * NAME_SIZE as u64;
        let table_end = u64::from(header.file_table_offset) + count * u64::from(ENTRY_SIZE);
        if names_end > len || table_end > len {
            return Err(Error::Integrity(format!(
                "{count} entries do not fit in the archive"
            )));
        }

        let names = (0..count)
            .map(|_| reader.read_fixed_string(NAME_SIZE))
            .collect::<hedge_bin::error::Result<Vec<_>>>()?;

        reader.seek_to(u64::from(header.file_table_offset))?;
        let entries = (0..count)
            .map(|_| reader.read_struct::<StorybookEntry>())
            .collect::<hedge_bin::error::Result<Vec<_>>>()?;

        let mut archive = Archive::new();
        for entry in entries {
            let name = names.get(entry.index as usize).ok_or_else(|| {
                Error::Integrity(format!("entry uses name slot {}", entry.index))
            })?;
            if entry.stored_size != entry.size {
                return Err(Error::not_implemented(
                    "reading",
                    format!("compressed {FORMAT} entries ({name})"),
                ));
            }

            let offset = u64::from(entry.data_offset);
            let size = u64::from(entry.size);
            if offset + size > len {
                return Err(Error::Integrity(format!(
                    "{name} at {offset:#X} runs past the end of the archive"
                )));
            }

            trace!("{name}: {size:#X} bytes at {offset:#X}");
            let data = reader.read_at(offset, |r| r.read_bytes(size as usize))?;
            archive.push(ArchiveFile::new(name.clone(), data));
        }
        archive.mark_saved();

        debug!("read {count} files");
        Ok(Self { archive })
    }

    /// Write the archive to a stream, flattening directories into file names
    #[instrument(skip(self, writer), err)]
    pub fn write<W: Write + Seek>(&mut self, writer: W) -> Result<()> {
        let files: Vec<_> = self
            .files(true)
            .into_iter()
            .map(|f| (f.file.name(), f.file.data()))
            .collect();

        if let Some((name, _)) = files.iter().find(|(name, _)| name.len() >= NAME_SIZE) {
            return Err(Error::CapacityExceeded {
                what: "bytes in a Storybook file name",
                limit: NAME_SIZE - 1,
                actual: name.len(),
            });
        }

        let count = fit_u32("files in a Storybook archive", files.len())?;
        let file_table_offset = fit_u32(
            "bytes of Storybook names",
            NAMES_OFFSET as usize + files.len() * NAME_SIZE,
        )?;
        let mut writer = BinaryWriter::new(writer, Endian::Big);
        writer.write_struct(&StorybookHeader {
            file_count: count,
            names_offset: NAMES_OFFSET,
            file_table_offset,
            reserved: 0,
        })?;
        for (name, _) in &files {
            writer.write_fixed_string(name, NAME_SIZE)?;
        }

        let mut offsets = Vec::with_capacity(files.len());
        for (index, (_, data)) in files.iter().enumerate() {
            let size = fit_u32("bytes in a Storybook entry", data.len())?;
            writer.write_u32(index as u32)?;
            offsets.push(writer.reserve_u32()?);
            writer.write_u32(size)?;
            writer.write_u32(size)?;
        }

        for (offset, (_, data)) in offsets.into_iter().zip(&files) {
            writer.pad_to(DATA_ALIGNMENT)?;
            writer.backpatch(offset)?;
            writer.write_bytes(data)?;
        }
        writer.finish()?;

        self.mark_saved();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::archive::{ArchiveEntry, ArchiveFile};
    use crate::error::{Error, Result};
    use crate::storybook::StorybookArchive;

    fn two_files() -> Vec<u8> {
        #[rustfmt::skip]
        let mut bytes = vec![
            0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x10,
            0x00, 0x00, 0x00, 0x50, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut name = |n: &[u8]| {
            bytes.extend_from_slice(n);
            bytes.resize(bytes.len() + 32 - n.len(), 0);
        };
        name(b"a.bin");
        name(b"b.bin");
        #[rustfmt::skip]
        bytes.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x70,
            0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x03,
            0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x80,
            0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x02,
            0x61, 0x62, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x68, 0x69,
        ]);
        bytes
    }

    #[test]
    fn write_two_files() -> Result<()> {
        let mut archive = StorybookArchive::new();
        archive.add_file("a.bin", b"abc".to_vec())?;
        archive.add_file("b.bin", b"hi".to_vec())?;

        let mut output = Cursor::new(Vec::new());
        archive.write(&mut output)?;
        assert_eq!(output.into_inner(), two_files());
        Ok(())
    }

    #[test]
    fn read_two_files() -> Result<()> {
        let archive = StorybookArchive::read(Cursor::new(two_files()))?;
        assert_eq!(
            archive.entries(),
            &[
                ArchiveEntry::File(ArchiveFile::new("a.bin", b"abc".to_vec())),
                ArchiveEntry::File(ArchiveFile::new("b.bin", b"hi".to_vec())),
            ]
        );
        Ok(())
    }

    #[test]
    fn compressed_entry_is_not_implemented() {
        let mut bytes = two_files();
        // stored size of the first entry
        bytes[0x50 + 11] = 0x02;
        assert!(matches!(
            StorybookArchive::read(Cursor::new(bytes)),
            Err(Error::NotImplemented { .. })
        ));
    }

    #[test]
    fn heroes_archive_is_not_storybook() {
        let mut bytes = vec![0u8; 0x20];
        bytes[8] = 0xFF;
        bytes[9] = 0xFF;
        assert!(matches!(
            StorybookArchive::read(Cursor::new(bytes)),
            Err(Error::InvalidArchive { .. })
        ));
    }

    #[test]
    fn long_names_exceed_capacity() -> Result<()> {
        let mut archive = StorybookArchive::new();
        archive.add_file(&"n".repeat(32), vec![])?;
        assert!(matches!(
            archive.write(Cursor::new(Vec::new())),
            Err(Error::CapacityExceeded { .. })
        ));
        Ok(())
    }
}
