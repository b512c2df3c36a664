//! Reading AR archives and ARL lists
//!

use std::io::{Read, Seek};

use hedge_bin::{BinaryReader, Endian};
use tracing::{instrument, trace};

use crate::archive::{Archive, ArchiveFile};
use crate::error::{Error, Result};
use crate::gens::types::{ArlHeader, GensEntryHeader, GensHeader, ENTRY_HEADER_SIZE, HEADER_SIZE};
use crate::gens::{GensArchive, FORMAT};

/// Contents of an ARL list
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GensList {
    /// Size of each part, in bytes
    pub part_sizes: Vec<u32>,
    /// Name of every file, in part order
    pub file_names: Vec<String>,
}

impl GensArchive {
    /// Read a single AR archive (or a single split part) from a stream
    #[instrument(skip(reader), err)]
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut reader = BinaryReader::new(reader, Endian::Little);
        let len = reader.len()?;

        let header: GensHeader = reader.read_struct().map_err(Error::from_header(FORMAT))?;
        let mut archive = Archive::new();

        let mut position = HEADER_SIZE;
        while len - position > ENTRY_HEADER_SIZE {
            reader.seek_to(position)?;
            let entry: GensEntryHeader = reader.read_struct()?;
            let name = reader.read_cstring()?;

            let entry_size = u64::from(entry.entry_size);
            let data_offset = u64::from(entry.data_offset);
            let data_size = u64::from(entry.data_size);
            if data_offset < ENTRY_HEADER_SIZE + name.len() as u64 + 1
                || data_offset + data_size > entry_size
                || position + entry_size > len
            {
                return Err(Error::Integrity(format!(
                    "entry {name} at {position:#X} points outside the archive"
                )));
            }

            trace!("entry {name} at {position:#X}, {data_size:#X} bytes");
            reader.seek_to(position + data_offset)?;
            let data = reader.read_bytes(entry.data_size as usize)?;
            archive.push(ArchiveFile::new(name, data));

            position += entry_size;
        }

        archive.mark_saved();
        Ok(GensArchive::from_archive(archive, header.padding))
    }

    /// Read an ARL list
    #[instrument(skip(reader), err)]
    pub fn read_list<R: Read + Seek>(reader: R) -> Result<GensList> {
        let mut reader = BinaryReader::new(reader, Endian::Little);
        let len = reader.len()?;

        let header: ArlHeader = reader
            .read_struct()
            .map_err(Error::from_header("ARL"))?;

        let mut file_names = Vec::new();
        while reader.position()? < len {
            let size = reader.read_u8()?;
            let name = reader.read_fixed_string(size as usize)?;
            file_names.push(name);
        }

        Ok(GensList {
            part_sizes: header.part_sizes,
            file_names,
        })
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::gens::GensArchive;

    #[rustfmt::skip]
    pub(crate) const TWO_FILES: [u8; 0x53] = [
        0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00,
        0x14, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00,
        // a.txt
        0x22, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00,
        0x20, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x61, 0x2E, 0x74, 0x78, 0x74, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x68, 0x69,
        // b.txt
        0x21, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00,
        0x1E, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x62, 0x2E, 0x74, 0x78, 0x74, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x62, 0x79, 0x65,
    ];

    #[test]
    fn read_two_files() -> Result<()> {
        let archive = GensArchive::read(Cursor::new(TWO_FILES))?;

        assert_eq!(archive.padding(), 0x10);
        assert!(archive.is_saved());
        assert_eq!(archive.file("a.txt")?.data(), b"hi");
        assert_eq!(archive.file("b.txt")?.data(), b"bye");
        assert_eq!(archive.len(), 2);

        Ok(())
    }

    #[test]
    fn read_empty_archive() -> Result<()> {
        let archive = GensArchive::read(Cursor::new(&TWO_FILES[..0x10]))?;
        assert!(archive.is_empty());
        Ok(())
    }

    #[test]
    fn read_entry_past_end_fails() {
        let mut input = TWO_FILES;
        input[0x10] = 0xFF;

        assert!(matches!(
            GensArchive::read(Cursor::new(input)),
            Err(Error::Integrity(_))
        ));
    }

    #[test]
    fn read_other_format_fails() {
        assert!(matches!(
            GensArchive::read(Cursor::new(b"PACx301L".to_vec())),
            Err(Error::InvalidArchive { .. })
        ));
    }

    #[test]
    fn read_list_names() -> Result<()> {
        #[rustfmt::skip]
        let input = vec![
            0x41, 0x52, 0x4C, 0x32,
            0x01, 0x00, 0x00, 0x00,
            0x53, 0x00, 0x00, 0x00,
            0x05, 0x61, 0x2E, 0x74, 0x78, 0x74,
            0x05, 0x62, 0x2E, 0x74, 0x78, 0x74,
        ];

        let list = GensArchive::read_list(Cursor::new(input))?;
        assert_eq!(list.part_sizes, vec![0x53]);
        assert_eq!(list.file_names, vec!["a.txt", "b.txt"]);

        Ok(())
    }
}
