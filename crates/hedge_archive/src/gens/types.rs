//! Base types for the structure of AR archives and their ARL lists.

use binrw::{binrw, BinRead, BinWrite};

/// Alignment used for entry data unless told otherwise
pub const DEFAULT_PADDING: u32 = 0x40;

/// Alignment used by `.pfd` archives, which are streamed from disc
pub const PFD_PADDING: u32 = 0x800;

/// Size of [`GensHeader`]
pub const HEADER_SIZE: u64 = 0x10;

/// Size of [`GensEntryHeader`]
pub const ENTRY_HEADER_SIZE: u64 = 0x14;

/// AR file header
///
/// Always starts with a zero, the header size (`0x10`) and the entry header size (`0x14`), followed by
/// the alignment applied to the data of every entry.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"\0\0\0\0\x10\0\0\0\x14\0\0\0", little)]
pub struct GensHeader {
    /// Data of every entry starts at a multiple of this value
    pub padding: u32,
}

impl Default for GensHeader {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
        }
    }
}

/// Header preceding each entry, followed by the null-terminated entry name
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct GensEntryHeader {
    /// Distance from the start of this entry to the start of the next
    pub entry_size: u32,

    /// Size of the entry data
    pub data_size: u32,

    /// Distance from the start of this entry to its data
    pub data_offset: u32,

    /// Unused by the games, always written as zero
    pub reserved: u64,
}

/// ARL list header, followed by one length-prefixed name per file
#[binrw]
#[brw(magic = b"ARL2", little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArlHeader {
    #[br(temp)]
    #[bw(try_calc = u32::try_from(part_sizes.len()))]
    part_count: u32,

    /// Size of each split part, in bytes
    #[br(count = part_count)]
    pub part_sizes: Vec<u32>,
}

impl ArlHeader {
    pub fn new(part_sizes: Vec<u32>) -> Self {
        Self { part_sizes }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::{BinRead, BinWrite};
    use pretty_assertions::assert_eq;

    use crate::error::Result;
    use crate::gens::types::{ArlHeader, GensEntryHeader, GensHeader, PFD_PADDING};

    #[test]
    fn read_pfd_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x00, 0x00, 0x00, 0x00,
            0x10, 0x00, 0x00, 0x00,
            0x14, 0x00, 0x00, 0x00,
            0x00, 0x08, 0x00, 0x00,
        ]);

        let expected = GensHeader {
            padding: PFD_PADDING,
        };
        assert_eq!(GensHeader::read(&mut input)?, expected);

        Ok(())
    }

    #[test]
    fn read_header_with_wrong_sizes_fails() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x00, 0x00, 0x00, 0x00,
            0x10, 0x00, 0x00, 0x00,
            0x18, 0x00, 0x00, 0x00,
            0x40, 0x00, 0x00, 0x00,
        ]);

        assert!(GensHeader::read(&mut input).is_err());
    }

    #[test]
    fn write_entry_header() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x22, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let header = GensEntryHeader {
            entry_size: 0x22,
            data_size: 2,
            data_offset: 0x20,
            reserved: 0,
        };
        let mut output = Cursor::new(Vec::new());
        header.write(&mut output)?;
        assert_eq!(output.into_inner(), expected);

        Ok(())
    }

    #[test]
    fn arl_header_counts_parts() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x41, 0x52, 0x4C, 0x32,
            0x02, 0x00, 0x00, 0x00,
            0x00, 0x01, 0x00, 0x00,
            0x53, 0x00, 0x00, 0x00,
        ];

        let header = ArlHeader::new(vec![0x100, 0x53]);
        let mut output = Cursor::new(Vec::new());
        header.write(&mut output)?;
        assert_eq!(output.get_ref(), &expected);

        output.set_position(0);
        assert_eq!(ArlHeader::read(&mut output)?, header);

        Ok(())
    }
}
