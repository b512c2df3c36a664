//! Base types for the structure of PACx archives.
//!
//! Apart from the 8 byte signature, every field is stored in the byte order named by the signature.

use binrw::{BinRead, BinWrite};

/// First four bytes of every PACx archive
pub const SIGNATURE: &[u8; 4] = b"PACx";

/// The only version this crate reads and writes
pub const VERSION: &[u8; 3] = b"301";

/// Size of the signature and [`PacHeader`] together
pub const HEADER_SIZE: u64 = 0x30;

/// Size of a [`RawNode`]
pub const NODE_SIZE: u64 = 0x28;

/// Size of a [`RawDataEntry`]
pub const DATA_ENTRY_SIZE: u64 = 0x28;

/// The archive is a root archive
pub const KIND_ROOT: u16 = 0x1;

/// The archive is a split part of a root archive
pub const KIND_SPLIT: u16 = 0x2;

/// The archive lists split parts
pub const KIND_HAS_SPLITS: u16 = 0x4;

/// Constant stored after the kind flags
pub const HEADER_UNKNOWN: u16 = 0x0108;

/// Most split parts a root archive can list
pub const MAX_SPLITS: usize = 255;

/// Resource type used for extensions missing from [`RESOURCE_TYPES`]
pub const DEFAULT_RESOURCE_TYPE: &str = "ResRawData";

/// Extensions that must always stay in the root archive
pub const ROOT_EXCLUSIVE_EXTENSIONS: &[&str] = &[
    "asm",
    "anm.hkx",
    "skl.hkx",
    "phy.hkx",
    "lua",
    "rfl",
    "material",
    "terrain-material",
    "model",
    "terrain-model",
    "shader-list",
    "cnvrs-text",
    "pxd",
    "swif",
];

/// Resource type names of well known extensions
pub const RESOURCE_TYPES: &[(&str, &str)] = &[
    ("anm.hkx", "ResAnimSkeleton"),
    ("asm", "ResAnimator"),
    ("btmesh", "ResBulletMesh"),
    ("cnvrs-text", "ResText"),
    ("dds", "ResTexture"),
    ("lua", "ResLuaData"),
    ("material", "ResMirageMaterial"),
    ("model", "ResModel"),
    ("phy.hkx", "ResHavokMesh"),
    ("pxd", "ResAnimationPxd"),
    ("rfl", "ResReflection"),
    ("shader-list", "ResShaderList"),
    ("skl.hkx", "ResSkeleton"),
    ("swif", "ResSurfRideProject"),
    ("terrain-material", "ResTerrainMaterial"),
    ("terrain-model", "ResModel"),
];

/// Resource type name stored in the type tree for an extension
pub fn resource_type(extension: &str) -> &'static str {
    RESOURCE_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map_or(DEFAULT_RESOURCE_TYPE, |(_, kind)| kind)
}

/// Whether files with this extension may only live in the root archive
pub fn is_root_exclusive(extension: &str) -> bool {
    ROOT_EXCLUSIVE_EXTENSIONS.contains(&extension)
}

/// PACx header, following the `PACx301` signature and the endian marker
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PacHeader {
    /// Identifier shared by a root archive and its split parts
    pub uid: u32,
    /// Size of the whole file
    pub file_size: u32,
    /// Size of the type tree and every file tree
    pub trees_size: u32,
    /// Size of the split table
    pub split_table_size: u32,
    /// Size of the data entry array
    pub data_entries_size: u32,
    /// Size of the string table
    pub string_table_size: u32,
    /// Size of the file data section
    pub data_size: u32,
    /// Size of the pointer table
    pub pointer_table_size: u32,
    /// Combination of `KIND_*` flags
    pub kind: u16,
    /// Always [`HEADER_UNKNOWN`]
    pub unknown: u16,
    /// Number of split parts listed in the split table
    pub split_count: u32,
}

/// Header of a node tree
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RawTreeHeader {
    pub node_count: u32,
    pub data_node_count: u32,
    pub nodes_ptr: u64,
    pub data_indices_ptr: u64,
}

/// Node of a node tree as stored on disk
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RawNode {
    pub name_ptr: u64,
    pub data_ptr: u64,
    pub children_ptr: u64,
    pub parent_index: i32,
    pub global_index: i32,
    pub data_index: i32,
    pub child_count: u16,
    pub has_data: u8,
    pub full_path_size: u8,
}

/// How the data of an entry is stored
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[brw(repr = u8)]
pub enum DataKind {
    /// Plain bytes
    #[default]
    Raw = 0,

    /// Bytes in the BINA sub-format
    Bina = 1,

    /// Placeholder for data stored in a split part
    Proxy = 2,
}

impl DataKind {
    /// Kind of a file stored in this archive, based on its contents
    pub fn of(data: &[u8]) -> Self {
        if data.starts_with(b"BINA") {
            DataKind::Bina
        } else {
            DataKind::Raw
        }
    }
}

/// Data entry as stored on disk
#[derive(BinRead, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RawDataEntry {
    pub data_size: u32,
    pub reserved: u32,
    pub data_ptr: u64,
    pub reserved2: u64,
    pub reserved3: u64,
    #[br(pad_after = 7)]
    pub kind: DataKind,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::{BinRead, BinWrite, Endian};
    use pretty_assertions::assert_eq;

    use crate::error::Result;
    use crate::pac::types::{
        is_root_exclusive, resource_type, DataKind, PacHeader, RawDataEntry, RawNode,
        HEADER_UNKNOWN, KIND_ROOT,
    };

    #[test]
    fn read_big_endian_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x12, 0x34, 0x56, 0x78,
            0x00, 0x00, 0x01, 0x00,
            0x00, 0x00, 0x00, 0x80,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x28,
            0x00, 0x00, 0x00, 0x10,
            0x00, 0x00, 0x00, 0x10,
            0x00, 0x00, 0x00, 0x08,
            0x00, 0x01, 0x01, 0x08,
            0x00, 0x00, 0x00, 0x00,
        ]);

        let expected = PacHeader {
            uid: 0x12345678,
            file_size: 0x100,
            trees_size: 0x80,
            data_entries_size: 0x28,
            string_table_size: 0x10,
            data_size: 0x10,
            pointer_table_size: 0x08,
            kind: KIND_ROOT,
            unknown: HEADER_UNKNOWN,
            ..Default::default()
        };
        assert_eq!(PacHeader::read_options(&mut input, Endian::Big, ())?, expected);

        let mut output = Cursor::new(Vec::new());
        expected.write_options(&mut output, Endian::Big, ())?;
        assert_eq!(output.into_inner(), input.into_inner());

        Ok(())
    }

    #[test]
    fn read_node() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x40, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0xA0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0xFF, 0xFF, 0xFF, 0xFF,
            0x02, 0x00,
            0x00,
            0x02,
        ]);

        let expected = RawNode {
            name_ptr: 0x140,
            children_ptr: 0xA0,
            parent_index: 0,
            global_index: 1,
            data_index: -1,
            child_count: 2,
            full_path_size: 2,
            ..Default::default()
        };
        assert_eq!(RawNode::read_options(&mut input, Endian::Little, ())?, expected);

        Ok(())
    }

    #[test]
    fn read_proxy_entry() -> Result<()> {
        let mut input = vec![0u8; 0x28];
        input[0] = 0x10;
        input[0x20] = 2;

        let entry = RawDataEntry::read_options(&mut Cursor::new(input), Endian::Little, ())?;
        assert_eq!(entry.data_size, 0x10);
        assert_eq!(entry.kind, DataKind::Proxy);

        Ok(())
    }

    #[test]
    fn extension_tables() {
        assert!(is_root_exclusive("skl.hkx"));
        assert!(!is_root_exclusive("dds"));
        assert_eq!(resource_type("dds"), "ResTexture");
        assert_eq!(resource_type("xyz"), "ResRawData");
        assert_eq!(DataKind::of(b"BINA210L"), DataKind::Bina);
        assert_eq!(DataKind::of(b"DDS "), DataKind::Raw);
    }
}
