//! U8 archives used by the Wii titles.
//!
//! U8 is the only format here that stores a real directory tree. Every node is 12 bytes and a
//! directory records the index one past its last descendant, so the tree is laid out in pre-order.
//!
//! | Offset          | Contents                                          |
//! |-----------------|---------------------------------------------------|
//! | `0x00`          | [`U8Header`]                                      |
//! | `0x20`          | nodes, starting with the root directory           |
//! | after nodes     | null-terminated names, the root's name is empty   |
//! | `data_offset`   | file data, every file aligned to 0x20             |

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use binrw::{BinRead, BinWrite};
use bon::Builder;
use derive_more::{Deref, DerefMut};
use hedge_bin::{BinaryReader, BinaryWriter, Endian};
use tracing::{debug, instrument, trace};

use crate::archive::{Archive, ArchiveDirectory, ArchiveEntry, ArchiveFile};
use crate::compression::{compress, decompress, CompressionMethod};
use crate::error::{fit_u32, Error, Result};

pub(crate) const FORMAT: &str = "U8";

/// Size of [`U8Header`], which is also where the first node starts
pub const HEADER_SIZE: u32 = 0x20;

/// Size of a [`U8Node`]
pub const NODE_SIZE: u32 = 12;

/// Alignment of the data section and of every file in it
pub const DATA_ALIGNMENT: u64 = 0x20;

/// Deepest directory nesting accepted when reading
pub const MAX_DEPTH: usize = 256;

/// Largest name offset a node can store
const MAX_NAME_OFFSET: usize = 0xFF_FFFF;

#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big, magic = 0x55AA382Du32)]
pub struct U8Header {
    pub first_node: u32,
    /// Size of the nodes and the name table together
    pub nodes_size: u32,
    pub data_offset: u32,
    pub reserved: [u8; 16],
}

/// Type stored in the first byte of a node
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File = 0,
    Directory = 1,
    /// File whose data is stored as a zlib stream
    CompressedFile = 2,
}

impl TryFrom<u8> for NodeKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(NodeKind::File),
            1 => Ok(NodeKind::Directory),
            2 => Ok(NodeKind::CompressedFile),
            _ => Err(Error::Integrity(format!("unknown node type {value}"))),
        }
    }
}

/// A node as stored on disk
///
/// For files `data` is the absolute data offset and `size` the stored size. For directories `data` is
/// the parent's index and `size` the index one past the last descendant.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(big)]
pub struct U8Node {
    pub kind: u8,
    #[br(map = |b: [u8; 3]| u32::from_be_bytes([0, b[0], b[1], b[2]]))]
    #[bw(map = |o: &u32| { let b = o.to_be_bytes(); [b[1], b[2], b[3]] })]
    pub name_offset: u32,
    pub data: u32,
    pub size: u32,
}

/// Options for [`U8Archive::write`]
#[derive(Builder, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct U8WriteOptions {
    /// How file data is stored
    ///
    /// When unset every file is stored the way it was when the archive was read, and files added since
    /// are stored raw.
    pub compression: Option<CompressionMethod>,
}

/// A U8 archive loaded into memory
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut)]
pub struct U8Archive {
    #[deref]
    #[deref_mut]
    archive: Archive,
    /// Paths of the files that are not stored raw
    storage: HashMap<String, CompressionMethod>,
}

impl U8Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_archive(archive: Archive) -> Self {
        Self {
            archive,
            storage: HashMap::new(),
        }
    }

    pub fn into_archive(self) -> Archive {
        self.archive
    }

    /// How the file at `path` was stored when the archive was last read or written
    pub fn storage(&self, path: &str) -> CompressionMethod {
        self.storage.get(path).copied().unwrap_or_default()
    }

    #[instrument(skip(path), fields(path = %path.as_ref().display()), err)]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::read(BufReader::new(File::open(path)?))
    }

    #[instrument(skip(self, path), fields(path = %path.as_ref().display()), err)]
    pub fn save(&mut self, path: impl AsRef<Path>, options: &U8WriteOptions) -> Result<()> {
        self.write(BufWriter::new(File::create(path)?), options)
    }

    /// Read an archive from a stream, inflating compressed files
    ///
    /// Directories nested deeper than [`MAX_DEPTH`] are rejected.
    #[instrument(skip(reader), err)]
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut reader = BinaryReader::new(reader, Endian::Big);
        let len = reader.len()?;

        let header: U8Header = reader.read_struct().map_err(Error::from_header(FORMAT))?;
        let first_node = u64::from(header.first_node);

        reader.seek_to(first_node)?;
        let root: U8Node = reader.read_struct()?;
        if NodeKind::try_from(root.kind)? != NodeKind::Directory {
            return Err(Error::Integrity("root node is not a directory".to_owned()));
        }

        let count = root.size as usize;
        let names_start = first_node + u64::from(NODE_SIZE) * count as u64;
        if count == 0 || names_start > len {
            return Err(Error::Integrity(format!(
                "{count} nodes do not fit in the archive"
            )));
        }

        reader.seek_to(first_node)?;
        let raw = (0..count)
            .map(|_| reader.read_struct::<U8Node>())
            .collect::<hedge_bin::error::Result<Vec<_>>>()?;

        let mut nodes = Vec::with_capacity(count);
        for (index, node) in raw.iter().enumerate() {
            let kind = NodeKind::try_from(node.kind)?;
            let name = reader.read_at(names_start + u64::from(node.name_offset), |r| {
                r.read_cstring()
            })?;

            let data = match kind {
                NodeKind::Directory => None,
                NodeKind::File | NodeKind::CompressedFile => {
                    let offset = u64::from(node.data);
                    let size = u64::from(node.size);
                    if offset + size > len {
                        return Err(Error::Integrity(format!(
                            "node {index} ({name}) runs past the end of the archive"
                        )));
                    }

                    let stored = reader.read_at(offset, |r| r.read_bytes(size as usize))?;
                    Some(decompress(&stored, kind.compression())?)
                }
            };

            trace!("node {index}: {kind:?} {name}");
            nodes.push(ReadNode {
                kind,
                name,
                node: *node,
                data,
            });
        }

        let mut storage = HashMap::new();
        let entries = build_entries(&mut nodes, &mut storage)?;
        let mut archive = Archive::with_entries(entries);
        archive.mark_saved();

        debug!("read {count} nodes");
        Ok(Self { archive, storage })
    }

    /// Write the archive to a stream
    #[instrument(skip(self, writer), err)]
    pub fn write<W: Write + Seek>(&mut self, writer: W, options: &U8WriteOptions) -> Result<()> {
        let mut layout = Layout::default();
        layout.add_name("")?;
        layout.nodes.push(U8Node {
            kind: NodeKind::Directory as u8,
            ..Default::default()
        });
        let method = |path: &str| options.compression.unwrap_or_else(|| self.storage(path));
        layout.flatten(self.archive.entries(), 0, "", &method)?;
        layout.nodes[0].size = fit_u32("U8 nodes", layout.nodes.len())?;

        let nodes_size = fit_u32(
            "bytes of nodes and names",
            layout.nodes.len() * NODE_SIZE as usize + layout.names.len(),
        )?;
        let data_offset = align(u64::from(HEADER_SIZE) + u64::from(nodes_size), DATA_ALIGNMENT);

        let mut position = data_offset;
        for (index, data) in &layout.contents {
            position = align(position, DATA_ALIGNMENT);
            layout.nodes[*index].data = offset_u32(position)?;
            position += data.len() as u64;
        }

        let mut writer = BinaryWriter::new(writer, Endian::Big);
        writer.write_struct(&U8Header {
            first_node: HEADER_SIZE,
            nodes_size,
            data_offset: offset_u32(data_offset)?,
            reserved: [0; 16],
        })?;
        for node in &layout.nodes {
            writer.write_struct(node)?;
        }
        writer.write_bytes(&layout.names)?;

        for (_, data) in &layout.contents {
            writer.pad_to(DATA_ALIGNMENT)?;
            writer.write_bytes(data)?;
        }
        writer.finish()?;

        debug!("wrote {} nodes", layout.nodes.len());
        self.storage = layout.storage;
        self.mark_saved();
        Ok(())
    }
}

impl NodeKind {
    fn compression(self) -> CompressionMethod {
        match self {
            NodeKind::CompressedFile => CompressionMethod::Zlib,
            NodeKind::File | NodeKind::Directory => CompressionMethod::None,
        }
    }
}

struct ReadNode {
    kind: NodeKind,
    name: String,
    node: U8Node,
    data: Option<Vec<u8>>,
}

/// A directory whose children are still being read
struct OpenDirectory {
    name: String,
    path: String,
    end: usize,
    entries: Vec<ArchiveEntry>,
}

/// Rebuild the tree from nodes laid out in pre-order, recording how every file was stored
fn build_entries(
    nodes: &mut [ReadNode],
    storage: &mut HashMap<String, CompressionMethod>,
) -> Result<Vec<ArchiveEntry>> {
    let count = nodes.len();
    let mut root = Vec::new();
    let mut open: Vec<OpenDirectory> = Vec::new();

    for index in 1..count {
        while open.last().is_some_and(|directory| directory.end == index) {
            close_directory(&mut open, &mut root);
        }

        let end = open.last().map_or(count, |directory| directory.end);
        let name = std::mem::take(&mut nodes[index].name);
        let path = match open.last() {
            Some(directory) => format!("{}/{name}", directory.path),
            None => name.clone(),
        };

        let kind = nodes[index].kind;
        if kind != NodeKind::Directory {
            if kind.compression() != CompressionMethod::None {
                storage.insert(path, kind.compression());
            }
            let data = nodes[index].data.take().unwrap_or_default();
            let siblings = match open.last_mut() {
                Some(directory) => &mut directory.entries,
                None => &mut root,
            };
            siblings.push(ArchiveFile::new(name, data).into());
            continue;
        }

        let parent = nodes[index].node.data as usize;
        let child_end = nodes[index].node.size as usize;
        if parent >= index || nodes[parent].kind != NodeKind::Directory {
            return Err(Error::Integrity(format!(
                "directory {index} ({name}) has parent {parent}"
            )));
        }
        if child_end <= index || child_end > end {
            return Err(Error::Integrity(format!(
                "directory {index} ({name}) ends at {child_end}, outside {index}..{end}"
            )));
        }
        if open.len() == MAX_DEPTH {
            return Err(Error::Integrity(format!(
                "directory {index} ({name}) is nested deeper than {MAX_DEPTH} levels"
            )));
        }

        open.push(OpenDirectory {
            name,
            path,
            end: child_end,
            entries: Vec::new(),
        });
    }

    while !open.is_empty() {
        close_directory(&mut open, &mut root);
    }
    Ok(root)
}

fn close_directory(open: &mut Vec<OpenDirectory>, root: &mut Vec<ArchiveEntry>) {
    if let Some(directory) = open.pop() {
        let entry = ArchiveDirectory::with_entries(directory.name, directory.entries).into();
        match open.last_mut() {
            Some(parent) => parent.entries.push(entry),
            None => root.push(entry),
        }
    }
}

/// Nodes, names and stored file data of an archive being written
#[derive(Default)]
struct Layout {
    nodes: Vec<U8Node>,
    names: Vec<u8>,
    contents: Vec<(usize, Vec<u8>)>,
    storage: HashMap<String, CompressionMethod>,
}

impl Layout {
    fn add_name(&mut self, name: &str) -> Result<u32> {
        let offset = self.names.len();
        if offset > MAX_NAME_OFFSET {
            return Err(Error::CapacityExceeded {
                what: "bytes in the U8 name table",
                limit: MAX_NAME_OFFSET,
                actual: offset,
            });
        }
        self.names.extend_from_slice(name.as_bytes());
        self.names.push(0);
        Ok(offset as u32)
    }

    fn flatten(
        &mut self,
        entries: &[ArchiveEntry],
        parent: usize,
        prefix: &str,
        method: &impl Fn(&str) -> CompressionMethod,
    ) -> Result<()> {
        for entry in entries {
            let name_offset = self.add_name(entry.name())?;
            let path = if prefix.is_empty() {
                entry.name().to_owned()
            } else {
                format!("{prefix}/{}", entry.name())
            };

            match entry {
                ArchiveEntry::File(file) => {
                    let compression = method(&path);
                    let kind = match compression {
                        CompressionMethod::None => NodeKind::File,
                        CompressionMethod::Zlib => NodeKind::CompressedFile,
                    };
                    let stored = compress(file.data(), compression)?;
                    self.nodes.push(U8Node {
                        kind: kind as u8,
                        name_offset,
                        data: 0,
                        size: fit_u32("bytes in a U8 file", stored.len())?,
                    });
                    self.contents.push((self.nodes.len() - 1, stored));
                    if compression != CompressionMethod::None {
                        self.storage.insert(path, compression);
                    }
                }
                ArchiveEntry::Directory(directory) => {
                    let index = self.nodes.len();
                    self.nodes.push(U8Node {
                        kind: NodeKind::Directory as u8,
                        name_offset,
                        data: parent as u32,
                        size: 0,
                    });
                    self.flatten(directory.entries(), index, &path, method)?;
                    self.nodes[index].size = fit_u32("U8 nodes", self.nodes.len())?;
                }
            }
        }
        Ok(())
    }
}

fn offset_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| hedge_bin::error::Error::OffsetOverflow { value }.into())
}

const fn align(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}
