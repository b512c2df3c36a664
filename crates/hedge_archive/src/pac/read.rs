//! Reading PACx archives
//!

use std::io::{Read, Seek};

use hedge_bin::{BinaryReader, Endian};
use tracing::{debug, instrument, trace};

use crate::archive::{Archive, ArchiveFile};
use crate::error::{Error, Result};
use crate::node_tree::{Node, NodeTree};
use crate::pac::types::{
    DataKind, PacHeader, RawDataEntry, RawNode, RawTreeHeader, DATA_ENTRY_SIZE, HEADER_SIZE,
    KIND_HAS_SPLITS, NODE_SIZE, SIGNATURE, VERSION,
};
use crate::pac::{PacArchive, FORMAT};

impl PacArchive {
    /// Read a root archive or a single split part from a stream
    ///
    /// Proxy entries of a root archive are skipped; the names of the parts holding their data are
    /// available from [`PacArchive::split_names`].
    #[instrument(skip(reader), err)]
    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut reader = BinaryReader::new(reader, Endian::Little);
        let len = reader.len()?;

        let signature = reader
            .read_bytes(8)
            .map_err(Error::from_header(FORMAT))?;
        if &signature[..4] != SIGNATURE {
            return Err(Error::invalid(FORMAT, "bad signature"));
        }
        if &signature[4..7] != VERSION {
            return Err(Error::not_implemented(
                "reading",
                format!("PACx version {}", String::from_utf8_lossy(&signature[4..7])),
            ));
        }
        let endian = Endian::from_marker(signature[7]).ok_or_else(|| {
            Error::invalid(FORMAT, format!("bad endian marker {:#X}", signature[7]))
        })?;
        reader.set_endian(endian);

        let header: PacHeader = reader.read_struct().map_err(Error::from_header(FORMAT))?;
        let file_size = u64::from(header.file_size);
        if file_size > len || file_size < HEADER_SIZE {
            return Err(Error::Integrity(format!(
                "header claims {file_size:#X} bytes but the file holds {len:#X}"
            )));
        }

        let table_size = u64::from(header.pointer_table_size);
        if table_size > file_size - HEADER_SIZE {
            return Err(Error::Integrity("pointer table is larger than the file".to_owned()));
        }
        reader.seek_to(file_size - table_size)?;
        let pointers = reader.read_pointer_table(table_size as usize, HEADER_SIZE as u32)?;
        if let Some(pointer) = pointers.iter().find(|&&p| u64::from(p) + 8 > file_size) {
            return Err(Error::Integrity(format!(
                "pointer at {pointer:#X} lies outside the archive"
            )));
        }
        trace!("{} pointers", pointers.len());

        let mut archive = Archive::new();
        let type_tree = read_tree(&mut reader, HEADER_SIZE, file_size)?;
        for (type_name, file_tree_ptr) in type_tree.entries() {
            let extension = type_name.split_once(':').map_or(type_name.as_str(), |(ext, _)| ext);
            let file_tree = read_tree(&mut reader, *file_tree_ptr, file_size)?;

            for (stem, entry_ptr) in file_tree.entries() {
                check_range(*entry_ptr, DATA_ENTRY_SIZE, file_size)?;
                reader.seek_to(*entry_ptr)?;
                let entry: RawDataEntry = reader.read_struct()?;
                if entry.kind == DataKind::Proxy {
                    trace!("skipping proxy {stem}.{extension}");
                    continue;
                }

                check_range(entry.data_ptr, u64::from(entry.data_size), file_size)?;
                reader.seek_to(entry.data_ptr)?;
                let data = reader.read_bytes(entry.data_size as usize)?;

                let name = if extension.is_empty() {
                    stem
                } else {
                    format!("{stem}.{extension}")
                };
                trace!("{name}: {:#X} bytes", data.len());
                archive.push(ArchiveFile::new(name, data));
            }
        }

        let mut split_names = Vec::new();
        if header.kind & KIND_HAS_SPLITS != 0 && header.split_table_size > 0 {
            let offset = HEADER_SIZE + u64::from(header.trees_size);
            check_range(offset, u64::from(header.split_table_size), file_size)?;
            reader.seek_to(offset)?;
            let count = reader.read_u64()?;
            check_range(offset + 8, count.saturating_mul(8), file_size)?;
            for _ in 0..count {
                let name_ptr = reader.read_u64()?;
                check_range(name_ptr, 1, file_size)?;
                split_names.push(reader.read_at(name_ptr, |r| r.read_cstring())?);
            }
        }

        debug!(
            "read {} files and {} split names",
            archive.len(),
            split_names.len()
        );
        archive.mark_saved();
        Ok(PacArchive {
            archive,
            uid: header.uid,
            endian,
            split_names,
        })
    }
}

fn check_range(offset: u64, size: u64, file_size: u64) -> Result<()> {
    match offset.checked_add(size) {
        Some(end) if offset >= HEADER_SIZE && end <= file_size => Ok(()),
        _ => Err(Error::Integrity(format!(
            "{size:#X} bytes at {offset:#X} lie outside the archive"
        ))),
    }
}

/// Read the node tree at `offset`, with each payload being the node's data pointer
fn read_tree<R: Read + Seek>(
    reader: &mut BinaryReader<R>,
    offset: u64,
    file_size: u64,
) -> Result<NodeTree<u64>> {
    check_range(offset, 0x18, file_size)?;
    reader.seek_to(offset)?;
    let header: RawTreeHeader = reader.read_struct()?;

    let count = u64::from(header.node_count);
    check_range(header.nodes_ptr, count * NODE_SIZE, file_size)?;
    reader.seek_to(header.nodes_ptr)?;
    let raw = (0..count)
        .map(|_| reader.read_struct::<RawNode>())
        .collect::<hedge_bin::error::Result<Vec<_>>>()?;

    let mut nodes = Vec::with_capacity(raw.len());
    for (index, node) in raw.iter().enumerate() {
        let name = if node.name_ptr != 0 {
            check_range(node.name_ptr, 1, file_size)?;
            reader.read_at(node.name_ptr, |r| r.read_cstring())?
        } else {
            String::new()
        };

        let mut children = Vec::with_capacity(node.child_count as usize);
        if node.child_count > 0 {
            check_range(node.children_ptr, u64::from(node.child_count) * 4, file_size)?;
            reader.seek_to(node.children_ptr)?;
            for _ in 0..node.child_count {
                let child = reader.read_i32()?;
                children.push(usize::try_from(child).map_err(|_| {
                    Error::Integrity(format!("node {index} lists child {child}"))
                })?);
            }
        }

        nodes.push(Node {
            name,
            payload: (node.has_data != 0).then_some(node.data_ptr),
            parent: usize::try_from(node.parent_index).ok(),
            children,
            payload_index: usize::try_from(node.data_index).ok(),
        });
    }

    let tree = NodeTree::from_nodes(nodes)?;
    if tree.data_indices().len() != header.data_node_count as usize {
        return Err(Error::Integrity(format!(
            "tree at {offset:#X} declares {} data nodes but holds {}",
            header.data_node_count,
            tree.data_indices().len()
        )));
    }
    Ok(tree)
}
