//! Writing PACx archives
//!

use std::io::{Seek, Write};

use bon::Builder;
use hedge_bin::{BinaryWriter, Endian, Slot};
use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::node_tree::NodeTree;
use crate::pac::types::{
    is_root_exclusive, resource_type, DataKind, PacHeader, DATA_ENTRY_SIZE, HEADER_SIZE,
    HEADER_UNKNOWN, KIND_HAS_SPLITS, KIND_ROOT, KIND_SPLIT, MAX_SPLITS, SIGNATURE, VERSION,
};
use crate::pac::PacArchive;

/// Options for how a PACx archive should be written
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct PacWriteOptions {
    /// Byte order of every field after the signature
    #[builder(default)]
    pub endian: Endian,

    /// Largest amount of file data a split part may hold; `None` keeps everything in the root
    pub split_size: Option<u64>,

    /// Identifier shared by the root and its parts
    #[builder(default)]
    pub uid: u32,
}

/// A file as it goes into a single PACx archive
#[derive(Debug, Clone, Copy)]
pub(crate) struct PacFile<'a> {
    pub stem: &'a str,
    pub extension: &'a str,
    pub data: &'a [u8],
    /// Only listed here, the data is stored in a split part
    pub proxy: bool,
}

impl<'a> PacFile<'a> {
    fn new(name: &'a str, data: &'a [u8]) -> Self {
        let (stem, extension) = name.split_once('.').unwrap_or((name, ""));
        Self {
            stem,
            extension,
            data,
            proxy: false,
        }
    }
}

/// Layout of a root archive and its split parts
#[derive(Debug, Default)]
pub(crate) struct SplitPlan<'a> {
    pub root: Vec<PacFile<'a>>,
    pub parts: Vec<Vec<PacFile<'a>>>,
}

impl PacArchive {
    /// Write every file into a single root archive
    ///
    /// The split size of `options` is ignored, use [`PacArchive::save`] to write split parts.
    #[instrument(skip(self, writer), err)]
    pub fn write<W: Write + Seek>(&mut self, writer: W, options: &PacWriteOptions) -> Result<()> {
        let files = self.pac_files()?;
        write_pac(writer, options, KIND_ROOT, &files, &[])?;

        self.uid = options.uid;
        self.endian = options.endian;
        self.split_names.clear();
        self.mark_saved();
        Ok(())
    }

    /// Flatten the archive into the files of each PACx file
    pub(crate) fn pac_files(&self) -> Result<Vec<PacFile<'_>>> {
        let mut seen = IndexMap::new();
        let mut files = Vec::new();
        for entry in self.files(true) {
            let file = PacFile::new(entry.file.name(), entry.file.data());
            if let Some(previous) = seen.insert((file.stem, file.extension), entry.path.clone()) {
                return Err(Error::CustomError(format!(
                    "{} and {previous} share the name {}",
                    entry.path,
                    entry.file.name()
                )));
            }
            files.push(file);
        }
        Ok(files)
    }

    /// Decide which files go into the root and which into each split part
    ///
    /// Root exclusive files always stay in the root. The others fill parts in order, starting a new
    /// part when the data of the next file would push the current one past `split_size`.
    pub(crate) fn plan_splits(files: Vec<PacFile<'_>>, split_size: u64) -> Result<SplitPlan<'_>> {
        let mut plan = SplitPlan::default();
        let mut current = Vec::new();
        let mut current_size = 0u64;

        for file in files {
            if is_root_exclusive(file.extension) {
                warn!(
                    "keeping {}.{} in the root archive",
                    file.stem, file.extension
                );
                plan.root.push(file);
                continue;
            }

            let size = (file.data.len() as u64).next_multiple_of(16);
            if !current.is_empty() && current_size + size > split_size {
                plan.parts.push(std::mem::take(&mut current));
                current_size = 0;
            }
            current_size += size;
            plan.root.push(PacFile {
                proxy: true,
                ..file
            });
            current.push(file);
        }
        if !current.is_empty() {
            plan.parts.push(current);
        }

        if plan.parts.len() > MAX_SPLITS {
            return Err(Error::CapacityExceeded {
                what: "split parts",
                limit: MAX_SPLITS,
                actual: plan.parts.len(),
            });
        }
        Ok(plan)
    }
}

/// Node names and split names waiting for the string table
#[derive(Default)]
struct StringTable {
    strings: IndexMap<String, Vec<Slot>>,
}

impl StringTable {
    fn add(&mut self, value: &str, slot: Slot) {
        self.strings.entry(value.to_owned()).or_default().push(slot);
    }

    fn write<W: Write + Seek>(self, writer: &mut BinaryWriter<W>) -> Result<()> {
        for (value, slots) in self.strings {
            for slot in slots {
                writer.backpatch(slot)?;
            }
            writer.write_cstring(&value)?;
        }
        writer.pad_to(8)?;
        Ok(())
    }
}

/// Write a node tree, returning the data pointer slot of every payload
///
/// Packed trees number their payloads in node order, so the slots come back in payload order.
fn write_tree<'t, W: Write + Seek, T>(
    writer: &mut BinaryWriter<W>,
    tree: &'t NodeTree<T>,
    strings: &mut StringTable,
) -> Result<Vec<(Slot, &'t T)>> {
    writer.write_u32(tree.len() as u32)?;
    writer.write_u32(tree.data_indices().len() as u32)?;
    let nodes_ptr = writer.reserve_pointer()?;
    let data_indices_ptr = writer.reserve_pointer()?;
    writer.backpatch(nodes_ptr)?;

    let mut payloads = Vec::with_capacity(tree.data_indices().len());
    let mut children = Vec::new();
    for (index, node) in tree.nodes().iter().enumerate() {
        if node.name.is_empty() {
            writer.write_u64(0)?;
        } else {
            let slot = writer.reserve_pointer()?;
            strings.add(&node.name, slot);
        }

        match &node.payload {
            Some(payload) => payloads.push((writer.reserve_pointer()?, payload)),
            None => writer.write_u64(0)?,
        }

        if node.children.is_empty() {
            writer.write_u64(0)?;
        } else {
            children.push((writer.reserve_pointer()?, &node.children));
        }

        let full_path_size = tree.full_name(index).len();
        let full_path_size = u8::try_from(full_path_size).map_err(|_| Error::CapacityExceeded {
            what: "bytes in a node path",
            limit: u8::MAX as usize,
            actual: full_path_size,
        })?;

        writer.write_i32(node.parent.map_or(-1, |p| p as i32))?;
        writer.write_i32(index as i32)?;
        writer.write_i32(node.payload_index.map_or(-1, |i| i as i32))?;
        writer.write_u16(node.children.len() as u16)?;
        writer.write_u8(u8::from(node.payload.is_some()))?;
        writer.write_u8(full_path_size)?;
    }

    for (slot, indices) in children {
        writer.backpatch(slot)?;
        for &child in indices {
            writer.write_i32(child as i32)?;
        }
        writer.pad_to(8)?;
    }

    writer.backpatch(data_indices_ptr)?;
    for &index in tree.data_indices() {
        writer.write_i32(index as i32)?;
    }
    writer.pad_to(8)?;

    Ok(payloads)
}

/// Write one PACx file holding `files`, listing `split_names` in its split table
#[instrument(skip(writer, files, split_names), fields(files = files.len()), err)]
pub(crate) fn write_pac<W: Write + Seek>(
    writer: W,
    options: &PacWriteOptions,
    kind: u16,
    files: &[PacFile<'_>],
    split_names: &[String],
) -> Result<W> {
    let mut writer = BinaryWriter::new(writer, options.endian);
    let mut strings = StringTable::default();
    writer.write_zeros(HEADER_SIZE as usize)?;

    // group files by type, keeping first-seen order
    let mut types: IndexMap<String, Vec<(String, usize)>> = IndexMap::new();
    for (index, file) in files.iter().enumerate() {
        let type_name = format!("{}:{}", file.extension, resource_type(file.extension));
        types
            .entry(type_name)
            .or_default()
            .push((file.stem.to_owned(), index));
    }

    let type_tree = NodeTree::pack(
        types.keys().cloned().enumerate().map(|(i, name)| (name, i)).collect(),
        true,
    );
    let file_trees: Vec<_> = types
        .into_values()
        .map(|entries| NodeTree::pack(entries, true))
        .collect();

    let mut entry_slots: Vec<Option<Slot>> = (0..files.len()).map(|_| None).collect();
    for (slot, &type_index) in write_tree(&mut writer, &type_tree, &mut strings)? {
        writer.backpatch(slot)?;
        for (slot, &file_index) in write_tree(&mut writer, &file_trees[type_index], &mut strings)? {
            entry_slots[file_index] = Some(slot);
        }
    }
    let trees_end = writer.position()?;

    if !split_names.is_empty() {
        if split_names.len() > MAX_SPLITS {
            return Err(Error::CapacityExceeded {
                what: "split parts",
                limit: MAX_SPLITS,
                actual: split_names.len(),
            });
        }
        writer.write_u64(split_names.len() as u64)?;
        for name in split_names {
            let slot = writer.reserve_pointer()?;
            strings.add(name, slot);
        }
    }
    let split_table_end = writer.position()?;

    let mut data_slots = Vec::with_capacity(files.len());
    for (file, slot) in files.iter().zip(entry_slots) {
        let slot = slot.ok_or_else(|| {
            Error::CustomError(format!("{}.{} is missing from its tree", file.stem, file.extension))
        })?;
        writer.backpatch(slot)?;

        let size = u32::try_from(file.data.len()).map_err(|_| Error::CapacityExceeded {
            what: "bytes in a PACx entry",
            limit: u32::MAX as usize,
            actual: file.data.len(),
        })?;
        writer.write_u32(size)?;
        writer.write_u32(0)?;
        if file.proxy {
            writer.write_u64(0)?;
        } else {
            data_slots.push((writer.reserve_pointer()?, file.data));
        }
        writer.write_u64(0)?;
        writer.write_u64(0)?;
        let data_kind = if file.proxy {
            DataKind::Proxy
        } else {
            DataKind::of(file.data)
        };
        writer.write_struct(&data_kind)?;
        writer.write_zeros(7)?;
    }
    let data_entries_end = writer.position()?;
    debug_assert_eq!(
        data_entries_end - split_table_end,
        files.len() as u64 * DATA_ENTRY_SIZE
    );

    strings.write(&mut writer)?;
    let string_table_end = writer.position()?;

    for (slot, data) in data_slots {
        writer.pad_to(16)?;
        writer.backpatch(slot)?;
        writer.write_bytes(data)?;
    }
    writer.pad_to(16)?;
    let data_end = writer.position()?;

    let pointer_table_size = writer.write_pointer_table(HEADER_SIZE as u32)?;
    let file_size = writer.position()?;

    let size = |value: u64| {
        u32::try_from(value).map_err(|_| Error::CapacityExceeded {
            what: "bytes in a PACx archive",
            limit: u32::MAX as usize,
            actual: value as usize,
        })
    };
    let header = PacHeader {
        uid: options.uid,
        file_size: size(file_size)?,
        trees_size: size(trees_end - HEADER_SIZE)?,
        split_table_size: size(split_table_end - trees_end)?,
        data_entries_size: size(data_entries_end - split_table_end)?,
        string_table_size: size(string_table_end - data_entries_end)?,
        data_size: size(data_end - string_table_end)?,
        pointer_table_size,
        kind: if split_names.is_empty() {
            kind
        } else {
            kind | KIND_HAS_SPLITS
        },
        unknown: HEADER_UNKNOWN,
        split_count: split_names.len() as u32,
    };

    writer.seek_to(0)?;
    writer.write_bytes(SIGNATURE)?;
    writer.write_bytes(VERSION)?;
    writer.write_u8(options.endian.marker())?;
    writer.write_struct(&header)?;
    writer.seek_to(file_size)?;

    debug!("wrote {} files in {file_size:#X} bytes", files.len());
    Ok(writer.finish()?)
}

/// Write a root archive and its split parts
///
/// `create` is called with `None` for the root and `Some(index)` for every part, and returns the
/// stream to write to and the file name the root lists for that part.
pub(crate) fn write_split<W, F>(
    plan: &SplitPlan<'_>,
    options: &PacWriteOptions,
    mut create: F,
) -> Result<Vec<String>>
where
    W: Write + Seek,
    F: FnMut(Option<usize>) -> Result<(W, String)>,
{
    let mut split_names = Vec::with_capacity(plan.parts.len());
    for (index, part) in plan.parts.iter().enumerate() {
        let (writer, name) = create(Some(index))?;
        write_pac(writer, options, KIND_SPLIT, part, &[])?;
        split_names.push(name);
    }

    let (writer, _) = create(None)?;
    write_pac(writer, options, KIND_ROOT, &plan.root, &split_names)?;
    Ok(split_names)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::error::{Error, Result};
    use crate::pac::types::{KIND_HAS_SPLITS, KIND_ROOT};
    use crate::pac::write::{write_pac, PacFile, PacWriteOptions};
    use crate::pac::PacArchive;

    fn sample() -> Result<PacArchive> {
        let mut archive = PacArchive::default();
        archive.add_file("cat.dds", b"DDS cat".to_vec())?;
        archive.add_file("car.dds", b"DDS car".to_vec())?;
        archive.add_file("dog.dds", b"DDS dog".to_vec())?;
        archive.add_file("chr_sonic.skl.hkx", vec![0x57; 0x30])?;
        archive.add_file("stage.lua", b"print(1)".to_vec())?;
        Ok(archive)
    }

    #[test]
    fn header_describes_sections() -> Result<()> {
        let files = [PacFile::new("a.txt", b"hi")];
        let options = PacWriteOptions::builder().uid(0xCAFE).build();
        let output = write_pac(Cursor::new(Vec::new()), &options, KIND_ROOT, &files, &[])?;
        let bytes = output.into_inner();

        assert_eq!(&bytes[..8], b"PACx301L");
        assert_eq!(&bytes[8..12], &0xCAFEu32.to_le_bytes());
        assert_eq!(&bytes[12..16], &(bytes.len() as u32).to_le_bytes());
        // root kind and the constant after it
        assert_eq!(&bytes[0x28..0x2C], &[0x01, 0x00, 0x08, 0x01]);
        assert_eq!(bytes.len() % 4, 0);
        Ok(())
    }

    #[test]
    #[traced_test]
    fn write_then_read_keeps_files() -> Result<()> {
        for endian in [hedge_bin::Endian::Little, hedge_bin::Endian::Big] {
            let mut archive = sample()?;
            let options = PacWriteOptions::builder().endian(endian).uid(7).build();

            let mut output = Cursor::new(Vec::new());
            archive.write(&mut output, &options)?;
            assert!(archive.is_saved());
            output.set_position(0);

            let mut read = PacArchive::read(output)?;
            assert_eq!(read.uid(), 7);
            assert_eq!(read.endian(), endian);
            read.sort();
            let mut expected = sample()?;
            expected.sort();
            assert_eq!(read.entries(), expected.entries());
        }
        Ok(())
    }

    #[test]
    fn duplicate_names_are_rejected() -> Result<()> {
        let mut archive = PacArchive::default();
        archive.add_file("a/x.dds", vec![1])?;
        archive.add_file("b/x.dds", vec![2])?;

        assert!(matches!(
            archive.write(Cursor::new(Vec::new()), &PacWriteOptions::default()),
            Err(Error::CustomError(_))
        ));
        Ok(())
    }

    #[test]
    fn long_paths_exceed_capacity() -> Result<()> {
        let mut archive = PacArchive::default();
        archive.add_file(&format!("{}.dds", "x".repeat(300)), vec![1])?;

        assert!(matches!(
            archive.write(Cursor::new(Vec::new()), &PacWriteOptions::default()),
            Err(Error::CapacityExceeded { .. })
        ));
        Ok(())
    }

    #[test]
    #[traced_test]
    fn root_exclusive_files_stay_in_root() -> Result<()> {
        let archive = sample()?;
        let files = archive.pac_files()?;
        let plan = PacArchive::plan_splits(files, 0x10)?;

        let root: Vec<_> = plan
            .root
            .iter()
            .map(|f| (f.stem, f.extension, f.proxy))
            .collect();
        assert_eq!(
            root,
            vec![
                ("cat", "dds", true),
                ("car", "dds", true),
                ("dog", "dds", true),
                ("chr_sonic", "skl.hkx", false),
                ("stage", "lua", false),
            ]
        );
        let parts: Vec<Vec<_>> = plan
            .parts
            .iter()
            .map(|p| p.iter().map(|f| f.stem).collect())
            .collect();
        assert_eq!(parts, vec![vec!["cat"], vec!["car"], vec!["dog"]]);
        assert!(logs_contain("keeping chr_sonic.skl.hkx in the root archive"));
        Ok(())
    }

    #[test]
    fn split_kind_flags() -> Result<()> {
        let files = [PacFile::new("a.dds", b"DDS ")];
        let output = write_pac(
            Cursor::new(Vec::new()),
            &PacWriteOptions::default(),
            KIND_ROOT,
            &files,
            &["a.pac.000".to_owned()],
        )?;
        let bytes = output.into_inner();
        let kind = u16::from_le_bytes([bytes[0x28], bytes[0x29]]);
        assert_eq!(kind, KIND_ROOT | KIND_HAS_SPLITS);
        Ok(())
    }
}
