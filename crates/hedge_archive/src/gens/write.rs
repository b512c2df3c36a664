//! Writing AR archives and ARL lists
//!

use std::io::{Seek, Write};

use bon::Builder;
use hedge_bin::{BinaryWriter, Endian};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::gens::types::{ArlHeader, GensHeader, DEFAULT_PADDING, ENTRY_HEADER_SIZE, HEADER_SIZE};
use crate::gens::GensArchive;

/// Options for how an AR archive should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct GensWriteOptions {
    /// Alignment of entry data
    #[builder(default = DEFAULT_PADDING)]
    pub padding: u32,

    /// Largest size of a single part; `None` writes a single archive
    pub split_size: Option<u64>,

    /// Write an ARL list next to split parts
    #[builder(default = true)]
    pub write_list: bool,
}

impl Default for GensWriteOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Size of an entry written at `position`, data padding included
fn entry_size(position: u64, name: &str, data_size: usize, padding: u32) -> u64 {
    let header_end = position + ENTRY_HEADER_SIZE + name.len() as u64 + 1;
    let data_start = match u64::from(padding) {
        0 | 1 => header_end,
        padding => header_end.div_ceil(padding) * padding,
    };
    data_start - position + data_size as u64
}

impl GensArchive {
    /// Write every file into a single archive
    ///
    /// Directories are flattened; every entry is named after its file name alone. The split size of
    /// `options` is ignored, use [`GensArchive::save`] to write split parts.
    #[instrument(skip(self, writer), err)]
    pub fn write<W: Write + Seek>(&mut self, writer: W, options: &GensWriteOptions) -> Result<()> {
        let files = self.flattened();
        write_part(writer, &files, options.padding)?;
        self.padding = options.padding;
        self.mark_saved();
        Ok(())
    }

    /// Write the archive as a chain of parts no larger than `split_size`, returning the size of each
    ///
    /// `create` is called with the index of every part that is started. A part always holds at least
    /// one entry, so an entry larger than `split_size` gets a part of its own.
    #[instrument(skip(self, options, create), err)]
    pub fn write_parts<W, F>(
        &mut self,
        split_size: u64,
        options: &GensWriteOptions,
        mut create: F,
    ) -> Result<Vec<(u32, Vec<String>)>>
    where
        W: Write + Seek,
        F: FnMut(usize) -> Result<W>,
    {
        let files = self.flattened();

        let mut groups: Vec<Vec<(&str, &[u8])>> = vec![Vec::new()];
        let mut position = HEADER_SIZE;
        for &(name, data) in &files {
            let mut size = entry_size(position, name, data.len(), options.padding);
            if groups.last().is_some_and(|g| !g.is_empty()) && position + size > split_size {
                groups.push(Vec::new());
                position = HEADER_SIZE;
                size = entry_size(position, name, data.len(), options.padding);
            }
            position += size;
            if let Some(group) = groups.last_mut() {
                group.push((name, data));
            }
        }

        let mut parts = Vec::with_capacity(groups.len());
        for (index, group) in groups.iter().enumerate() {
            debug!("writing part {index} with {} files", group.len());
            let size = write_part(create(index)?, group, options.padding)?;
            let size = u32::try_from(size).map_err(|_| Error::CapacityExceeded {
                what: "bytes in an AR part",
                limit: u32::MAX as usize,
                actual: size as usize,
            })?;
            let names = group.iter().map(|(name, _)| name.to_string()).collect();
            parts.push((size, names));
        }

        self.padding = options.padding;
        self.mark_saved();
        Ok(parts)
    }

    /// Write an ARL list for parts returned by [`GensArchive::write_parts`]
    #[instrument(skip(writer, parts), err)]
    pub fn write_list<W: Write + Seek>(writer: W, parts: &[(u32, Vec<String>)]) -> Result<()> {
        let mut writer = BinaryWriter::new(writer, Endian::Little);
        let header = ArlHeader::new(parts.iter().map(|(size, _)| *size).collect());
        writer.write_struct(&header)?;

        for name in parts.iter().flat_map(|(_, names)| names) {
            let size = u8::try_from(name.len()).map_err(|_| Error::CapacityExceeded {
                what: "bytes in an ARL file name",
                limit: u8::MAX as usize,
                actual: name.len(),
            })?;
            writer.write_u8(size)?;
            writer.write_bytes(name.as_bytes())?;
        }

        writer.finish()?;
        Ok(())
    }

    fn flattened(&self) -> Vec<(&str, &[u8])> {
        self.files(true)
            .into_iter()
            .map(|f| (f.file.name(), f.file.data()))
            .collect()
    }
}

/// Write one complete archive, returning its size
fn write_part<W: Write + Seek>(writer: W, files: &[(&str, &[u8])], padding: u32) -> Result<u64> {
    let mut writer = BinaryWriter::new(writer, Endian::Little);
    writer.write_struct(&GensHeader { padding })?;

    for &(name, data) in files {
        let start = writer.position()?;
        let entry_size = writer.reserve_u32()?;
        let data_size = u32::try_from(data.len()).map_err(|_| Error::CapacityExceeded {
            what: "bytes in an AR entry",
            limit: u32::MAX as usize,
            actual: data.len(),
        })?;
        writer.write_u32(data_size)?;
        let data_offset = writer.reserve_u32()?;
        writer.write_u64(0)?;
        writer.write_cstring(name)?;
        writer.pad_to(u64::from(padding))?;

        writer.backpatch_relative(data_offset, start)?;
        writer.write_bytes(data)?;
        writer.backpatch_relative(entry_size, start)?;
    }

    let size = writer.position()?;
    writer.finish()?;
    Ok(size)
}
