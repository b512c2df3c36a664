use clap::Args;
use hedge_archive::{AnyArchive, Format};
use miette::{miette, Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::commands::ArchiveFormat;

#[derive(Args)]
pub struct ConvertArgs {
    /// An input archive, or any part of a split archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Format of the input, detected when omitted
    #[arg(long, value_enum)]
    from: Option<ArchiveFormat>,

    /// Format to convert to
    #[arg(long, value_enum)]
    to: ArchiveFormat,

    /// A target archive
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Spread the files over parts of at most this many bytes
    #[arg(long, value_name = "BYTES")]
    split_size: Option<u64>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ConvertArgs {
    pub fn handle(&self) -> Result<()> {
        if !self.overwrite && self.output.exists() {
            return Err(miette!(
                "{} already exists, use --overwrite to replace it",
                self.output.display()
            ));
        }

        let from = match self.from {
            Some(from) => from.into(),
            None => Format::detect(&self.file)
                .context(format!("inspecting {}", self.file.display()))?,
        };
        let to = Format::from(self.to);

        let source = AnyArchive::load(from, &self.file)
            .context(format!("loading {}", self.file.display()))?;
        let mut target = AnyArchive::new(to);
        *target.archive_mut() = source.archive().clone();

        info!("converting {from} to {to}");
        target
            .save(&self.output, self.split_size)
            .context(format!("saving {}", self.output.display()))?;
        Ok(())
    }
}
