use clap::Args;
use hedge_archive::{AnyArchive, Format};
use miette::{miette, Context, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Spread the files over parts of at most this many bytes
    #[arg(long, value_name = "BYTES")]
    split_size: Option<u64>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self, format: Format) -> Result<()> {
        if !self.overwrite && self.file.exists() {
            return Err(miette!(
                "{} already exists, use --overwrite to replace it",
                self.file.display()
            ));
        }

        let mut archive = AnyArchive::new(format);
        archive
            .archive_mut()
            .add_directory(&self.directory, true)
            .context(format!("reading {}", self.directory.display()))?;

        let count = archive.archive().files(true).len();
        if count == 0 {
            return Err(miette!("directory is empty"));
        }

        info!("packing {count} files into {}", self.file.display());
        archive
            .save(&self.file, self.split_size)
            .context(format!("saving {}", self.file.display()))?;
        Ok(())
    }
}
