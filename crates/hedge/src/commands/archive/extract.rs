use clap::Args;
use hedge_archive::{AnyArchive, Format};
use miette::{miette, Context, IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive, or any part of a split archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self, format: Format) -> Result<()> {
        if !self.overwrite && !is_empty_dir(&self.directory)? {
            return Err(miette!(
                "{} is not empty, use --overwrite to extract into it anyway",
                self.directory.display()
            ));
        }

        let archive = AnyArchive::load(format, &self.file)
            .context(format!("loading {}", self.file.display()))?;
        info!(
            "extracting {} files to {}",
            archive.archive().files(true).len(),
            self.directory.display()
        );

        archive
            .archive()
            .extract(&self.directory)
            .context(format!("extracting to {}", self.directory.display()))?;
        Ok(())
    }
}

/// A missing directory counts as empty
fn is_empty_dir(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    let mut entries = std::fs::read_dir(path)
        .into_diagnostic()
        .context(format!("reading {}", path.display()))?;
    Ok(entries.next().is_none())
}
