use clap::Args;
use hedge_archive::{AnyArchive, Format};
use miette::{Context, Result};
use owo_colors::{OwoColorize, Stream::Stdout};
use std::path::PathBuf;

#[derive(Args)]
pub struct ListArgs {
    /// An input archive, or any part of a split archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl ListArgs {
    pub fn handle(&self, format: Format) -> Result<()> {
        let archive = AnyArchive::load(format, &self.file)
            .context(format!("loading {}", self.file.display()))?;

        for file in archive.archive().files(true) {
            println!(
                "{} {}",
                file.path,
                file.file.size().if_supports_color(Stdout, |s| s.dimmed())
            );
        }
        Ok(())
    }
}
