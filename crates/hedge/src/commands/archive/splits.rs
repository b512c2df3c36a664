use clap::Args;
use hedge_archive::{AnyArchive, Format};
use itertools::Itertools;
use miette::{miette, Result};
use std::path::PathBuf;

#[derive(Args)]
pub struct SplitsArgs {
    /// An input archive, or any part of a split archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl SplitsArgs {
    pub fn handle(&self, format: Format) -> Result<()> {
        let parts = AnyArchive::split_archives(format, &self.file);
        if parts.is_empty() {
            return Err(miette!("no {format} archive found at {}", self.file.display()));
        }

        println!("{}", parts.iter().map(|p| p.display()).join("\n"));
        Ok(())
    }
}
