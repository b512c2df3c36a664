use clap::Args;
use hedge_archive::Format;
use miette::{Context, Result};
use owo_colors::{OwoColorize, Stream::Stdout};
use std::path::PathBuf;

#[derive(Args)]
pub struct DetectArgs {
    /// A file to inspect
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

impl DetectArgs {
    pub fn handle(&self) -> Result<()> {
        let format = Format::detect(&self.file)
            .context(format!("inspecting {}", self.file.display()))?;
        println!(
            "{}: {}",
            self.file.display(),
            format.if_supports_color(Stdout, |f| f.green())
        );
        Ok(())
    }
}
