pub mod extract;
pub mod list;
pub mod pack;
pub mod splits;

use hedge_archive::Format;

#[derive(clap::Subcommand)]
pub enum ArchiveCommands {
    /// Extract an archive, including its split parts, into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into an archive
    Pack(pack::PackArgs),
    /// List every file of an archive with its size
    List(list::ListArgs),
    /// List the files that make up an archive
    Splits(splits::SplitsArgs),
}

impl ArchiveCommands {
    pub fn handle(&self, format: Format) -> miette::Result<()> {
        match self {
            ArchiveCommands::Extract(extract) => extract.handle(format),
            ArchiveCommands::Pack(pack) => pack.handle(format),
            ArchiveCommands::List(list) => list.handle(format),
            ArchiveCommands::Splits(splits) => splits.handle(format),
        }
    }
}
