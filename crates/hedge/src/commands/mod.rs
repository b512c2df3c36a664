pub mod archive;
pub mod convert;
pub mod detect;

use clap::ValueEnum;
use hedge_archive::Format;

/// Archive formats as named on the command line
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ArchiveFormat {
    /// AR archives from Unleashed and Generations
    Ar,
    /// PACx archives from Forces
    Pac,
    /// ONE archives from Heroes and Shadow the Hedgehog
    One,
    /// U8 archives from Wii titles
    U8,
    /// ONE archives from the Storybook series
    Storybook,
}

impl From<ArchiveFormat> for Format {
    fn from(value: ArchiveFormat) -> Self {
        match value {
            ArchiveFormat::Ar => Format::Gens,
            ArchiveFormat::Pac => Format::Pac,
            ArchiveFormat::One => Format::One,
            ArchiveFormat::U8 => Format::U8,
            ArchiveFormat::Storybook => Format::Storybook,
        }
    }
}

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle AR archives
    Ar {
        #[command(subcommand)]
        command: archive::ArchiveCommands,
    },
    /// Handle PACx archives
    Pac {
        #[command(subcommand)]
        command: archive::ArchiveCommands,
    },
    /// Handle Heroes and Shadow ONE archives
    One {
        #[command(subcommand)]
        command: archive::ArchiveCommands,
    },
    /// Handle U8 archives
    U8 {
        #[command(subcommand)]
        command: archive::ArchiveCommands,
    },
    /// Handle Storybook ONE archives
    Storybook {
        #[command(subcommand)]
        command: archive::ArchiveCommands,
    },
    /// Print the format of an archive
    Detect(detect::DetectArgs),
    /// Repack an archive into another format
    Convert(convert::ConvertArgs),
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Ar { command } => command.handle(ArchiveFormat::Ar.into()),
            Commands::Pac { command } => command.handle(ArchiveFormat::Pac.into()),
            Commands::One { command } => command.handle(ArchiveFormat::One.into()),
            Commands::U8 { command } => command.handle(ArchiveFormat::U8.into()),
            Commands::Storybook { command } => command.handle(ArchiveFormat::Storybook.into()),
            Commands::Detect(detect) => detect.handle(),
            Commands::Convert(convert) => convert.handle(),
        }
    }
}
