//! This library handles reading from and creating the archive formats used by the *Sonic the Hedgehog*
//! games.
//!
//! # Supported Formats
//!
//! | Format          | Games                                | Extensions                      | Byte order     |
//! |-----------------|--------------------------------------|---------------------------------|----------------|
//! | AR              | Unleashed, Generations               | `.ar`, `.ar.NN`, `.pfd`, `.arl` | little         |
//! | PACx v3         | Forces                               | `.pac`, `.pac.NNN`              | little or big  |
//! | ONE             | Heroes, Shadow the Hedgehog          | `.one`                          | little         |
//! | U8              | Wii titles                           | `.arc`                          | big            |
//! | Storybook ONE   | Secret Rings, Black Knight           | `.one`                          | big            |
//!
//! Every format reads into and writes from the same [`Archive`] model: a tree of named files and
//! directories. Each format wraps it in its own type ([`GensArchive`], [`PacArchive`], ...) that
//! dereferences to [`Archive`] and carries the format specific settings, such as the AR padding or the
//! PACx byte order. [`AnyArchive`] dispatches over all of them when the format is only known at
//! runtime, and [`Format::detect`] picks it from a file's signature or extension.
//!
//! ## Split Archives
//!
//! AR and PACx archives can spread their files over several physical files. [`GensArchive::load`] and
//! [`PacArchive::load`] follow the whole chain, [`AnyArchive::split_archives`] lists it without
//! reading anything, and saving with a split size writes the parts.
//!
//! | Format | Parts                          | Index                                       |
//! |--------|--------------------------------|---------------------------------------------|
//! | AR     | `name.ar.00`, `name.ar.01`, ...  | optional `name.arl` list of sizes and names |
//! | PACx   | `name.pac.000`, `name.pac.001`, ... | root `name.pac` names every part          |
//!
//! ## Examples
//!
//! ```no_run
//! # fn doit() -> hedge_archive::error::Result<()> {
//! use hedge_archive::{AnyArchive, Format};
//!
//! let format = Format::detect("ghz200.ar.00")?;
//! let mut archive = AnyArchive::load(format, "ghz200.ar.00")?;
//!
//! archive.archive_mut().remove("a.txt");
//! archive.save("ghz200.ar", Some(0xA00000))?;
//! # Ok(())
//! # }
//! ```
//!

pub mod archive;
pub mod compression;
pub mod error;
pub mod format;
pub mod gens;
pub mod node_tree;
pub mod one;
pub mod pac;
pub mod split;
pub mod storybook;
pub mod u8;

pub use archive::{Archive, ArchiveDirectory, ArchiveEntry, ArchiveFile, ArchiveFileRef};
pub use compression::CompressionMethod;
pub use format::{AnyArchive, Format};
pub use gens::{GensArchive, GensWriteOptions};
pub use node_tree::NodeTree;
pub use one::{OneArchive, OneMagic};
pub use pac::{PacArchive, PacWriteOptions};
pub use storybook::StorybookArchive;
pub use u8::{U8Archive, U8WriteOptions};
