//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// the stream ended before a value could be read
    #[error("unexpected end of data at offset {position:#X}")]
    UnexpectedEndOfData {
        /// Stream position when the read failed
        position: u64,
    },

    /// the writer was finished while relocation slots were still waiting for a value
    #[error("unresolved relocation slots: {}", .0.join(", "))]
    #[diagnostic(help("every reserved slot must be backpatched before the stream is finished"))]
    UnresolvedSlots(Vec<String>),

    /// a backpatch was requested for a slot that is not pending
    #[error("unknown relocation slot {0}")]
    UnknownSlot(String),

    /// a value does not fit into the reserved slot
    #[error("offset {value:#X} does not fit into a 32-bit slot")]
    OffsetOverflow {
        /// The value that was going to be written
        value: u64,
    },

    /// a relative backpatch would produce a negative offset
    #[error("position {position:#X} lies before base {base:#X}")]
    NegativeOffset {
        /// Target position
        position: u64,
        /// Base the target was made relative to
        base: u64,
    },

    /// a string in the stream is not valid UTF-8
    #[error("invalid string at offset {position:#X}")]
    InvalidString {
        /// Start of the offending string
        position: u64,
    },
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
