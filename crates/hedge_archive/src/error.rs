//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`hedge_bin::error::Error`]
    #[error(transparent)]
    #[diagnostic(transparent)]
    Bin(#[from] hedge_bin::error::Error),

    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file is not an archive of the selected format
    #[error("file is an invalid {format} archive: {reason}")]
    InvalidArchive {
        /// Name of the format that was expected
        format: &'static str,
        /// What did not match
        reason: String,
    },

    /// the requested operation is not supported for the format
    #[error("{operation} is not implemented for {format}")]
    NotImplemented {
        /// The operation that was requested
        operation: &'static str,
        /// The format or sub-format it was requested for
        format: String,
    },

    /// archive structures contradict each other
    #[error("archive is corrupt: {0}")]
    Integrity(String),

    /// the archive holds more than the format can describe
    #[error("too many {what}: {actual} exceeds the limit of {limit}")]
    CapacityExceeded {
        /// What overflowed
        what: &'static str,
        /// Largest value the format allows
        limit: usize,
        /// Value that was requested
        actual: usize,
    },

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

impl Error {
    pub(crate) fn invalid(format: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidArchive {
            format,
            reason: reason.into(),
        }
    }

    pub(crate) fn not_implemented(operation: &'static str, format: impl Into<String>) -> Self {
        Error::NotImplemented {
            operation,
            format: format.into(),
        }
    }

    /// Turn failures while reading a fixed header into [`Error::InvalidArchive`]
    ///
    /// A wrong magic or a file too short to hold the header means the file is not of this format at all.
    pub(crate) fn from_header(
        format: &'static str,
    ) -> impl FnOnce(hedge_bin::error::Error) -> Self {
        move |error| match error {
            hedge_bin::error::Error::BinRWError(e)
                if matches!(e.root_cause(), binrw::Error::BadMagic { .. }) =>
            {
                Error::invalid(format, "bad signature")
            }
            hedge_bin::error::Error::UnexpectedEndOfData { .. } => {
                Error::invalid(format, "file is too short for the header")
            }
            error => error.into(),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;

/// Convert a size or count into the `u32` field a format stores it in
pub(crate) fn fit_u32(what: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::CapacityExceeded {
        what,
        limit: u32::MAX as usize,
        actual: value,
    })
}
