//! Per-entry compression handling.

use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

use crate::error::Result;

/// Identifies how a single entry is stored inside an archive
///
/// When writing U8 archives the method is picked via [`crate::u8::U8WriteOptions`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None,

    /// Compress the data using Zlib
    Zlib,
}

/// Store `data` with the given method, returning the bytes as they go into the archive
pub(crate) fn compress(data: &[u8], compression: CompressionMethod) -> Result<Vec<u8>> {
    match compression {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
    }
}

/// Recover the data of an entry from the bytes stored in the archive
pub(crate) fn decompress(stored: &[u8], compression: CompressionMethod) -> Result<Vec<u8>> {
    match compression {
        CompressionMethod::None => Ok(stored.to_vec()),
        CompressionMethod::Zlib => {
            let mut data = Vec::new();
            ZlibDecoder::new(stored).read_to_end(&mut data)?;
            Ok(data)
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::compression::{compress, decompress, CompressionMethod};
    use crate::error::{Error, Result};

    #[test]
    fn zlib_block_inflates() -> Result<()> {
        let text = b"ring ring ring ring ring ring ring ring".repeat(4);
        let stored = compress(&text, CompressionMethod::Zlib)?;
        assert!(stored.len() < text.len());
        assert_eq!(&stored[..1], &[0x78]);

        assert_eq!(decompress(&stored, CompressionMethod::Zlib)?, text);
        Ok(())
    }

    #[test]
    fn no_compression_passes_through() -> Result<()> {
        assert_eq!(compress(b"raw", CompressionMethod::None)?, b"raw");
        assert_eq!(decompress(b"raw", CompressionMethod::None)?, b"raw");
        Ok(())
    }

    #[test]
    fn corrupt_zlib_stream_fails() {
        assert!(matches!(
            decompress(&[0x78, 0x9C, 0xFF, 0xFF], CompressionMethod::Zlib),
            Err(Error::IOError(_))
        ));
    }
}
