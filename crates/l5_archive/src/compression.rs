//! Block compression and decompression handling.

use std::io::{Read, Write};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use tracing::instrument;

use crate::error::{Error, Result};

/// A codec applied to a whole table block of an archive
///
/// Tables are lifted out of the archive as raw byte ranges, passed through [`BlockCompressor::decompress`]
/// and only then interpreted. Encoding runs the serialized table through [`BlockCompressor::compress`].
pub trait BlockCompressor {
    /// Compress a serialized block
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a block read from an archive
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Identifies the storage format used to compress the tables of an archive
///
/// When saving archives, you may choose the method to use via [`crate::archive::ArchiveOptions`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None,

    /// Compress the data using Zlib
    Zlib,
}

impl BlockCompressor for CompressionMethod {
    #[instrument(skip(data), fields(size = data.len()), err)]
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionMethod::None => Ok(data.to_vec()),
            CompressionMethod::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            }
        }
    }

    #[instrument(skip(data), fields(size = data.len()), err)]
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionMethod::None => Ok(data.to_vec()),
            CompressionMethod::Zlib => {
                let mut decoded = Vec::new();
                ZlibDecoder::new(data)
                    .read_to_end(&mut decoded)
                    .map_err(|e| Error::CorruptTable(format!("zlib block: {e}")))?;
                Ok(decoded)
            }
        }
    }
}
