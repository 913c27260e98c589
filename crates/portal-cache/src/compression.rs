//! Body codecs for the filesystem store.

use crate::types::CompressionType;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use portal_core::{Error, Result};
use std::io::{Read, Write};

/// zstd level used for bodies. Pages and stylesheets are small, so favour speed.
const ZSTD_LEVEL: i32 = 3;

fn codec_err(algorithm: CompressionType, op: &str, err: std::io::Error) -> Error {
    Error::CacheStorage(format!("{:?} {} failed: {}", algorithm, op, err))
}

/// Encode a response body for storage.
pub fn compress(data: &[u8], algorithm: CompressionType) -> Result<Vec<u8>> {
    match algorithm {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zstd => zstd::stream::encode_all(data, ZSTD_LEVEL)
            .map_err(|e| codec_err(algorithm, "compression", e)),
        CompressionType::Gzip => {
            let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::fast());
            encoder
                .write_all(data)
                .and_then(|_| encoder.finish())
                .map_err(|e| codec_err(algorithm, "compression", e))
        }
    }
}

/// Decode a stored body.
pub fn decompress(data: &[u8], algorithm: CompressionType) -> Result<Vec<u8>> {
    match algorithm {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Zstd => {
            zstd::stream::decode_all(data).map_err(|e| codec_err(algorithm, "decompression", e))
        }
        CompressionType::Gzip => {
            let mut out = Vec::new();
            GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| codec_err(algorithm, "decompression", e))?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &[u8] = b"<!doctype html><title>WaterBear Student Portal</title>";

    #[test]
    fn test_page_body_survives_every_codec() {
        for algorithm in [CompressionType::None, CompressionType::Zstd, CompressionType::Gzip] {
            let stored = compress(PAGE, algorithm).unwrap();
            assert_eq!(decompress(&stored, algorithm).unwrap(), PAGE, "{:?}", algorithm);
        }
    }

    #[test]
    fn test_empty_body() {
        let stored = compress(b"", CompressionType::Zstd).unwrap();
        assert!(decompress(&stored, CompressionType::Zstd).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_input_is_storage_error() {
        let err = decompress(b"definitely not zstd", CompressionType::Zstd).unwrap_err();
        assert!(matches!(err, Error::CacheStorage(_)));
        assert!(decompress(b"nor gzip", CompressionType::Gzip).is_err());
    }
}
