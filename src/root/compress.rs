//! ROOT compression blocks.
//!
//! Compressed objects are split into blocks of at most 16MB, each
//! with a nine byte header: a two character algorithm tag, a method
//! byte, and the compressed and uncompressed sizes as three byte
//! little-endian integers.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::{Result, RootError};

const HEADER_LEN: usize = 9;
const MAX_BLOCK_LEN: usize = 0xFF_FFFF;
// ROOT's lz4 blocks start with an xxhash64 checksum
const LZ4_CHECKSUM_LEN: usize = 8;

/// Compression of objects written to a ROOT file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RootCompression {
    /// Store objects uncompressed
    None,
    /// zlib with compression level as associated value
    Zlib(u8),
    /// zstd with compression level as associated value
    Zstd(u8),
}

impl Default for RootCompression {
    fn default() -> Self {
        RootCompression::Zstd(5)
    }
}

impl RootCompression {
    /// The `fCompress` setting ROOT stores in files and branches
    ///
    /// This is `100 * algorithm + level`.
    pub fn setting(self) -> i32 {
        match self {
            RootCompression::None => 0,
            RootCompression::Zlib(lvl) => 100 + i32::from(lvl.min(9)),
            RootCompression::Zstd(lvl) => 500 + i32::from(lvl.min(99)),
        }
    }

    fn is_none(self) -> bool {
        matches!(
            self,
            RootCompression::None
                | RootCompression::Zlib(0)
                | RootCompression::Zstd(0)
        )
    }
}

/// Compress an object
///
/// Returns the input unchanged if compression is disabled or does not
/// reduce the size. Readers tell the two cases apart by comparing
/// the stored and uncompressed lengths.
pub(crate) fn compress(data: &[u8], compression: RootCompression) -> Result<Vec<u8>> {
    if compression.is_none() || data.is_empty() {
        return Ok(data.to_vec());
    }
    let mut out = Vec::with_capacity(data.len());
    for block in data.chunks(MAX_BLOCK_LEN) {
        let (tag, method, compressed) = match compression {
            RootCompression::Zlib(lvl) => {
                let mut encoder = ZlibEncoder::new(
                    Vec::new(),
                    flate2::Compression::new(lvl.min(9).into()),
                );
                encoder.write_all(block)?;
                (b"ZL", 8, encoder.finish()?)
            }
            RootCompression::Zstd(lvl) => {
                let compressed = zstd::bulk::compress(block, lvl.into())
                    .map_err(|err| RootError::Compression(format!("zstd: {err}")))?;
                (b"ZS", 1, compressed)
            }
            RootCompression::None => return Ok(data.to_vec()),
        };
        if compressed.len() > MAX_BLOCK_LEN {
            return Ok(data.to_vec());
        }
        out.extend_from_slice(tag);
        out.push(method);
        out.extend_from_slice(&le24(compressed.len()));
        out.extend_from_slice(&le24(block.len()));
        out.extend_from_slice(&compressed);
    }
    if out.len() >= data.len() {
        Ok(data.to_vec())
    } else {
        Ok(out)
    }
}

/// Decompress an object into `expected_len` bytes
pub(crate) fn decompress(src: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut offset = 0;
    while out.len() < expected_len {
        let header = src.get(offset..offset + HEADER_LEN).ok_or_else(|| {
            RootError::Decompression(format!(
                "missing block header at offset {offset}"
            ))
        })?;
        let tag = &header[..2];
        let compressed_len = read_le24(&header[3..6]);
        let len = read_le24(&header[6..9]);
        offset += HEADER_LEN;
        let block = src.get(offset..offset + compressed_len).ok_or_else(|| {
            RootError::Decompression(format!(
                "block claims {compressed_len} bytes, but only {} are left",
                src.len() - offset
            ))
        })?;
        let decompressed = match tag {
            b"ZL" => decompress_zlib(block, len)?,
            b"ZS" => zstd::bulk::decompress(block, len)
                .map_err(|err| RootError::Decompression(format!("zstd: {err}")))?,
            b"L4" => decompress_lz4(block, len)?,
            _ => {
                return Err(RootError::Decompression(format!(
                    "unsupported algorithm `{}`",
                    String::from_utf8_lossy(tag)
                )))
            }
        };
        if decompressed.len() != len {
            return Err(RootError::Decompression(format!(
                "expected {len} bytes from block, got {}",
                decompressed.len()
            )));
        }
        out.extend_from_slice(&decompressed);
        offset += compressed_len;
    }
    if out.len() != expected_len {
        return Err(RootError::Decompression(format!(
            "expected {expected_len} bytes in total, got {}",
            out.len()
        )));
    }
    Ok(out)
}

fn decompress_zlib(block: &[u8], len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(len);
    ZlibDecoder::new(block)
        .read_to_end(&mut out)
        .map_err(|err| RootError::Decompression(format!("zlib: {err}")))?;
    Ok(out)
}

fn decompress_lz4(block: &[u8], len: usize) -> Result<Vec<u8>> {
    let payload = block.get(LZ4_CHECKSUM_LEN..).ok_or_else(|| {
        RootError::Decompression("lz4 block shorter than its checksum".into())
    })?;
    lz4::block::decompress(payload, Some(len as i32))
        .map_err(|err| RootError::Decompression(format!("lz4: {err}")))
}

fn read_le24(b: &[u8]) -> usize {
    b[0] as usize | (b[1] as usize) << 8 | (b[2] as usize) << 16
}

fn le24(n: usize) -> [u8; 3] {
    [n as u8, (n >> 8) as u8, (n >> 16) as u8]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        (0..10_000u32).flat_map(|i| (i % 17).to_be_bytes()).collect()
    }

    #[test]
    fn zlib() {
        let data = sample();
        let compressed = compress(&data, RootCompression::Zlib(4)).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(&compressed[..2], b"ZL");
        assert_eq!(decompress(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn zstd() {
        let data = sample();
        let compressed = compress(&data, RootCompression::Zstd(5)).unwrap();
        assert_eq!(&compressed[..2], b"ZS");
        assert_eq!(decompress(&compressed, data.len()).unwrap(), data);
    }

    #[test]
    fn lz4() {
        let data = sample();
        let block = lz4::block::compress(&data, None, false).unwrap();
        let mut src = b"L4\x01".to_vec();
        src.extend_from_slice(&le24(block.len() + LZ4_CHECKSUM_LEN));
        src.extend_from_slice(&le24(data.len()));
        src.extend_from_slice(&[0; LZ4_CHECKSUM_LEN]);
        src.extend_from_slice(&block);
        assert_eq!(decompress(&src, data.len()).unwrap(), data);
    }

    #[test]
    fn incompressible() {
        let data = [1, 2, 3];
        assert_eq!(compress(&data, RootCompression::Zlib(9)).unwrap(), data);
        assert_eq!(compress(&sample(), RootCompression::None).unwrap(), sample());
    }

    #[test]
    fn setting() {
        assert_eq!(RootCompression::Zlib(1).setting(), 101);
        assert_eq!(RootCompression::Zstd(5).setting(), 505);
        assert_eq!(RootCompression::None.setting(), 0);
    }

    #[test]
    fn unknown_algorithm() {
        let src = b"XZ\x00\x01\x00\x00\x01\x00\x00\x00";
        assert!(matches!(
            decompress(src, 1),
            Err(RootError::Decompression(_))
        ));
    }
}
