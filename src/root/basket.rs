//! `TBasket` records holding the values of a branch.

use super::compress::{compress, decompress, RootCompression};
use super::key::Key;
use super::rbuffer::RBuffer;
use super::tree::LeafType;
use super::ttree::BasketRecord;
use super::wbuffer::WBuffer;
use super::{Result, RootError};

const TBASKET_VERSION: i16 = 3;
/// Length of the `TBasket` fields following the key header
const TBASKET_HEADER_LEN: usize = 19;

/// A basket read from a file
#[derive(Debug, Clone, Default)]
pub(crate) struct Basket {
    /// Number of entries
    pub(crate) nev_buf: i32,
    /// Uncompressed payload
    pub(crate) payload: Vec<u8>,
}

impl Basket {
    /// Read the basket at `seek`
    pub(crate) fn read(file_data: &[u8], seek: u64, is_large: bool) -> Result<Self> {
        let pos = seek as usize;
        let mut r = RBuffer::new(file_data);
        r.set_pos(pos);
        let key = Key::read(&mut r, is_large)?;
        let _version = r.read_i16()?;
        let _buffer_size = r.read_i32()?;
        let _nev_buf_size = r.read_i32()?;
        let nev_buf = r.read_i32()?;
        let _last = r.read_i32()?;
        let _flag = r.read_u8()?;

        let start = pos + key.key_len as usize;
        let end = pos + key.n_bytes as usize;
        let stored = file_data.get(start..end).ok_or(RootError::BufferUnderflow {
            offset: start,
            need: end.saturating_sub(start),
            have: file_data.len().saturating_sub(start),
        })?;
        let payload = if stored.len() == key.obj_len as usize {
            stored.to_vec()
        } else {
            decompress(stored, key.obj_len as usize)?
        };
        Ok(Self { nev_buf, payload })
    }

    /// Decode `n_entries` scalar values and append them to `out`
    pub(crate) fn decode_into(
        &self,
        leaf_type: LeafType,
        n_entries: usize,
        out: &mut Vec<f64>,
    ) -> Result<()> {
        let size = leaf_type.byte_size();
        let need = n_entries * size;
        let data = self.payload.get(..need).ok_or(RootError::BufferUnderflow {
            offset: 0,
            need,
            have: self.payload.len(),
        })?;
        out.extend(data.chunks_exact(size).map(|b| leaf_type.decode_f64(b)));
        Ok(())
    }
}

/// Serialise a basket of `f64` values to be stored at `seek`
pub(crate) fn write_basket(
    branch: &str,
    tree: &str,
    values: &[f64],
    first_entry: u64,
    seek: u64,
    seek_pdir: u64,
    compression: RootCompression,
) -> Result<(Vec<u8>, BasketRecord)> {
    let raw: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
    let stored = compress(&raw, compression)?;

    let mut key = Key::new("TBasket", branch, tree);
    key.key_len += TBASKET_HEADER_LEN as u16;
    key.obj_len = raw.len() as u32;
    key.n_bytes = (key.key_len as usize + stored.len()) as u32;
    key.seek_key = seek;
    key.seek_pdir = seek_pdir;

    let last = key.key_len as i32 + raw.len() as i32;
    let mut w = WBuffer::new(0);
    key.write(&mut w)?;
    w.write_i16(TBASKET_VERSION);
    w.write_i32(last); // fBufferSize
    w.write_i32(LeafType::F64.byte_size() as i32); // fNevBufSize
    w.write_i32(values.len() as i32);
    w.write_i32(last);
    w.write_u8(0);
    debug_assert_eq!(w.pos(), key.key_len as usize);
    w.write_bytes(&stored);

    let record = BasketRecord {
        n_bytes: key.n_bytes,
        tot_bytes: last as u64,
        first_entry,
        seek,
    };
    Ok((w.into_inner(), record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let values: Vec<f64> = (0..1000).map(|i| (i % 10) as f64 * 0.5).collect();
        for compression in [
            RootCompression::None,
            RootCompression::Zlib(6),
            RootCompression::Zstd(3),
        ] {
            let seek = 16;
            let (record, info) =
                write_basket("x", "t", &values, 0, seek, 100, compression).unwrap();
            let mut file = vec![0; seek as usize];
            file.extend_from_slice(&record);
            assert_eq!(info.n_bytes as usize, record.len());

            let basket = Basket::read(&file, seek, false).unwrap();
            assert_eq!(basket.nev_buf, 1000);
            let mut out = Vec::new();
            basket.decode_into(LeafType::F64, values.len(), &mut out).unwrap();
            assert_eq!(out, values);
        }
    }

    #[test]
    fn short_basket() {
        let basket = Basket {
            nev_buf: 2,
            payload: 1f64.to_be_bytes().to_vec(),
        };
        let mut out = Vec::new();
        assert!(basket.decode_into(LeafType::F64, 2, &mut out).is_err());
        basket.decode_into(LeafType::F32, 2, &mut out).unwrap();
        assert_eq!(out.len(), 2);
    }
}
