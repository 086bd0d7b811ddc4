//! Cursor over ROOT's big-endian serialization format.

use super::{Result, RootError};

/// Byte count flag on the leading `u32` of a streamed object
pub(crate) const K_BYTE_COUNT_MASK: u32 = 0x4000_0000;
/// Introduces a class name that has not been seen in the buffer yet
pub(crate) const K_NEW_CLASS_TAG: u32 = 0xFFFF_FFFF;
/// Marks a reference to a class name stored earlier in the buffer
pub(crate) const K_CLASS_MASK: u32 = 0x8000_0000;
/// Offset added to buffer positions in the object and class maps
pub(crate) const K_MAP_OFFSET: usize = 2;
/// `TObject` bit signalling a trailing process id
const K_IS_REFERENCED: u32 = 1 << 4;

pub(crate) struct RBuffer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RBuffer<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub(crate) fn read_i16(&mut self) -> Result<i16> {
        self.read_array().map(i16::from_be_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        self.read_array().map(i32::from_be_bytes)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_be_bytes)
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64> {
        self.read_array().map(i64::from_be_bytes)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64> {
        self.read_array().map(f64::from_be_bytes)
    }

    /// Read a `TString`: one length byte, or 255 followed by a `u32`
    /// length, then the bytes
    pub(crate) fn read_string(&mut self) -> Result<String> {
        let first = self.read_u8()?;
        let len = if first == 255 {
            self.read_u32()? as usize
        } else {
            first as usize
        };
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a null-terminated string, as used for class names
    pub(crate) fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(RootError::Deserialization(format!(
                "unterminated class name at offset {}",
                self.pos
            )));
        };
        let name = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(name)
    }

    /// Read a streamer version header
    ///
    /// Returns the version and, if the object carries a byte count, the
    /// absolute position where the object ends.
    pub(crate) fn read_version(&mut self) -> Result<(u16, Option<usize>)> {
        let start = self.pos;
        let raw = self.read_u32()?;
        if raw & K_BYTE_COUNT_MASK != 0 {
            let byte_count = (raw & !K_BYTE_COUNT_MASK) as usize;
            let version = self.read_u16()?;
            Ok((version, Some(start + 4 + byte_count)))
        } else {
            // no byte count, the first two bytes are the version
            self.pos = start + 2;
            Ok(((raw >> 16) as u16, None))
        }
    }

    /// Skip a versioned object with a byte count
    pub(crate) fn skip_versioned(&mut self) -> Result<()> {
        let (version, end) = self.read_version()?;
        match end {
            Some(end) => {
                self.set_pos(end);
                Ok(())
            }
            None => Err(RootError::Deserialization(format!(
                "cannot skip object (version {version}) without byte count"
            ))),
        }
    }

    /// Read a `TObject` header, returning `fUniqueID` and `fBits`
    pub(crate) fn read_tobject(&mut self) -> Result<(u32, u32)> {
        let _version = self.read_u16()?;
        let unique_id = self.read_u32()?;
        let bits = self.read_u32()?;
        if bits & K_IS_REFERENCED != 0 {
            self.skip(2)?;
        }
        Ok((unique_id, bits))
    }

    /// Read a `TNamed`, returning name and title
    pub(crate) fn read_tnamed(&mut self) -> Result<(String, String)> {
        let (_version, end) = self.read_version()?;
        self.read_tobject()?;
        let name = self.read_string()?;
        let title = self.read_string()?;
        if let Some(end) = end {
            self.set_pos(end);
        }
        Ok((name, title))
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.pos + n > self.data.len() {
            return Err(RootError::BufferUnderflow {
                offset: self.pos,
                need: n,
                have: self.data.len().saturating_sub(self.pos),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives() {
        let data = [
            0x01, 0x02, 0x03, 0x04, 0x40, 0x09, 0x21, 0xfb, 0x54, 0x44, 0x2d,
            0x18,
        ];
        let mut r = RBuffer::new(&data);
        assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(r.read_f64().unwrap(), std::f64::consts::PI);
        assert!(r.read_u8().is_err());
    }

    #[test]
    fn strings() {
        let data = [3, b'a', b'b', b'c', b'T', b'T', 0, 0];
        let mut r = RBuffer::new(&data);
        assert_eq!(r.read_string().unwrap(), "abc");
        assert_eq!(r.read_cstring().unwrap(), "TT");
        assert_eq!(r.read_string().unwrap(), "");
    }

    #[test]
    fn version_with_byte_count() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x4000_0010u32.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        data.extend_from_slice(&[0u8; 20]);
        let mut r = RBuffer::new(&data);
        assert_eq!(r.read_version().unwrap(), (3, Some(20)));
    }

    #[test]
    fn version_without_byte_count() {
        let data = [0x00, 0x05, 0x00, 0x00];
        let mut r = RBuffer::new(&data);
        assert_eq!(r.read_version().unwrap(), (5, None));
        assert_eq!(r.pos(), 2);
    }
}
