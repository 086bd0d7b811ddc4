//! Big-endian output buffer mirroring [RBuffer](super::rbuffer::RBuffer).

use std::collections::HashMap;

use super::rbuffer::{
    K_BYTE_COUNT_MASK, K_CLASS_MASK, K_MAP_OFFSET, K_NEW_CLASS_TAG,
};

/// `kNotDeleted | kIsOnHeap`, the bits ROOT writes for ordinary objects
const TOBJECT_BITS: u32 = 0x0300_0000;

pub(crate) struct WBuffer {
    data: Vec<u8>,
    // length of the key header in front of the buffer
    displacement: usize,
    classes: HashMap<String, u32>,
}

impl WBuffer {
    /// Buffer for an object stored after a key header of the given length
    pub(crate) fn new(displacement: usize) -> Self {
        Self {
            data: Vec::new(),
            displacement,
            classes: HashMap::new(),
        }
    }

    pub(crate) fn pos(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes)
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.data.push(v)
    }

    pub(crate) fn write_i16(&mut self, v: i16) {
        self.write_bytes(&v.to_be_bytes())
    }

    pub(crate) fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_be_bytes())
    }

    pub(crate) fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_be_bytes())
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_be_bytes())
    }

    pub(crate) fn write_i64(&mut self, v: i64) {
        self.write_bytes(&v.to_be_bytes())
    }

    pub(crate) fn write_f32(&mut self, v: f32) {
        self.write_bytes(&v.to_be_bytes())
    }

    pub(crate) fn write_f64(&mut self, v: f64) {
        self.write_bytes(&v.to_be_bytes())
    }

    pub(crate) fn write_string(&mut self, s: &str) {
        let len = s.len();
        if len < 255 {
            self.write_u8(len as u8);
        } else {
            self.write_u8(255);
            self.write_u32(len as u32);
        }
        self.write_bytes(s.as_bytes())
    }

    pub(crate) fn write_cstring(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        self.write_u8(0)
    }

    fn patch_u32(&mut self, pos: usize, v: u32) {
        self.data[pos..pos + 4].copy_from_slice(&v.to_be_bytes())
    }

    /// Start a versioned record, returning the position of its byte count
    pub(crate) fn begin_versioned(&mut self, version: u16) -> usize {
        let start = self.pos();
        self.write_u32(0);
        self.write_u16(version);
        start
    }

    /// Fill in the byte count of a record started at `start`
    pub(crate) fn end_versioned(&mut self, start: usize) {
        let count = (self.pos() - start - 4) as u32;
        self.patch_u32(start, count | K_BYTE_COUNT_MASK)
    }

    pub(crate) fn write_tobject(&mut self) {
        self.write_u16(1);
        self.write_u32(0);
        self.write_u32(TOBJECT_BITS)
    }

    pub(crate) fn write_tnamed(&mut self, name: &str, title: &str) {
        let start = self.begin_versioned(1);
        self.write_tobject();
        self.write_string(name);
        self.write_string(title);
        self.end_versioned(start)
    }

    /// Start an object written through a pointer
    ///
    /// Writes the byte count placeholder and the class tag. Returns the
    /// position to pass to [end_object](Self::end_object) and the tag
    /// under which later references can point to this object.
    pub(crate) fn begin_object(&mut self, class: &str) -> (usize, u32) {
        let start = self.pos();
        self.write_u32(0);
        if let Some(&tag) = self.classes.get(class) {
            self.write_u32(tag | K_CLASS_MASK);
        } else {
            let tag = self.map_offset(self.pos());
            self.write_u32(K_NEW_CLASS_TAG);
            self.write_cstring(class);
            self.classes.insert(class.to_owned(), tag);
        }
        (start, self.map_offset(start))
    }

    pub(crate) fn end_object(&mut self, start: usize) {
        self.end_versioned(start)
    }

    fn map_offset(&self, pos: usize) -> u32 {
        (pos + self.displacement + K_MAP_OFFSET) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::super::rbuffer::RBuffer;
    use super::*;

    #[test]
    fn versioned_round_trip() {
        let mut w = WBuffer::new(0);
        let start = w.begin_versioned(7);
        w.write_tnamed("name", "title");
        w.write_f64(0.5);
        w.end_versioned(start);
        w.write_u8(42);
        let data = w.into_inner();

        let mut r = RBuffer::new(&data);
        let (version, end) = r.read_version().unwrap();
        assert_eq!(version, 7);
        let (name, title) = r.read_tnamed().unwrap();
        assert_eq!((name.as_str(), title.as_str()), ("name", "title"));
        assert_eq!(r.read_f64().unwrap(), 0.5);
        assert_eq!(Some(r.pos()), end);
        assert_eq!(r.read_u8().unwrap(), 42);
    }

    #[test]
    fn class_tags() {
        let mut w = WBuffer::new(10);
        let (first, _) = w.begin_object("TLeafD");
        w.end_object(first);
        let (second, tag) = w.begin_object("TLeafD");
        w.end_object(second);
        let data = w.into_inner();

        // new class tag right after the first byte count
        assert_eq!(&data[4..8], &K_NEW_CLASS_TAG.to_be_bytes());
        let class_ref = u32::from_be_bytes(data[second + 4..second + 8].try_into().unwrap());
        assert_eq!(class_ref, (4 + 10 + 2) as u32 | K_CLASS_MASK);
        assert_eq!(tag, (second + 10 + 2) as u32);
    }

    #[test]
    fn long_strings() {
        let long = "x".repeat(300);
        let mut w = WBuffer::new(0);
        w.write_string(&long);
        let data = w.into_inner();
        assert_eq!(data.len(), 1 + 4 + 300);
        assert_eq!(RBuffer::new(&data).read_string().unwrap(), long);
    }
}
