//! `TDirectory` records and their key lists.

use super::key::Key;
use super::rbuffer::RBuffer;
use super::Result;

/// Class names of keys pointing to sub-directories
pub(crate) const DIRECTORY_CLASSES: [&str; 2] = ["TDirectoryFile", "TDirectory"];

/// Seek information from a `TDirectory` streamer
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub(crate) struct DirectoryHeader {
    pub(crate) nbytes_keys: u32,
    pub(crate) nbytes_name: u32,
    pub(crate) seek_dir: u64,
    pub(crate) seek_parent: u64,
    pub(crate) seek_keys: u64,
}

impl DirectoryHeader {
    pub(crate) fn read(r: &mut RBuffer) -> Result<Self> {
        let version = r.read_u16()?;
        let _datime_c = r.read_u32()?;
        let _datime_m = r.read_u32()?;
        let nbytes_keys = r.read_u32()?;
        let nbytes_name = r.read_u32()?;
        let (seek_dir, seek_parent, seek_keys) = if version > 1000 {
            (r.read_u64()?, r.read_u64()?, r.read_u64()?)
        } else {
            (
                r.read_u32()? as u64,
                r.read_u32()? as u64,
                r.read_u32()? as u64,
            )
        };
        Ok(Self {
            nbytes_keys,
            nbytes_name,
            seek_dir,
            seek_parent,
            seek_keys,
        })
    }
}

/// An ordered list of keys
#[derive(Debug, Clone, Default)]
pub(crate) struct Directory {
    keys: Vec<Key>,
}

impl Directory {
    /// Read the key list stored at `seek_keys`
    ///
    /// The list is itself preceded by a key header, followed by the
    /// number of keys and the key headers.
    pub(crate) fn read_key_list(
        file_data: &[u8],
        seek_keys: u64,
        is_large: bool,
    ) -> Result<Self> {
        if seek_keys == 0 {
            return Ok(Self::default());
        }
        let mut r = RBuffer::new(file_data);
        r.set_pos(seek_keys as usize);
        let _list_key = Key::read(&mut r, is_large)?;
        let nkeys = r.read_i32()?.max(0) as usize;
        let keys: Result<Vec<_>> =
            (0..nkeys).map(|_| Key::read(&mut r, is_large)).collect();
        Ok(Directory { keys: keys? })
    }

    /// Read a sub-directory from the payload of its `TDirectoryFile` key
    pub(crate) fn read_from_payload(
        payload: &[u8],
        file_data: &[u8],
        is_large: bool,
    ) -> Result<Self> {
        let header = DirectoryHeader::read(&mut RBuffer::new(payload))?;
        Self::read_key_list(file_data, header.seek_keys, is_large)
    }

    pub(crate) fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Find a key by name, preferring the highest cycle
    pub(crate) fn find_key(&self, name: &str) -> Option<&Key> {
        self.keys
            .iter()
            .filter(|k| k.name == name)
            .max_by_key(|k| k.cycle)
    }

    /// Keys in storage order, keeping only the highest cycle of each name
    pub(crate) fn latest_keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|key| {
            self.keys
                .iter()
                .filter(|other| other.name == key.name)
                .all(|other| other.cycle <= key.cycle)
        })
    }
}

pub(crate) fn is_directory(class_name: &str) -> bool {
    DIRECTORY_CLASSES.contains(&class_name)
}
