use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace};

use super::basket::write_basket;
use super::compress::{compress, RootCompression};
use super::key::{datime_now, small_seek, string_len, Key};
use super::ttree::{write_ttree, BranchRecord, BASKET_SIZE};
use super::wbuffer::WBuffer;
use super::{Result, RootError, ROOT_MAGIC_BYTES};

/// Version written into the file header (ROOT 6.30/06)
const ROOT_VERSION: i32 = 63006;
/// Start of the top directory record
const BEGIN: u64 = 100;
const TDIRECTORY_VERSION: u16 = 5;
const TLIST_VERSION: u16 = 5;
const TFREE_VERSION: i16 = 1;
/// End of the free segment, far beyond any small file
const FREE_SEGMENT_END: u32 = 2_000_000_000;
const UUID_VERSION: u16 = 1;
/// `fUnits`, the size of seek pointers in bytes
const SMALL_FILE_UNITS: u8 = 4;
const VALUES_PER_BASKET: usize = BASKET_SIZE as usize / 8;

/// Writer for ROOT files containing flat trees of `f64` branches
///
/// The file is only valid after [close](Self::close) has been called.
pub struct RootWriter {
    out: BufWriter<File>,
    name: String,
    pos: u64,
    compression: RootCompression,
    datime: u32,
    keys: Vec<Key>,
}

impl RootWriter {
    /// Create a new ROOT file at `path`, replacing any existing file
    pub fn create(
        path: impl AsRef<Path>,
        compression: RootCompression,
    ) -> Result<Self> {
        let path = path.as_ref();
        debug!("Creating ROOT file {path:?} with compression {compression:?}");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let out = BufWriter::new(File::create(path)?);
        let mut writer = Self {
            out,
            name,
            pos: 0,
            compression,
            datime: datime_now(),
            keys: Vec::new(),
        };
        // placeholders, rewritten on close
        let header = writer.file_header(&Trailer::default());
        writer.write_all(&header)?;
        let record = writer.directory_record(&Trailer::default())?;
        writer.write_all(&record)?;
        Ok(writer)
    }

    /// Write a tree with one `f64` branch per column
    ///
    /// All columns must have the same length. Writing a tree with the
    /// name of an existing one adds a new cycle.
    pub fn write_tree(&mut self, name: &str, columns: &[(&str, &[f64])]) -> Result<()> {
        let entries = columns.first().map(|(_, c)| c.len()).unwrap_or_default();
        if let Some((col, values)) = columns.iter().find(|(_, c)| c.len() != entries) {
            return Err(RootError::ColumnLength {
                name: col.to_string(),
                len: values.len(),
                expected: entries,
            });
        }
        debug!(
            "Writing tree {name} with {} branches and {entries} entries",
            columns.len()
        );

        let mut branches = Vec::with_capacity(columns.len());
        for (branch, values) in columns {
            let mut record = BranchRecord {
                name: branch.to_string(),
                entries: entries as u64,
                ..Default::default()
            };
            if !values.is_empty() {
                record.minimum = values.iter().copied().fold(f64::INFINITY, f64::min);
                record.maximum = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            }
            for (n, chunk) in values.chunks(VALUES_PER_BASKET).enumerate() {
                let (bytes, basket) = write_basket(
                    branch,
                    name,
                    chunk,
                    (n * VALUES_PER_BASKET) as u64,
                    self.pos,
                    BEGIN,
                    self.compression,
                )?;
                self.write_all(&bytes)?;
                record.baskets.push(basket);
            }
            trace!("Wrote {} baskets for branch {branch}", record.baskets.len());
            branches.push(record);
        }

        let mut key = Key::new("TTree", name, name);
        key.cycle = self
            .keys
            .iter()
            .filter(|k| k.name == name)
            .map(|k| k.cycle + 1)
            .max()
            .unwrap_or(1);
        let mut payload = WBuffer::new(key.key_len as usize);
        write_ttree(
            &mut payload,
            name,
            entries as u64,
            &branches,
            self.compression.setting(),
        );
        let key = self.write_object(key, &payload.into_inner(), true)?;
        self.keys.push(key);
        Ok(())
    }

    /// Write the directory and file headers and flush the file
    pub fn close(mut self) -> Result<()> {
        let mut list = WBuffer::new(0);
        let start = list.begin_versioned(TLIST_VERSION);
        list.write_tobject();
        list.write_string("");
        list.write_i32(0);
        list.end_versioned(start);
        let info = Key::new("TList", "StreamerInfo", "Doubly linked list");
        let info = self.write_object(info, &list.into_inner(), true)?;

        let mut keys_list = WBuffer::new(0);
        keys_list.write_i32(self.keys.len() as i32);
        for key in &self.keys {
            key.write(&mut keys_list)?;
        }
        let keys_key = Key::new("TFile", &self.name, "");
        let keys_key = self.write_object(keys_key, &keys_list.into_inner(), false)?;

        let free_key = Key::new("TFile", &self.name, "");
        let free_len = 2 + 4 + 4;
        let end = self.pos + free_key.key_len as u64 + free_len;
        let mut free = WBuffer::new(0);
        free.write_i16(TFREE_VERSION);
        free.write_u32(small_seek(end)?);
        free.write_u32(FREE_SEGMENT_END);
        let free_key = self.write_object(free_key, &free.into_inner(), false)?;

        let trailer = Trailer {
            end: self.pos,
            seek_free: free_key.seek_key,
            nbytes_free: free_key.n_bytes,
            seek_info: info.seek_key,
            nbytes_info: info.n_bytes,
            seek_keys: keys_key.seek_key,
            nbytes_keys: keys_key.n_bytes,
        };
        let header = self.file_header(&trailer);
        let record = self.directory_record(&trailer)?;
        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(&header)?;
        self.out.seek(SeekFrom::Start(BEGIN))?;
        self.out.write_all(&record)?;
        self.out.flush()?;
        debug!("Closed ROOT file {} with {} bytes", self.name, trailer.end);
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        small_seek(self.pos + bytes.len() as u64)?;
        self.out.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    fn write_object(&mut self, mut key: Key, payload: &[u8], compressed: bool) -> Result<Key> {
        let stored = if compressed {
            compress(payload, self.compression)?
        } else {
            payload.to_vec()
        };
        key.obj_len = payload.len() as u32;
        key.n_bytes = (key.key_len as usize + stored.len()) as u32;
        key.seek_key = self.pos;
        key.seek_pdir = BEGIN;
        let mut w = WBuffer::new(0);
        key.write(&mut w)?;
        w.write_bytes(&stored);
        self.write_all(&w.into_inner())?;
        Ok(key)
    }

    fn name_len(&self, key: &Key) -> usize {
        key.key_len as usize + string_len(&self.name) + string_len("")
    }

    fn file_header(&self, trailer: &Trailer) -> Vec<u8> {
        let key = Key::new("TFile", &self.name, "");
        let mut w = WBuffer::new(0);
        w.write_bytes(&ROOT_MAGIC_BYTES);
        w.write_i32(ROOT_VERSION);
        w.write_i32(BEGIN as i32);
        w.write_u32(trailer.end as u32);
        w.write_u32(trailer.seek_free as u32);
        w.write_u32(trailer.nbytes_free);
        w.write_i32(1); // nfree
        w.write_u32(self.name_len(&key) as u32);
        w.write_u8(SMALL_FILE_UNITS);
        w.write_i32(self.compression.setting());
        w.write_u32(trailer.seek_info as u32);
        w.write_u32(trailer.nbytes_info);
        w.write_u16(UUID_VERSION);
        w.write_bytes(&[0; 16]);
        let mut header = w.into_inner();
        header.resize(BEGIN as usize, 0);
        header
    }

    /// The `TFile` key with the top directory
    fn directory_record(&self, trailer: &Trailer) -> Result<Vec<u8>> {
        let mut key = Key::new("TFile", &self.name, "");
        key.datime = self.datime;
        let nbytes_name = self.name_len(&key);

        let mut payload = WBuffer::new(0);
        payload.write_string(&self.name);
        payload.write_string("");
        payload.write_u16(TDIRECTORY_VERSION);
        payload.write_u32(self.datime);
        payload.write_u32(datime_now());
        payload.write_u32(trailer.nbytes_keys);
        payload.write_u32(nbytes_name as u32);
        payload.write_u32(BEGIN as u32); // fSeekDir
        payload.write_u32(0); // fSeekParent
        payload.write_u32(small_seek(trailer.seek_keys)?);
        payload.write_u16(UUID_VERSION);
        payload.write_bytes(&[0; 16]);
        // room for 64 bit seek pointers
        payload.write_bytes(&[0; 12]);
        let payload = payload.into_inner();

        key.obj_len = payload.len() as u32;
        key.n_bytes = (key.key_len as usize + payload.len()) as u32;
        key.seek_key = BEGIN;
        let mut w = WBuffer::new(0);
        key.write(&mut w)?;
        w.write_bytes(&payload);
        Ok(w.into_inner())
    }
}

/// Positions of the records written on close
#[derive(Debug, Copy, Clone, Default)]
struct Trailer {
    end: u64,
    seek_free: u64,
    nbytes_free: u32,
    seek_info: u64,
    nbytes_info: u32,
    seek_keys: u64,
    nbytes_keys: u32,
}

#[cfg(test)]
mod tests {
    use super::super::{LeafType, RootFile};
    use super::*;
    use crate::reader::{load, LoadOptions};

    fn columns(n: usize) -> (Vec<f64>, Vec<f64>) {
        let x = (0..n).map(|i| i as f64 * 0.25).collect();
        let y = (0..n).map(|i| -(i as f64)).collect();
        (x, y)
    }

    #[test]
    fn round_trip() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        // more than one basket per branch
        let (x, y) = columns(2 * VALUES_PER_BASKET + 17);
        for compression in [
            RootCompression::None,
            RootCompression::Zlib(1),
            RootCompression::Zstd(5),
        ] {
            let path = dir.path().join("out.root");
            let mut writer = RootWriter::create(&path, compression).unwrap();
            writer
                .write_tree("data_tree", &[("x", x.as_slice()), ("y", y.as_slice())])
                .unwrap();
            writer.close().unwrap();

            let file = RootFile::open(&path).unwrap();
            assert_eq!(file.compression_setting(), compression.setting());
            assert_eq!(file.tree_paths().unwrap(), ["data_tree"]);
            let tree = file.get_tree("data_tree").unwrap();
            assert_eq!(tree.entries, x.len() as u64);
            assert_eq!(tree.branch_names(), ["x", "y"]);
            let branch = tree.find_branch("x").unwrap();
            assert_eq!(branch.leaf_type(), Some(LeafType::F64));
            assert_eq!(branch.n_baskets(), 3);
            assert_eq!(file.branch_data(&tree, "x").unwrap(), x);
            assert_eq!(file.branch_data(&tree, "y").unwrap(), y);
            assert!(matches!(
                file.branch_data(&tree, "z"),
                Err(RootError::BranchNotFound(_))
            ));
        }
    }

    #[test]
    fn several_trees() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.root");
        let (x, y) = columns(10);
        let mut writer = RootWriter::create(&path, RootCompression::default()).unwrap();
        writer.write_tree("a", &[("x", x.as_slice())]).unwrap();
        writer.write_tree("b", &[("y", y.as_slice())]).unwrap();
        writer.write_tree("a", &[("y", y.as_slice())]).unwrap();
        writer.close().unwrap();

        let file = RootFile::open(&path).unwrap();
        let keys = file.list_keys().unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(file.tree_paths().unwrap(), ["b", "a"]);
        let a = file.get_tree("a").unwrap();
        assert_eq!(a.branch_names(), ["y"]);
        assert_eq!(file.branch_data(&a, "y").unwrap(), y);
    }

    #[test]
    fn empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.root");
        let mut writer = RootWriter::create(&path, RootCompression::None).unwrap();
        writer.write_tree("t", &[("x", &[] as &[f64])]).unwrap();
        writer.close().unwrap();

        let file = RootFile::open(&path).unwrap();
        let tree = file.get_tree("t").unwrap();
        assert_eq!(tree.entries, 0);
        assert!(file.branch_data(&tree, "x").unwrap().is_empty());
    }

    #[test]
    fn ragged_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.root");
        let mut writer = RootWriter::create(&path, RootCompression::None).unwrap();
        let res = writer.write_tree("t", &[("x", &[1f64, 2.][..]), ("y", &[1f64][..])]);
        assert!(matches!(res, Err(RootError::ColumnLength { len: 1, .. })));
    }

    #[test]
    fn subdirectory_and_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested.root");
        let mut writer = RootWriter::create(&path, RootCompression::None).unwrap();

        // move the tree into a sub-directory `d`
        writer.write_tree("inner", &[("x", &[1f64, 2.][..])]).unwrap();
        let inner = writer.keys.pop().unwrap();
        let mut list = WBuffer::new(0);
        list.write_i32(1);
        inner.write(&mut list).unwrap();
        let list_key = Key::new("TDirectoryFile", "d", "");
        let list_key = writer.write_object(list_key, &list.into_inner(), false).unwrap();

        let mut record = WBuffer::new(0);
        record.write_u16(TDIRECTORY_VERSION);
        record.write_u32(0);
        record.write_u32(0);
        record.write_u32(list_key.n_bytes);
        record.write_u32(0);
        record.write_u32(0);
        record.write_u32(BEGIN as u32);
        record.write_u32(list_key.seek_key as u32);
        record.write_u16(UUID_VERSION);
        record.write_bytes(&[0; 16]);
        let sub = Key::new("TDirectoryFile", "d", "d");
        let sub = writer.write_object(sub, &record.into_inner(), false).unwrap();
        writer.keys.push(sub);

        // not a tree, never read
        let hist = Key::new("TH1F", "h", "histogram");
        let hist = writer.write_object(hist, &[0; 8], false).unwrap();
        writer.keys.push(hist);

        writer.write_tree("top", &[("x", &[3f64][..])]).unwrap();
        writer.close().unwrap();

        let file = RootFile::open(&path).unwrap();
        assert_eq!(file.list_keys().unwrap().len(), 3);
        assert_eq!(file.tree_paths().unwrap(), ["d/inner", "top"]);
        let tree = file.get_tree("d/inner").unwrap();
        assert_eq!(file.branch_data(&tree, "x").unwrap(), [1., 2.]);
        assert!(matches!(file.get_tree("h"), Err(RootError::TreeNotFound(_))));
        assert!(matches!(file.get_tree("d/h"), Err(RootError::KeyNotFound(_))));

        let grid = load(&path, &LoadOptions::default()).unwrap();
        assert_eq!(grid.labels(), ["x"]);
        assert_eq!(grid.rows(), [vec![1., 2., 3.]]);
    }
}
