use std::path::Path;

use log::{debug, trace};

use super::basket::Basket;
use super::compress::decompress;
use super::directory::{is_directory, Directory, DirectoryHeader};
use super::key::{Key, KeyInfo};
use super::rbuffer::RBuffer;
use super::tree::Tree;
use super::ttree::read_ttree;
use super::{Result, RootError, ROOT_MAGIC_BYTES};

/// File versions from this one on use 64 bit seek pointers
const LARGE_FILE_VERSION: u32 = 1_000_000;
const TREE_CLASS: &str = "TTree";

#[derive(Debug, Copy, Clone, Default)]
struct FileHeader {
    is_large: bool,
    compress: i32,
    seek_keys: u64,
}

/// A ROOT file loaded into memory
#[derive(Debug, Clone)]
pub struct RootFile {
    data: Vec<u8>,
    header: FileHeader,
}

impl RootFile {
    /// Read and parse the file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Reading ROOT file {path:?}");
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Parse a ROOT file held in memory
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if !data.starts_with(&ROOT_MAGIC_BYTES) {
            return Err(RootError::BadMagic);
        }
        let header = parse_header(&data)?;
        trace!("ROOT file header: {header:?}");
        Ok(Self { data, header })
    }

    /// The file's default compression setting
    pub fn compression_setting(&self) -> i32 {
        self.header.compress
    }

    /// Keys in the top-level directory
    pub fn list_keys(&self) -> Result<Vec<KeyInfo>> {
        let dir = self.top_directory()?;
        Ok(dir.keys().iter().map(KeyInfo::from).collect())
    }

    /// Paths of all trees, including those in sub-directories
    ///
    /// Paths of nested trees are joined with `/`. Only the highest
    /// cycle of each key is considered.
    pub fn tree_paths(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        self.collect_tree_paths(&self.top_directory()?, "", &mut paths)?;
        Ok(paths)
    }

    fn collect_tree_paths(
        &self,
        dir: &Directory,
        prefix: &str,
        paths: &mut Vec<String>,
    ) -> Result<()> {
        for key in dir.latest_keys() {
            let path = format!("{prefix}{}", key.name);
            if key.class_name == TREE_CLASS {
                paths.push(path);
            } else if is_directory(&key.class_name) {
                let sub = self.read_subdirectory(key)?;
                self.collect_tree_paths(&sub, &format!("{path}/"), paths)?;
            }
        }
        Ok(())
    }

    /// Read the tree at `path`
    pub fn get_tree(&self, path: &str) -> Result<Tree> {
        let key = self.resolve(path)?;
        if key.class_name != TREE_CLASS {
            return Err(RootError::TreeNotFound(format!(
                "{path} (is a {})",
                key.class_name
            )));
        }
        let payload = self.read_key_payload(&key)?;
        read_ttree(&payload, key.key_len as usize)
    }

    /// Read all entries of a scalar numeric branch as `f64`
    pub fn branch_data(&self, tree: &Tree, branch: &str) -> Result<Vec<f64>> {
        let info = tree
            .find_branch(branch)
            .ok_or_else(|| RootError::BranchNotFound(branch.to_owned()))?;
        let leaf_type = info.leaf_type().ok_or_else(|| {
            let class = match &info.leaf {
                Some(leaf) if info.n_leaves == 1 => leaf.class_name.clone(),
                Some(leaf) => format!("{} ({} leaves)", leaf.class_name, info.n_leaves),
                None => info.class_name.clone(),
            };
            RootError::UnsupportedLeaf(class)
        })?;
        debug!(
            "Reading {} entries of type {leaf_type} from {} baskets of branch {branch}",
            info.entries,
            info.n_baskets()
        );

        let mut values = Vec::with_capacity(info.entries as usize);
        for (n, &seek) in info.basket_seek.iter().enumerate() {
            let basket = Basket::read(&self.data, seek, self.header.is_large)?;
            let n_entries = match info.basket_entry.get(n + 1) {
                Some(&end) => end.saturating_sub(info.basket_entry[n]) as usize,
                None => basket.nev_buf.max(0) as usize,
            };
            basket.decode_into(leaf_type, n_entries, &mut values)?;
        }
        if values.len() as u64 != info.entries {
            return Err(RootError::Deserialization(format!(
                "branch {branch} has {} entries, but its baskets hold {}",
                info.entries,
                values.len()
            )));
        }
        Ok(values)
    }

    fn top_directory(&self) -> Result<Directory> {
        Directory::read_key_list(&self.data, self.header.seek_keys, self.header.is_large)
    }

    fn read_subdirectory(&self, key: &Key) -> Result<Directory> {
        let payload = self.read_key_payload(key)?;
        Directory::read_from_payload(&payload, &self.data, self.header.is_large)
    }

    fn resolve(&self, path: &str) -> Result<Key> {
        let parts: Vec<_> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((name, dirs)) = parts.split_last() else {
            return Err(RootError::KeyNotFound(path.to_owned()));
        };
        let mut dir = self.top_directory()?;
        for part in dirs {
            let key = dir
                .find_key(part)
                .ok_or_else(|| RootError::KeyNotFound(format!("{part} in {path}")))?;
            if !is_directory(&key.class_name) {
                return Err(RootError::KeyNotFound(format!(
                    "{part} in {path} is a {}, not a directory",
                    key.class_name
                )));
            }
            dir = self.read_subdirectory(key)?;
        }
        dir.find_key(name)
            .cloned()
            .ok_or_else(|| RootError::KeyNotFound(path.to_owned()))
    }

    /// Uncompressed object stored under a key
    fn read_key_payload(&self, key: &Key) -> Result<Vec<u8>> {
        let start = key.seek_key as usize + key.key_len as usize;
        let end = key.seek_key as usize + key.n_bytes as usize;
        let stored = self.data.get(start..end).ok_or(RootError::BufferUnderflow {
            offset: start,
            need: end.saturating_sub(start),
            have: self.data.len().saturating_sub(start),
        })?;
        if stored.len() == key.obj_len as usize {
            Ok(stored.to_vec())
        } else {
            decompress(stored, key.obj_len as usize)
        }
    }
}

fn parse_header(data: &[u8]) -> Result<FileHeader> {
    let mut r = RBuffer::new(data);
    r.skip(ROOT_MAGIC_BYTES.len())?;
    let version = r.read_u32()?;
    let is_large = version >= LARGE_FILE_VERSION;
    let begin = r.read_u32()? as usize;
    if is_large {
        // fEND, fSeekFree
        r.skip(16)?;
    } else {
        r.skip(8)?;
    }
    let _nbytes_free = r.read_u32()?;
    let _nfree = r.read_u32()?;
    let nbytes_name = r.read_u32()? as usize;
    let _units = r.read_u8()?;
    let compress = r.read_i32()?;

    r.set_pos(begin + nbytes_name);
    let dir = DirectoryHeader::read(&mut r)?;
    Ok(FileHeader {
        is_large,
        compress,
        seek_keys: dir.seek_keys,
    })
}
