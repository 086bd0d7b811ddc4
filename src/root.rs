//! Minimal native ROOT file support
//!
//! Only what is needed to move flat numeric trees in and out of ROOT
//! files: directory and key navigation, `TTree`/`TBranch`/`TLeaf`
//! metadata, basket decompression and decoding of scalar leaves, and
//! writing of flat `f64` trees.
pub(crate) mod basket;
/// ROOT compression blocks
pub mod compress;
pub(crate) mod directory;
/// Reading ROOT files
pub mod file;
pub(crate) mod key;
pub(crate) mod rbuffer;
/// Tree and branch metadata
pub mod tree;
pub(crate) mod ttree;
pub(crate) mod wbuffer;
/// Writing ROOT files
pub mod writer;

pub use compress::RootCompression;
pub use file::RootFile;
pub use key::KeyInfo;
pub use tree::{BranchInfo, LeafInfo, LeafType, Tree};
pub use writer::RootWriter;

use thiserror::Error;

/// The four magic bytes every ROOT file starts with
pub const ROOT_MAGIC_BYTES: [u8; 4] = [b'r', b'o', b'o', b't'];

/// Errors from reading or writing ROOT files
#[derive(Debug, Error)]
pub enum RootError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a ROOT file: missing `root` magic bytes")]
    BadMagic,
    #[error("Need {need} bytes at offset {offset}, but only {have} are left")]
    BufferUnderflow {
        offset: usize,
        need: usize,
        have: usize,
    },
    #[error("Failed to decode ROOT record: {0}")]
    Deserialization(String),
    #[error("Failed to decompress ROOT block: {0}")]
    Decompression(String),
    #[error("Failed to compress ROOT block: {0}")]
    Compression(String),
    #[error("No key `{0}`")]
    KeyNotFound(String),
    #[error("No tree `{0}`")]
    TreeNotFound(String),
    #[error("No branch `{0}`")]
    BranchNotFound(String),
    #[error("Unsupported leaf class `{0}`")]
    UnsupportedLeaf(String),
    #[error("Column `{name}` has {len} entries, expected {expected}")]
    ColumnLength {
        name: String,
        len: usize,
        expected: usize,
    },
    #[error("Output exceeds the 2GB limit of small ROOT files")]
    TooLarge,
}

pub(crate) type Result<T> = std::result::Result<T, RootError>;
