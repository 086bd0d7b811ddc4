use std::fmt::{self, Display};

use serde::Serialize;

/// Numeric type of a scalar leaf
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum LeafType {
    /// `TLeafD`, 64-bit float
    F64,
    /// `TLeafF`, 32-bit float
    F32,
    /// `TLeafL`, 64-bit signed integer
    I64,
    /// `TLeafL` with unsigned flag
    U64,
    /// `TLeafI`, 32-bit signed integer
    I32,
    /// `TLeafI` with unsigned flag
    U32,
    /// `TLeafS`, 16-bit signed integer
    I16,
    /// `TLeafS` with unsigned flag
    U16,
    /// `TLeafB`, 8-bit signed integer
    I8,
    /// `TLeafB` with unsigned flag
    U8,
    /// `TLeafO`, boolean stored in one byte
    Bool,
}

impl LeafType {
    /// Leaf type for a `TLeaf` class name and unsigned flag
    pub fn from_class(class_name: &str, unsigned: bool) -> Option<Self> {
        use LeafType::*;
        let t = match (class_name, unsigned) {
            ("TLeafD", _) => F64,
            ("TLeafF", _) => F32,
            ("TLeafL", false) => I64,
            ("TLeafL", true) => U64,
            ("TLeafI", false) => I32,
            ("TLeafI", true) => U32,
            ("TLeafS", false) => I16,
            ("TLeafS", true) => U16,
            ("TLeafB", false) => I8,
            ("TLeafB", true) => U8,
            ("TLeafO", _) => Bool,
            _ => return None,
        };
        Some(t)
    }

    /// Size of one value in bytes
    pub fn byte_size(self) -> usize {
        use LeafType::*;
        match self {
            F64 | I64 | U64 => 8,
            F32 | I32 | U32 => 4,
            I16 | U16 => 2,
            I8 | U8 | Bool => 1,
        }
    }

    /// Type code as used in branch titles, e.g. `x/D`
    pub fn code(self) -> char {
        use LeafType::*;
        match self {
            F64 => 'D',
            F32 => 'F',
            I64 => 'L',
            U64 => 'l',
            I32 => 'I',
            U32 => 'i',
            I16 => 'S',
            U16 => 's',
            I8 => 'B',
            U8 => 'b',
            Bool => 'O',
        }
    }

    /// Decode one big-endian value and cast it to `f64`
    ///
    /// `bytes` must hold at least [byte_size](Self::byte_size) bytes.
    pub(crate) fn decode_f64(self, bytes: &[u8]) -> f64 {
        use LeafType::*;
        fn arr<const N: usize>(b: &[u8]) -> [u8; N] {
            let mut out = [0; N];
            out.copy_from_slice(&b[..N]);
            out
        }
        match self {
            F64 => f64::from_be_bytes(arr(bytes)),
            F32 => f32::from_be_bytes(arr(bytes)) as f64,
            I64 => i64::from_be_bytes(arr(bytes)) as f64,
            U64 => u64::from_be_bytes(arr(bytes)) as f64,
            I32 => i32::from_be_bytes(arr(bytes)) as f64,
            U32 => u32::from_be_bytes(arr(bytes)) as f64,
            I16 => i16::from_be_bytes(arr(bytes)) as f64,
            U16 => u16::from_be_bytes(arr(bytes)) as f64,
            I8 => bytes[0] as i8 as f64,
            U8 => bytes[0] as f64,
            Bool => f64::from(u8::from(bytes[0] != 0)),
        }
    }
}

impl Display for LeafType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// First leaf of a branch
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeafInfo {
    /// `TLeaf` class name, e.g. `TLeafD`
    pub class_name: String,
    /// Number of values per entry (`fLen`)
    pub len: i32,
    pub unsigned: bool,
    /// Whether the length is given by another leaf
    pub has_count: bool,
}

/// Metadata of one `TBranch`
#[derive(Clone, Debug, Default)]
pub struct BranchInfo {
    pub name: String,
    /// Class of the streamed branch object, e.g. `TBranch`
    pub class_name: String,
    pub leaf: Option<LeafInfo>,
    /// Number of leaves of the branch
    pub n_leaves: usize,
    pub entries: u64,
    /// Size of each basket record on disk
    pub basket_bytes: Vec<u32>,
    /// First entry of each basket, plus one past the last entry
    pub basket_entry: Vec<u64>,
    /// File position of each basket
    pub basket_seek: Vec<u64>,
}

impl BranchInfo {
    /// Scalar numeric type of this branch, if it has one
    pub fn leaf_type(&self) -> Option<LeafType> {
        let leaf = self.leaf.as_ref()?;
        if self.n_leaves != 1 || leaf.len != 1 || leaf.has_count {
            return None;
        }
        LeafType::from_class(&leaf.class_name, leaf.unsigned)
    }

    /// Number of baskets holding data
    pub fn n_baskets(&self) -> usize {
        self.basket_seek.len()
    }
}

/// A parsed `TTree`
#[derive(Clone, Debug, Default)]
pub struct Tree {
    pub name: String,
    pub title: String,
    pub entries: u64,
    /// Top-level branches in storage order
    pub branches: Vec<BranchInfo>,
}

impl Tree {
    pub fn find_branch(&self, name: &str) -> Option<&BranchInfo> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn branch_names(&self) -> Vec<&str> {
        self.branches.iter().map(|b| b.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode() {
        assert_eq!(LeafType::F64.decode_f64(&2.5f64.to_be_bytes()), 2.5);
        assert_eq!(LeafType::F32.decode_f64(&(-1.5f32).to_be_bytes()), -1.5);
        assert_eq!(LeafType::I32.decode_f64(&(-7i32).to_be_bytes()), -7.);
        assert_eq!(LeafType::U16.decode_f64(&[0xff, 0xff]), 65535.);
        assert_eq!(LeafType::I8.decode_f64(&[0xff]), -1.);
        assert_eq!(LeafType::Bool.decode_f64(&[3]), 1.);
    }

    #[test]
    fn scalar_leaves_only() {
        let mut branch = BranchInfo {
            leaf: Some(LeafInfo {
                class_name: "TLeafI".to_owned(),
                len: 1,
                unsigned: true,
                has_count: false,
            }),
            n_leaves: 1,
            ..Default::default()
        };
        assert_eq!(branch.leaf_type(), Some(LeafType::U32));
        branch.leaf.as_mut().unwrap().len = 3;
        assert_eq!(branch.leaf_type(), None);
        branch.leaf.as_mut().unwrap().class_name = "TLeafElement".to_owned();
        branch.leaf.as_mut().unwrap().len = 1;
        assert_eq!(branch.leaf_type(), None);
    }
}
