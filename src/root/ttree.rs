//! `TTree`, `TBranch` and `TLeaf` streamers.
//!
//! Reading understands `TTree` versions 16 to 20 and `TBranch` versions
//! 11 to 13. Writing produces `TTree` v20 with one `TBranch` v13 and
//! `TLeafD` leaf per column.

use log::debug;

use super::rbuffer::{
    RBuffer, K_BYTE_COUNT_MASK, K_CLASS_MASK, K_MAP_OFFSET, K_NEW_CLASS_TAG,
};
use super::tree::{BranchInfo, LeafInfo, Tree};
use super::wbuffer::WBuffer;
use super::{Result, RootError};

const TTREE_VERSION: u16 = 20;
const TBRANCH_VERSION: u16 = 13;
const TLEAF_VERSION: u16 = 2;
const TLEAFD_VERSION: u16 = 1;
const TOBJARRAY_VERSION: u16 = 3;
const TATTLINE_VERSION: u16 = 2;
const TATTFILL_VERSION: u16 = 2;
const TATTMARKER_VERSION: u16 = 2;
const TIOFEATURES_VERSION: u16 = 1;

/// Default basket size announced in written branches
pub(crate) const BASKET_SIZE: i32 = 32000;

/// Class names seen in a buffer, keyed by their map offset
struct ClassMap {
    displacement: usize,
    classes: Vec<(u32, String)>,
}

enum Element {
    Null,
    Reference,
    Object { class_name: String, end: usize },
}

impl ClassMap {
    fn new(displacement: usize) -> Self {
        Self {
            displacement,
            classes: Vec::new(),
        }
    }

    fn lookup(&self, tag: u32) -> Option<&str> {
        self.classes
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, name)| name.as_str())
    }

    /// Read the header of an object stored through a pointer
    fn read_element(&mut self, r: &mut RBuffer) -> Result<Element> {
        let start = r.pos();
        let tag = r.read_u32()?;
        if tag == 0 {
            return Ok(Element::Null);
        }
        if tag & K_BYTE_COUNT_MASK == 0 {
            // reference to an object streamed earlier
            return Ok(Element::Reference);
        }
        let end = start + 4 + (tag & !K_BYTE_COUNT_MASK) as usize;
        let class_pos = r.pos();
        let class_tag = r.read_u32()?;
        let class_name = if class_tag == K_NEW_CLASS_TAG {
            let name = r.read_cstring()?;
            let map_offset = (class_pos + self.displacement + K_MAP_OFFSET) as u32;
            self.classes.push((map_offset, name.clone()));
            name
        } else if class_tag & K_CLASS_MASK != 0 {
            let offset = class_tag & !K_CLASS_MASK;
            self.lookup(offset)
                .ok_or_else(|| {
                    RootError::Deserialization(format!(
                        "unknown class reference {offset} at offset {class_pos}"
                    ))
                })?
                .to_owned()
        } else {
            return Err(RootError::Deserialization(format!(
                "unexpected class tag {class_tag:#010x} at offset {class_pos}"
            )));
        };
        Ok(Element::Object { class_name, end })
    }
}

/// Read a `TTree` from the uncompressed payload of its key
///
/// `key_len` is the length of the key header, which ROOT includes in
/// the offsets of class references.
pub(crate) fn read_ttree(payload: &[u8], key_len: usize) -> Result<Tree> {
    let mut r = RBuffer::new(payload);
    let mut classes = ClassMap::new(key_len);

    let (version, end) = r.read_version()?;
    let end = end.ok_or_else(|| {
        RootError::Deserialization("TTree without byte count".into())
    })?;
    if !(16..=TTREE_VERSION).contains(&version) {
        return Err(RootError::Deserialization(format!(
            "unsupported TTree version {version}"
        )));
    }
    let (name, title) = r.read_tnamed()?;
    // TAttLine, TAttFill, TAttMarker
    for _ in 0..3 {
        r.skip_versioned()?;
    }

    let entries = r.read_i64()?.max(0) as u64;
    let _tot_bytes = r.read_i64()?;
    let _zip_bytes = r.read_i64()?;
    let _saved_bytes = r.read_i64()?;
    if version >= 18 {
        let _flushed_bytes = r.read_i64()?;
    }
    let _weight = r.read_f64()?;
    let _timer_interval = r.read_i32()?;
    let _scan_field = r.read_i32()?;
    let _update = r.read_i32()?;
    if version >= 18 {
        let _default_entry_offset_len = r.read_i32()?;
    }
    let n_cluster_range = if version >= 19 {
        r.read_i32()?.max(0) as usize
    } else {
        0
    };
    let _max_entries = r.read_i64()?;
    let _max_entry_loop = r.read_i64()?;
    let _max_virtual_size = r.read_i64()?;
    let _auto_save = r.read_i64()?;
    if version >= 18 {
        let _auto_flush = r.read_i64()?;
    }
    let _estimate = r.read_i64()?;
    if version >= 19 {
        // fClusterRangeEnd and fClusterSize, each behind a speed bump byte
        for _ in 0..2 {
            r.skip(1 + 8 * n_cluster_range)?;
        }
    }
    if version >= 20 {
        // fIOFeatures
        r.skip_versioned()?;
    }

    let branches = read_branch_array(&mut r, &mut classes)?;
    r.set_pos(end);

    Ok(Tree {
        name,
        title,
        entries,
        branches,
    })
}

fn read_objarray_header(r: &mut RBuffer) -> Result<(usize, usize)> {
    let (_version, end) = r.read_version()?;
    let end = end.ok_or_else(|| {
        RootError::Deserialization("TObjArray without byte count".into())
    })?;
    r.read_tobject()?;
    let _name = r.read_string()?;
    let count = r.read_i32()?.max(0) as usize;
    let _low_bound = r.read_i32()?;
    Ok((count, end))
}

fn read_branch_array(
    r: &mut RBuffer,
    classes: &mut ClassMap,
) -> Result<Vec<BranchInfo>> {
    let (count, end) = read_objarray_header(r)?;
    let mut branches = Vec::with_capacity(count);
    for _ in 0..count {
        let Element::Object { class_name, end } = classes.read_element(r)?
        else {
            continue;
        };
        let branch = if class_name == "TBranch" {
            read_tbranch(r, classes)
        } else {
            read_derived_branch(r, classes)
        };
        match branch {
            Ok(mut branch) => {
                branch.class_name = class_name;
                branches.push(branch)
            }
            Err(err) => {
                debug!("skipping branch of class {class_name}: {err}")
            }
        }
        r.set_pos(end);
    }
    r.set_pos(end);
    Ok(branches)
}

/// Read a branch class that starts with a `TBranch` base, like
/// `TBranchElement`
fn read_derived_branch(
    r: &mut RBuffer,
    classes: &mut ClassMap,
) -> Result<BranchInfo> {
    let _version = r.read_version()?;
    read_tbranch(r, classes)
}

fn read_tbranch(r: &mut RBuffer, classes: &mut ClassMap) -> Result<BranchInfo> {
    let (version, end) = r.read_version()?;
    let end = end.ok_or_else(|| {
        RootError::Deserialization("TBranch without byte count".into())
    })?;
    if version < 11 {
        return Err(RootError::Deserialization(format!(
            "unsupported TBranch version {version}"
        )));
    }
    let (name, _title) = r.read_tnamed()?;
    // TAttFill
    r.skip_versioned()?;

    let _compress = r.read_i32()?;
    let _basket_size = r.read_i32()?;
    let _entry_offset_len = r.read_i32()?;
    let write_basket = r.read_i32()?.max(0) as usize;
    let _entry_number = r.read_i64()?;
    if version >= 13 {
        // fIOFeatures
        r.skip_versioned()?;
    }
    let _offset = r.read_i32()?;
    let max_baskets = r.read_i32()?.max(0) as usize;
    let _split_level = r.read_i32()?;
    let entries = r.read_i64()?.max(0) as u64;
    let _first_entry = r.read_i64()?;
    let _tot_bytes = r.read_i64()?;
    let _zip_bytes = r.read_i64()?;

    // sub-branches
    r.skip_versioned()?;
    let (leaf, n_leaves) = read_leaf_array(r, classes)?;
    // fBaskets
    r.skip_versioned()?;

    if write_basket > max_baskets {
        return Err(RootError::Deserialization(format!(
            "branch {name} claims {write_basket} baskets, but has room for {max_baskets}"
        )));
    }
    r.skip(1)?;
    let mut basket_bytes = Vec::with_capacity(write_basket);
    for i in 0..max_baskets {
        let bytes = r.read_i32()?;
        if i < write_basket {
            basket_bytes.push(bytes as u32);
        }
    }
    r.skip(1)?;
    let mut basket_entry = Vec::with_capacity(write_basket + 1);
    for i in 0..max_baskets {
        let entry = r.read_i64()?;
        if i <= write_basket {
            basket_entry.push(entry.max(0) as u64);
        }
    }
    r.skip(1)?;
    let mut basket_seek = Vec::with_capacity(write_basket);
    for i in 0..max_baskets {
        let seek = r.read_i64()?;
        if i < write_basket {
            basket_seek.push(seek.max(0) as u64);
        }
    }
    r.set_pos(end);

    Ok(BranchInfo {
        name,
        leaf,
        n_leaves,
        entries,
        basket_bytes,
        basket_entry,
        basket_seek,
        ..Default::default()
    })
}

fn read_leaf_array(
    r: &mut RBuffer,
    classes: &mut ClassMap,
) -> Result<(Option<LeafInfo>, usize)> {
    let (count, end) = read_objarray_header(r)?;
    let mut first = None;
    let mut n_leaves = 0;
    for _ in 0..count {
        match classes.read_element(r)? {
            Element::Null => {}
            Element::Reference => n_leaves += 1,
            Element::Object { class_name, end } => {
                n_leaves += 1;
                if first.is_none() {
                    first = Some(read_tleaf(r, classes, class_name)?);
                }
                r.set_pos(end);
            }
        }
    }
    r.set_pos(end);
    Ok((first, n_leaves))
}

fn read_tleaf(
    r: &mut RBuffer,
    classes: &mut ClassMap,
    class_name: String,
) -> Result<LeafInfo> {
    // derived leaf class, then the TLeaf base
    let _ = r.read_version()?;
    let _ = r.read_version()?;
    let _ = r.read_tnamed()?;
    let len = r.read_i32()?;
    let _len_type = r.read_i32()?;
    let _offset = r.read_i32()?;
    let _is_range = r.read_u8()?;
    let unsigned = r.read_u8()? != 0;
    let has_count = !matches!(classes.read_element(r)?, Element::Null);
    Ok(LeafInfo {
        class_name,
        len,
        unsigned,
        has_count,
    })
}

/// Location and size of one written basket
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct BasketRecord {
    /// Size of the basket record on disk
    pub(crate) n_bytes: u32,
    /// Uncompressed size including the key header
    pub(crate) tot_bytes: u64,
    pub(crate) first_entry: u64,
    pub(crate) seek: u64,
}

/// A written `f64` column
#[derive(Clone, Debug, Default)]
pub(crate) struct BranchRecord {
    pub(crate) name: String,
    pub(crate) entries: u64,
    pub(crate) minimum: f64,
    pub(crate) maximum: f64,
    pub(crate) baskets: Vec<BasketRecord>,
}

impl BranchRecord {
    fn tot_bytes(&self) -> i64 {
        self.baskets.iter().map(|b| b.tot_bytes as i64).sum()
    }

    fn zip_bytes(&self) -> i64 {
        self.baskets.iter().map(|b| b.n_bytes as i64).sum()
    }
}

/// Serialise a flat tree of `f64` branches
pub(crate) fn write_ttree(
    w: &mut WBuffer,
    name: &str,
    entries: u64,
    branches: &[BranchRecord],
    compress: i32,
) {
    let tot_bytes: i64 = branches.iter().map(BranchRecord::tot_bytes).sum();
    let zip_bytes: i64 = branches.iter().map(BranchRecord::zip_bytes).sum();

    let start = w.begin_versioned(TTREE_VERSION);
    w.write_tnamed(name, name);
    write_att_line(w);
    write_att_fill(w);
    write_att_marker(w);

    w.write_i64(entries as i64);
    w.write_i64(tot_bytes);
    w.write_i64(zip_bytes);
    w.write_i64(zip_bytes); // fSavedBytes
    w.write_i64(zip_bytes); // fFlushedBytes
    w.write_f64(1.); // fWeight
    w.write_i32(0); // fTimerInterval
    w.write_i32(25); // fScanField
    w.write_i32(0); // fUpdate
    w.write_i32(1000); // fDefaultEntryOffsetLen
    w.write_i32(0); // fNClusterRange
    w.write_i64(1_000_000_000_000); // fMaxEntries
    w.write_i64(1_000_000_000_000); // fMaxEntryLoop
    w.write_i64(0); // fMaxVirtualSize
    w.write_i64(-300_000_000); // fAutoSave
    w.write_i64(-30_000_000); // fAutoFlush
    w.write_i64(1_000_000); // fEstimate
    // empty fClusterRangeEnd and fClusterSize
    w.write_u8(1);
    w.write_u8(1);
    write_io_features(w);

    let array = begin_objarray(w, branches.len());
    let mut leaves = Vec::with_capacity(branches.len());
    for branch in branches {
        let (obj, _) = w.begin_object("TBranch");
        leaves.push(write_tbranch(w, branch, compress));
        w.end_object(obj);
    }
    w.end_versioned(array);

    let array = begin_objarray(w, leaves.len());
    for leaf in leaves {
        w.write_u32(leaf);
    }
    w.end_versioned(array);

    w.write_u32(0); // fAliases
    w.write_i32(0); // fIndexValues
    w.write_i32(0); // fIndex
    w.write_u32(0); // fTreeIndex
    w.write_u32(0); // fFriends
    w.write_u32(0); // fUserInfo
    w.write_u32(0); // fBranchRef
    w.end_versioned(start);
}

/// Returns the object tag of the branch's leaf
fn write_tbranch(w: &mut WBuffer, branch: &BranchRecord, compress: i32) -> u32 {
    let n_baskets = branch.baskets.len();
    let max_baskets = n_baskets + 1;

    let start = w.begin_versioned(TBRANCH_VERSION);
    w.write_tnamed(&branch.name, &format!("{}/D", branch.name));
    write_att_fill(w);
    w.write_i32(compress);
    w.write_i32(BASKET_SIZE);
    w.write_i32(0); // fEntryOffsetLen
    w.write_i32(n_baskets as i32); // fWriteBasket
    w.write_i64(branch.entries as i64); // fEntryNumber
    write_io_features(w);
    w.write_i32(0); // fOffset
    w.write_i32(max_baskets as i32);
    w.write_i32(0); // fSplitLevel
    w.write_i64(branch.entries as i64);
    w.write_i64(0); // fFirstEntry
    w.write_i64(branch.tot_bytes());
    w.write_i64(branch.zip_bytes());

    let sub_branches = begin_objarray(w, 0);
    w.end_versioned(sub_branches);

    let leaves = begin_objarray(w, 1);
    let (leaf, tag) = w.begin_object("TLeafD");
    write_tleafd(w, branch);
    w.end_object(leaf);
    w.end_versioned(leaves);

    let baskets = begin_objarray(w, 0);
    w.end_versioned(baskets);

    w.write_u8(1);
    for basket in &branch.baskets {
        w.write_i32(basket.n_bytes as i32);
    }
    w.write_i32(0);
    w.write_u8(1);
    for basket in &branch.baskets {
        w.write_i64(basket.first_entry as i64);
    }
    w.write_i64(branch.entries as i64);
    w.write_u8(1);
    for basket in &branch.baskets {
        w.write_i64(basket.seek as i64);
    }
    w.write_i64(0);
    w.write_string(""); // fFileName
    w.end_versioned(start);
    tag
}

fn write_tleafd(w: &mut WBuffer, branch: &BranchRecord) {
    let start = w.begin_versioned(TLEAFD_VERSION);
    let base = w.begin_versioned(TLEAF_VERSION);
    w.write_tnamed(&branch.name, &branch.name);
    w.write_i32(1); // fLen
    w.write_i32(8); // fLenType
    w.write_i32(0); // fOffset
    w.write_u8(0); // fIsRange
    w.write_u8(0); // fIsUnsigned
    w.write_u32(0); // fLeafCount
    w.end_versioned(base);
    w.write_f64(branch.minimum);
    w.write_f64(branch.maximum);
    w.end_versioned(start);
}

fn begin_objarray(w: &mut WBuffer, count: usize) -> usize {
    let start = w.begin_versioned(TOBJARRAY_VERSION);
    w.write_tobject();
    w.write_string("");
    w.write_i32(count as i32);
    w.write_i32(0); // lower bound
    start
}

fn write_att_line(w: &mut WBuffer) {
    let start = w.begin_versioned(TATTLINE_VERSION);
    w.write_i16(602);
    w.write_i16(1);
    w.write_i16(1);
    w.end_versioned(start)
}

fn write_att_fill(w: &mut WBuffer) {
    let start = w.begin_versioned(TATTFILL_VERSION);
    w.write_i16(0);
    w.write_i16(1001);
    w.end_versioned(start)
}

fn write_att_marker(w: &mut WBuffer) {
    let start = w.begin_versioned(TATTMARKER_VERSION);
    w.write_i16(1);
    w.write_i16(1);
    w.write_f32(1.);
    w.end_versioned(start)
}

fn write_io_features(w: &mut WBuffer) {
    let start = w.begin_versioned(TIOFEATURES_VERSION);
    w.write_u8(0);
    w.end_versioned(start)
}

#[cfg(test)]
mod tests {
    use super::super::tree::LeafType;
    use super::*;

    fn record(name: &str, entries: u64, seek: u64) -> BranchRecord {
        BranchRecord {
            name: name.to_owned(),
            entries,
            minimum: 0.,
            maximum: 1.,
            baskets: vec![
                BasketRecord {
                    n_bytes: 100,
                    tot_bytes: 120,
                    first_entry: 0,
                    seek,
                },
                BasketRecord {
                    n_bytes: 50,
                    tot_bytes: 60,
                    first_entry: 4,
                    seek: seek + 100,
                },
            ],
        }
    }

    #[test]
    fn tree_round_trip() {
        let key_len = 40;
        let branches = [record("x", 6, 1000), record("y", 6, 2000)];
        let mut w = WBuffer::new(key_len);
        write_ttree(&mut w, "events", 6, &branches, 101);
        let payload = w.into_inner();

        let tree = read_ttree(&payload, key_len).unwrap();
        assert_eq!(tree.name, "events");
        assert_eq!(tree.entries, 6);
        assert_eq!(tree.branch_names(), ["x", "y"]);
        let y = tree.find_branch("y").unwrap();
        assert_eq!(y.class_name, "TBranch");
        assert_eq!(y.leaf_type(), Some(LeafType::F64));
        assert_eq!(y.entries, 6);
        assert_eq!(y.basket_bytes, [100, 50]);
        assert_eq!(y.basket_entry, [0, 4, 6]);
        assert_eq!(y.basket_seek, [2000, 2100]);
    }

    #[test]
    fn wrong_displacement() {
        let branches = [record("x", 6, 1000), record("y", 6, 2000)];
        let mut w = WBuffer::new(40);
        write_ttree(&mut w, "events", 6, &branches, 0);
        let payload = w.into_inner();

        // the second branch refers to the class name by offset
        let tree = read_ttree(&payload, 0);
        assert!(tree.is_err());
    }
}
