use std::collections::hash_map::{Entry, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::compression::Compression;
use crate::grid::{select_and_stack, ColumnSelection, Grid, GridError};
use crate::progress_bar::{Progress, ProgressBar};
use crate::root::{LeafType, RootError, RootFile, Tree};
use crate::text::{write_grid, TextError};
use crate::traits::TreeSource;

/// Settings for [load]
#[derive(Clone, Debug, Default, TypedBuilder)]
pub struct LoadOptions {
    /// Index of the last tree to load
    ///
    /// Trees are counted from zero, so up to `tree_limit + 1` trees are
    /// loaded. Ignored if a `tree` is given.
    #[builder(default, setter(strip_option))]
    pub tree_limit: Option<usize>,
    /// Branches to load
    #[builder(default)]
    pub selection: ColumnSelection,
    /// Only load the tree with this name
    #[builder(default, setter(strip_option, into))]
    pub tree: Option<String>,
    /// Where to save the accumulated grid after each additional tree
    ///
    /// After appending tree number `n` (counting from zero), the grid
    /// is written to the `n`th path. Saving is disabled if empty.
    #[builder(default)]
    pub save_paths: Vec<PathBuf>,
    /// Compression of saved grids
    #[builder(default)]
    pub save_compression: Option<Compression>,
}

#[derive(Debug, Error)]
pub enum LoadError<E = RootError> {
    #[error("Failed to open {path:?}: {source}")]
    Open { path: PathBuf, source: RootError },
    #[error("{0}")]
    Grid(GridError<E>),
    #[error("No path to save the grid after tree {index}, only {available} paths given")]
    MissingSavePath { index: usize, available: usize },
    #[error("Failed to save grid to {path:?}: {source}")]
    Save { path: PathBuf, source: TextError },
}

/// Load a ROOT file into a grid
///
/// If a tree is selected in `opts`, only that tree is loaded. Otherwise
/// all trees in the file are loaded in storage order, up to the tree
/// limit, and their samples are concatenated.
pub fn load(path: impl AsRef<Path>, opts: &LoadOptions) -> Result<Grid, LoadError> {
    let path = path.as_ref();
    info!("Loading {path:?}");
    let mut index = TreeIndex::open(path).map_err(|source| LoadError::Open {
        path: path.to_owned(),
        source,
    })?;
    load_from(&mut index, opts)
}

/// Load trees from any source into a grid
pub fn load_from<S: TreeSource>(
    source: &mut S,
    opts: &LoadOptions,
) -> Result<Grid, LoadError<S::Error>> {
    if let Some(tree) = &opts.tree {
        return select_and_stack(source, tree, &opts.selection).map_err(LoadError::Grid);
    }

    let trees = source
        .tree_names()
        .map_err(|err| LoadError::Grid(GridError::Source(err)))?;
    let limit = opts.tree_limit.unwrap_or(usize::MAX);
    let ntrees = trees.len().min(limit.saturating_add(1));
    let progress = ProgressBar::new(ntrees as u64, "trees loaded:");
    let mut grid: Option<Grid> = None;
    for (counter, tree) in trees.iter().enumerate() {
        debug!("Loading tree {tree}");
        if counter > limit {
            break;
        }
        let next = select_and_stack(source, tree, &opts.selection)
            .map_err(LoadError::Grid)?;
        match grid.as_mut() {
            None => grid = Some(next),
            Some(grid) => {
                grid.append(next).map_err(|err| {
                    LoadError::Grid(GridError::SchemaMismatch {
                        tree: tree.clone(),
                        expected: err.expected,
                        found: err.found,
                    })
                })?;
                if !opts.save_paths.is_empty() {
                    let path = opts.save_paths.get(counter).ok_or(LoadError::MissingSavePath {
                        index: counter,
                        available: opts.save_paths.len(),
                    })?;
                    write_grid(path, grid, opts.save_compression).map_err(|source| {
                        LoadError::Save {
                            path: path.clone(),
                            source,
                        }
                    })?;
                }
            }
        }
        progress.inc(1);
    }
    progress.finish();
    let grid = grid.unwrap_or_default();
    info!(
        "Loaded {} samples with {} values",
        grid.n_samples(),
        grid.n_labels()
    );
    Ok(grid)
}

/// The trees of a ROOT file
///
/// Tree metadata is parsed on first access and cached.
pub struct TreeIndex {
    file: RootFile,
    paths: Vec<String>,
    trees: HashMap<String, Tree>,
}

impl TreeIndex {
    /// Open the ROOT file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RootError> {
        Self::new(RootFile::open(path)?)
    }

    pub fn new(file: RootFile) -> Result<Self, RootError> {
        let paths = file.tree_paths()?;
        debug!("Found trees {paths:?}");
        Ok(Self {
            file,
            paths,
            trees: HashMap::new(),
        })
    }
}

fn cached_tree<'a>(
    file: &RootFile,
    paths: &[String],
    trees: &'a mut HashMap<String, Tree>,
    path: &str,
) -> Result<Option<&'a Tree>, RootError> {
    if !paths.iter().any(|p| p == path) {
        return Ok(None);
    }
    let tree = match trees.entry(path.to_owned()) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => entry.insert(file.get_tree(path)?),
    };
    Ok(Some(tree))
}

impl TreeSource for TreeIndex {
    type Error = RootError;

    fn tree_names(&mut self) -> Result<Vec<String>, Self::Error> {
        Ok(self.paths.clone())
    }

    fn branch_names(
        &mut self,
        tree: &str,
    ) -> Result<Option<Vec<String>>, Self::Error> {
        let tree = cached_tree(&self.file, &self.paths, &mut self.trees, tree)?;
        Ok(tree.map(|t| t.branches.iter().map(|b| b.name.clone()).collect()))
    }

    fn read_branch(
        &mut self,
        tree: &str,
        branch: &str,
    ) -> Result<Vec<f64>, Self::Error> {
        let Some(t) = cached_tree(&self.file, &self.paths, &mut self.trees, tree)? else {
            return Err(RootError::TreeNotFound(tree.to_owned()));
        };
        self.file.branch_data(t, branch)
    }
}

/// Summary of a tree in a ROOT file
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeSummary {
    pub path: String,
    pub title: String,
    pub entries: u64,
    pub branches: Vec<BranchSummary>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BranchSummary {
    pub name: String,
    /// Numeric type, if the branch can be loaded
    #[serde(rename = "type")]
    pub leaf_type: Option<LeafType>,
}

impl From<(&str, &Tree)> for TreeSummary {
    fn from((path, tree): (&str, &Tree)) -> Self {
        let branches = tree
            .branches
            .iter()
            .map(|b| BranchSummary {
                name: b.name.clone(),
                leaf_type: b.leaf_type(),
            })
            .collect();
        Self {
            path: path.to_owned(),
            title: tree.title.clone(),
            entries: tree.entries,
            branches,
        }
    }
}

/// Summarise all trees in a ROOT file
///
/// The file is closed before returning.
pub fn list_trees(path: impl AsRef<Path>) -> Result<Vec<TreeSummary>, RootError> {
    let path = path.as_ref();
    let file = RootFile::open(path)?;
    let mut summaries = Vec::new();
    for tree_path in file.tree_paths()? {
        let tree = file.get_tree(&tree_path)?;
        let summary = TreeSummary::from((tree_path.as_str(), &tree));
        info!(
            "{path:?}: tree {} with {} entries and branches {:?}",
            summary.path,
            summary.entries,
            tree.branch_names()
        );
        summaries.push(summary);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BranchTable;
    use crate::root::{RootCompression, RootWriter};

    fn three_trees() -> BranchTable {
        let mut table = BranchTable::new();
        for (n, tree) in ["a", "b", "c"].into_iter().enumerate() {
            let n = n as f64;
            table.insert(tree, "x", vec![n, n + 0.5]);
            table.insert(tree, "y", vec![-n, -n - 0.5]);
        }
        table
    }

    #[test]
    fn tree_limit() {
        let _ = env_logger::builder().is_test(true).try_init();
        let opts = LoadOptions::builder().build();
        let grid = load_from(&mut three_trees(), &opts).unwrap();
        assert_eq!(grid.n_samples(), 6);

        // indices up to and including the limit
        let opts = LoadOptions::builder().tree_limit(1).build();
        let grid = load_from(&mut three_trees(), &opts).unwrap();
        assert_eq!(grid.n_samples(), 4);
        assert_eq!(grid.row("x"), Some([0., 0.5, 1., 1.5].as_slice()));

        let opts = LoadOptions::builder().tree_limit(0).build();
        let grid = load_from(&mut three_trees(), &opts).unwrap();
        assert_eq!(grid.n_samples(), 2);
    }

    #[test]
    fn single_tree() {
        let opts = LoadOptions::builder()
            .tree("b")
            .selection(["y"].into_iter().collect())
            .build();
        let grid = load_from(&mut three_trees(), &opts).unwrap();
        assert_eq!(grid.into_parts(), (vec!["y".to_owned()], vec![vec![-1.], vec![-1.5]]));

        let opts = LoadOptions::builder().tree("d").build();
        let err = load_from(&mut three_trees(), &opts).unwrap_err();
        assert!(matches!(err, LoadError::Grid(GridError::TreeNotFound(_))));
    }

    #[test]
    fn schema_mismatch() {
        let mut table = three_trees();
        table.insert("c", "z", vec![0., 0.]);
        let err = load_from(&mut table, &LoadOptions::default()).unwrap_err();
        match err {
            LoadError::Grid(GridError::SchemaMismatch { tree, found, .. }) => {
                assert_eq!(tree, "c");
                assert_eq!(found, ["x", "y", "z"]);
            }
            err => panic!("unexpected error {err}"),
        }
    }

    #[test]
    fn save_paths() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..3).map(|n| dir.path().join(format!("grid{n}.txt"))).collect();
        let opts = LoadOptions::builder().save_paths(paths.clone()).build();
        load_from(&mut three_trees(), &opts).unwrap();
        assert!(!paths[0].exists());
        assert_eq!(crate::text::read_grid(&paths[1]).unwrap().n_samples(), 4);
        assert_eq!(crate::text::read_grid(&paths[2]).unwrap().n_samples(), 6);

        let opts = LoadOptions::builder().save_paths(paths[..2].to_vec()).build();
        let err = load_from(&mut three_trees(), &opts).unwrap_err();
        assert!(matches!(
            err,
            LoadError::MissingSavePath { index: 2, available: 2 }
        ));
    }

    #[test]
    fn load_root_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.root");
        let mut writer = RootWriter::create(&path, RootCompression::Zlib(1)).unwrap();
        writer
            .write_tree("t1", &[("x", &[1f64, 2., 3.][..]), ("y", &[4f64, 5., 6.][..])])
            .unwrap();
        writer
            .write_tree("t2", &[("x", &[7f64][..]), ("y", &[8f64][..])])
            .unwrap();
        writer.close().unwrap();

        let opts = LoadOptions::builder().tree("t1").build();
        let (labels, samples) = load(&path, &opts).unwrap().into_parts();
        assert_eq!(labels, ["x", "y"]);
        assert_eq!(samples, [[1., 4.], [2., 5.], [3., 6.]]);

        let grid = load(&path, &LoadOptions::default()).unwrap();
        assert_eq!(grid.row("y"), Some([4., 5., 6., 8.].as_slice()));

        let summaries = list_trees(&path).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].path, "t2");
        assert_eq!(summaries[1].entries, 1);
        assert_eq!(summaries[1].branches[0].leaf_type, Some(LeafType::F64));
    }

    #[test]
    fn open_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.root");
        let err = load(&missing, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Open { source: RootError::Io(_), .. }));

        let text = dir.path().join("grid.txt");
        std::fs::write(&text, "# x\n1.0\n").unwrap();
        let err = load(&text, &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Open { source: RootError::BadMagic, .. }));
    }
}
