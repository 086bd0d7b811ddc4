use std::collections::HashSet;

use log::{debug, trace};
use thiserror::Error;

use crate::traits::TreeSource;

/// Branches to take from a tree
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ColumnSelection {
    /// Every branch
    #[default]
    All,
    /// Only branches with one of the given names
    Only(HashSet<String>),
}

impl ColumnSelection {
    /// Whether the branch `name` is selected
    pub fn contains(&self, name: &str) -> bool {
        match self {
            ColumnSelection::All => true,
            ColumnSelection::Only(names) => names.contains(name),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for ColumnSelection {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        ColumnSelection::Only(iter.into_iter().map(Into::into).collect())
    }
}

/// Stacked branch values
///
/// One row per branch, all rows with the same number of samples. The
/// labels are the branch names, in row order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Grid {
    labels: Vec<String>,
    rows: Vec<Vec<f64>>,
}

/// Inconsistent grid dimensions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("Got {labels} labels for {rows} rows")]
    LabelCount { labels: usize, rows: usize },
    #[error("Row `{label}` has {found} samples, expected {expected}")]
    RowLength {
        label: String,
        expected: usize,
        found: usize,
    },
    #[error("Got {samples} samples, but no labels")]
    NoLabels { samples: usize },
    #[error("Sample {sample} has {found} values, expected {expected}")]
    SampleLength {
        sample: usize,
        expected: usize,
        found: usize,
    },
}

/// Grids with different labels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Labels {found:?} differ from {expected:?}")]
pub struct LabelMismatch {
    pub expected: Vec<String>,
    pub found: Vec<String>,
}

impl Grid {
    /// A grid without rows
    pub fn new() -> Self {
        Self::default()
    }

    /// Grid from labelled rows of equal length
    pub fn from_rows(
        labels: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, ShapeError> {
        if labels.len() != rows.len() {
            return Err(ShapeError::LabelCount {
                labels: labels.len(),
                rows: rows.len(),
            });
        }
        if let Some(first) = rows.first() {
            let expected = first.len();
            if let Some((label, row)) =
                labels.iter().zip(&rows).find(|(_, r)| r.len() != expected)
            {
                return Err(ShapeError::RowLength {
                    label: label.clone(),
                    expected,
                    found: row.len(),
                });
            }
        }
        Ok(Self { labels, rows })
    }

    /// Grid from samples, each holding one value per label
    ///
    /// Without labels there are no rows to hold the samples, so
    /// `samples` has to be empty as well.
    pub fn from_samples<S: AsRef<[f64]>>(
        labels: Vec<String>,
        samples: &[S],
    ) -> Result<Self, ShapeError> {
        if labels.is_empty() && !samples.is_empty() {
            return Err(ShapeError::NoLabels {
                samples: samples.len(),
            });
        }
        let mut rows = vec![Vec::with_capacity(samples.len()); labels.len()];
        for (n, sample) in samples.iter().enumerate() {
            let sample = sample.as_ref();
            if sample.len() != labels.len() {
                return Err(ShapeError::SampleLength {
                    sample: n,
                    expected: labels.len(),
                    found: sample.len(),
                });
            }
            for (row, &val) in rows.iter_mut().zip(sample) {
                row.push(val);
            }
        }
        Ok(Self { labels, rows })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Rows in label order
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// The row for `label`
    pub fn row(&self, label: &str) -> Option<&[f64]> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|pos| self.rows[pos].as_slice())
    }

    pub fn n_labels(&self) -> usize {
        self.labels.len()
    }

    pub fn n_samples(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0
    }

    /// Values of the `n`th sample in label order
    pub fn sample(&self, n: usize) -> Option<Vec<f64>> {
        if n >= self.n_samples() {
            return None;
        }
        Some(self.rows.iter().map(|row| row[n]).collect())
    }

    /// Transposed view, one entry per sample
    pub fn samples(&self) -> Vec<Vec<f64>> {
        (0..self.n_samples())
            .map(|n| self.rows.iter().map(|row| row[n]).collect())
            .collect()
    }

    /// Labels and transposed values
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<f64>>) {
        let samples = self.samples();
        (self.labels, samples)
    }

    /// Transposed values, one entry per sample
    pub fn into_samples(self) -> Vec<Vec<f64>> {
        self.samples()
    }

    /// Labels and rows
    pub fn into_rows(self) -> (Vec<String>, Vec<Vec<f64>>) {
        (self.labels, self.rows)
    }

    /// Append the samples of another grid with the same labels
    pub fn append(&mut self, other: Grid) -> Result<(), LabelMismatch> {
        if self.labels != other.labels {
            return Err(LabelMismatch {
                expected: self.labels.clone(),
                found: other.labels,
            });
        }
        for (row, more) in self.rows.iter_mut().zip(other.rows) {
            row.extend(more);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum GridError<E> {
    #[error("Failed to read tree data: {0}")]
    Source(E),
    #[error("No tree `{0}`")]
    TreeNotFound(String),
    #[error("Tree `{tree}` has no branches {missing:?}")]
    BranchNotFound { tree: String, missing: Vec<String> },
    #[error(
        "Branch `{branch}` in tree `{tree}` has {found} entries, expected {expected}"
    )]
    ShapeMismatch {
        tree: String,
        branch: String,
        expected: usize,
        found: usize,
    },
    #[error("Branches {found:?} of tree `{tree}` differ from earlier trees with {expected:?}")]
    SchemaMismatch {
        tree: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Stack the selected branches of a tree into a grid
///
/// Branches are taken in their native order. All selected branches
/// must have the same number of entries, and every explicitly selected
/// name has to exist in the tree.
pub fn select_and_stack<S: TreeSource>(
    source: &mut S,
    tree: &str,
    selection: &ColumnSelection,
) -> Result<Grid, GridError<S::Error>> {
    use GridError::*;

    let Some(names) = source.branch_names(tree).map_err(Source)? else {
        return Err(TreeNotFound(tree.to_owned()));
    };
    if let ColumnSelection::Only(selected) = selection {
        let mut missing: Vec<_> = selected
            .iter()
            .filter(|name| !names.contains(*name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            missing.sort();
            return Err(BranchNotFound {
                tree: tree.to_owned(),
                missing,
            });
        }
    }

    let mut grid = Grid::new();
    for name in names {
        if !selection.contains(&name) {
            trace!("Skipping branch {name}");
            continue;
        }
        let values = source.read_branch(tree, &name).map_err(Source)?;
        if let Some(first) = grid.rows.first() {
            if values.len() != first.len() {
                return Err(ShapeMismatch {
                    tree: tree.to_owned(),
                    branch: name,
                    expected: first.len(),
                    found: values.len(),
                });
            }
        }
        grid.labels.push(name);
        grid.rows.push(values);
    }
    debug!(
        "Stacked {} branches with {} samples from tree {tree}",
        grid.n_labels(),
        grid.n_samples()
    );
    Ok(grid)
}

/// Trees held in memory
///
/// Trees and their branches keep their insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BranchTable {
    trees: Vec<(String, Vec<(String, Vec<f64>)>)>,
}

impl BranchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a branch, creating the tree if needed
    ///
    /// Replaces the values of an existing branch with the same name.
    pub fn insert(
        &mut self,
        tree: impl Into<String>,
        branch: impl Into<String>,
        values: Vec<f64>,
    ) {
        let tree = tree.into();
        let branch = branch.into();
        let pos = match self.trees.iter().position(|(t, _)| *t == tree) {
            Some(pos) => pos,
            None => {
                self.trees.push((tree, Vec::new()));
                self.trees.len() - 1
            }
        };
        let branches = &mut self.trees[pos].1;
        match branches.iter_mut().find(|(b, _)| *b == branch) {
            Some((_, old)) => *old = values,
            None => branches.push((branch, values)),
        }
    }

    fn tree(&self, tree: &str) -> Option<&[(String, Vec<f64>)]> {
        self.trees
            .iter()
            .find(|(t, _)| t == tree)
            .map(|(_, branches)| branches.as_slice())
    }
}

/// Missing branch in a [BranchTable]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No branch `{branch}` in tree `{tree}`")]
pub struct MissingBranch {
    pub tree: String,
    pub branch: String,
}

impl TreeSource for BranchTable {
    type Error = MissingBranch;

    fn tree_names(&mut self) -> Result<Vec<String>, Self::Error> {
        Ok(self.trees.iter().map(|(t, _)| t.clone()).collect())
    }

    fn branch_names(
        &mut self,
        tree: &str,
    ) -> Result<Option<Vec<String>>, Self::Error> {
        Ok(self
            .tree(tree)
            .map(|branches| branches.iter().map(|(b, _)| b.clone()).collect()))
    }

    fn read_branch(
        &mut self,
        tree: &str,
        branch: &str,
    ) -> Result<Vec<f64>, Self::Error> {
        self.tree(tree)
            .and_then(|branches| branches.iter().find(|(b, _)| b == branch))
            .map(|(_, values)| values.clone())
            .ok_or_else(|| MissingBranch {
                tree: tree.to_owned(),
                branch: branch.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t1() -> BranchTable {
        let mut table = BranchTable::new();
        table.insert("t1", "x", vec![1., 2., 3.]);
        table.insert("t1", "y", vec![4., 5., 6.]);
        table
    }

    #[test]
    fn stack_all() {
        let _ = env_logger::builder().is_test(true).try_init();
        let grid = select_and_stack(&mut t1(), "t1", &ColumnSelection::All).unwrap();
        assert_eq!(grid.n_labels(), 2);
        assert_eq!(grid.n_samples(), 3);
        let (labels, samples) = grid.into_parts();
        assert_eq!(labels, ["x", "y"]);
        assert_eq!(samples, [[1., 4.], [2., 5.], [3., 6.]]);
    }

    #[test]
    fn selection_keeps_source_order() {
        let mut table = t1();
        table.insert("t1", "z", vec![7., 8., 9.]);
        let selection: ColumnSelection = ["z", "x"].into_iter().collect();
        let grid = select_and_stack(&mut table, "t1", &selection).unwrap();
        assert_eq!(grid.labels(), ["x", "z"]);
        assert_eq!(grid.row("z"), Some([7., 8., 9.].as_slice()));
        assert_eq!(grid.row("y"), None);
        assert_eq!(grid.sample(1), Some(vec![2., 8.]));
    }

    #[test]
    fn missing_names() {
        let selection: ColumnSelection = ["x", "w", "v"].into_iter().collect();
        let err = select_and_stack(&mut t1(), "t1", &selection).unwrap_err();
        match err {
            GridError::BranchNotFound { tree, missing } => {
                assert_eq!(tree, "t1");
                assert_eq!(missing, ["v", "w"]);
            }
            err => panic!("unexpected error {err}"),
        }
        let err = select_and_stack(&mut t1(), "t2", &ColumnSelection::All).unwrap_err();
        assert!(matches!(err, GridError::TreeNotFound(t) if t == "t2"));
    }

    #[test]
    fn shape_mismatch() {
        let mut table = t1();
        table.insert("t1", "z", vec![1., 2.]);
        let err = select_and_stack(&mut table, "t1", &ColumnSelection::All).unwrap_err();
        assert!(matches!(
            err,
            GridError::ShapeMismatch { expected: 3, found: 2, .. }
        ));
        // not selected, so no error
        let selection: ColumnSelection = ["x", "y"].into_iter().collect();
        assert!(select_and_stack(&mut table, "t1", &selection).is_ok());
    }

    #[test]
    fn nothing_selected() {
        let selection = ColumnSelection::Only(HashSet::new());
        let grid = select_and_stack(&mut t1(), "t1", &selection).unwrap();
        assert_eq!(grid, Grid::new());

        let mut table = t1();
        table.insert("t2", "a", vec![]);
        let grid = select_and_stack(&mut table, "t2", &ColumnSelection::All).unwrap();
        assert_eq!(grid.labels(), ["a"]);
        assert!(grid.is_empty());
        assert!(grid.into_samples().is_empty());
    }

    #[test]
    fn append() {
        let mut grid = select_and_stack(&mut t1(), "t1", &ColumnSelection::All).unwrap();
        let other = Grid::from_rows(
            vec!["x".to_owned(), "y".to_owned()],
            vec![vec![10.], vec![20.]],
        )
        .unwrap();
        grid.append(other).unwrap();
        assert_eq!(grid.n_samples(), 4);
        assert_eq!(grid.sample(3), Some(vec![10., 20.]));

        let other = Grid::from_rows(
            vec!["y".to_owned(), "x".to_owned()],
            vec![vec![10.], vec![20.]],
        )
        .unwrap();
        assert!(grid.append(other).is_err());
        assert_eq!(grid.n_samples(), 4);
    }

    #[test]
    fn from_samples() {
        let labels = vec!["a".to_owned(), "b".to_owned()];
        let grid = Grid::from_samples(labels.clone(), &[[1., 2.], [3., 4.]]).unwrap();
        assert_eq!(grid.rows(), [vec![1., 3.], vec![2., 4.]]);
        assert!(matches!(
            Grid::from_samples(labels.clone(), &[vec![1., 2.], vec![3.]]),
            Err(ShapeError::SampleLength { sample: 1, .. })
        ));
        // the sample count has to survive the transposition
        let empty: [[f64; 0]; 3] = [[], [], []];
        assert_eq!(
            Grid::from_samples(Vec::new(), &empty),
            Err(ShapeError::NoLabels { samples: 3 })
        );
        assert_eq!(Grid::from_samples(Vec::new(), &empty[..0]), Ok(Grid::new()));
        assert!(matches!(
            Grid::from_rows(labels, vec![vec![1.], vec![]]),
            Err(ShapeError::RowLength { .. })
        ));
    }
}
