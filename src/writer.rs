use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::grid::{Grid, ShapeError};
use crate::root::{RootCompression, RootError, RootWriter};

/// Name of exported trees unless configured otherwise
pub const DEFAULT_TREE_NAME: &str = "data_tree";

/// Writer of grids to ROOT files
///
/// Each grid becomes a single tree with one `f64` branch per label.
/// Existing files are overwritten.
#[derive(Clone, Debug, TypedBuilder)]
pub struct TreeWriter {
    #[builder(setter(into))]
    filename: PathBuf,
    #[builder(default = DEFAULT_TREE_NAME.to_owned(), setter(into))]
    tree_name: String,
    #[builder(default)]
    compression: RootCompression,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write ROOT file: {0}")]
    Root(RootError),
    #[error("Sample {sample} has {found} values, but there are {expected} labels")]
    LabelMismatch {
        sample: usize,
        expected: usize,
        found: usize,
    },
    #[error("Duplicate label `{0}`")]
    DuplicateLabel(String),
    #[error("Invalid tree name `{0}`: must be non-empty and must not contain `/`")]
    InvalidTreeName(String),
    #[error("Inconsistent grid: {0}")]
    Shape(ShapeError),
}

impl From<ShapeError> for ExportError {
    fn from(err: ShapeError) -> Self {
        match err {
            ShapeError::SampleLength {
                sample,
                expected,
                found,
            } => ExportError::LabelMismatch {
                sample,
                expected,
                found,
            },
            err => ExportError::Shape(err),
        }
    }
}

impl From<RootError> for ExportError {
    fn from(err: RootError) -> Self {
        match err {
            RootError::Io(err) => ExportError::Io(err),
            err => ExportError::Root(err),
        }
    }
}

impl TreeWriter {
    /// Write samples with one value per label
    pub fn write<L, S>(&self, labels: &[L], samples: &[S]) -> Result<(), ExportError>
    where
        L: AsRef<str>,
        S: AsRef<[f64]>,
    {
        let labels: Vec<String> =
            labels.iter().map(|l| l.as_ref().to_owned()).collect();
        let grid = Grid::from_samples(labels, samples)?;
        self.write_grid(&grid)
    }

    /// Write all rows of a grid as branches
    pub fn write_grid(&self, grid: &Grid) -> Result<(), ExportError> {
        // `/` separates directories in tree paths
        if self.tree_name.is_empty() || self.tree_name.contains('/') {
            return Err(ExportError::InvalidTreeName(self.tree_name.clone()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = grid.labels().iter().find(|l| !seen.insert(l.as_str())) {
            return Err(ExportError::DuplicateLabel(dup.to_owned()));
        }
        let columns: Vec<_> = grid
            .labels()
            .iter()
            .zip(grid.rows())
            .map(|(label, row)| (label.as_str(), row.as_slice()))
            .collect();
        let mut writer = RootWriter::create(&self.filename, self.compression)?;
        writer.write_tree(&self.tree_name, &columns)?;
        writer.close()?;
        info!(
            "Wrote {} samples with {} branches to tree {} in {:?}",
            grid.n_samples(),
            grid.n_labels(),
            self.tree_name,
            self.filename
        );
        Ok(())
    }
}

/// Write samples to a ROOT file as tree [DEFAULT_TREE_NAME]
///
/// `samples` holds one value for each label per entry.
pub fn export<L, S>(
    path: impl AsRef<Path>,
    labels: &[L],
    samples: &[S],
) -> Result<(), ExportError>
where
    L: AsRef<str>,
    S: AsRef<[f64]>,
{
    TreeWriter::builder()
        .filename(path.as_ref())
        .build()
        .write(labels, samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{load, LoadOptions};

    #[test]
    fn round_trip() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.root");
        let labels = ["b", "a", "c"];
        let samples: Vec<_> = (0..10_000)
            .map(|n| {
                let n = n as f64;
                vec![n, n.sqrt(), -n / 3.]
            })
            .collect();
        export(&path, &labels, &samples).unwrap();

        let opts = LoadOptions::builder().tree(DEFAULT_TREE_NAME).build();
        let (read_labels, read_samples) = load(&path, &opts).unwrap().into_parts();
        assert_eq!(read_labels, labels);
        assert_eq!(read_samples, samples);
    }

    #[test]
    fn custom_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.root");
        let writer = TreeWriter::builder()
            .filename(&path)
            .tree_name("events")
            .compression(RootCompression::None)
            .build();
        writer.write(&["x"], &[[1.], [2.]]).unwrap();
        // overwrite
        writer.write(&["y"], &[[3.]]).unwrap();

        let grid = load(&path, &LoadOptions::default()).unwrap();
        assert_eq!(grid.labels(), ["y"]);
        assert_eq!(grid.rows(), [vec![3.]]);
    }

    #[test]
    fn invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.root");
        let err = export(&path, &["x", "y"], &[vec![1., 2.], vec![3.]]).unwrap_err();
        assert!(matches!(
            err,
            ExportError::LabelMismatch { sample: 1, expected: 2, found: 1 }
        ));
        let err = export(&path, &["x", "x"], &[[1., 2.]]).unwrap_err();
        assert!(matches!(err, ExportError::DuplicateLabel(l) if l == "x"));
        assert!(!path.exists());

        let err = export(&path, &[] as &[&str], &[[], [], []] as &[[f64; 0]]).unwrap_err();
        assert!(matches!(err, ExportError::Shape(ShapeError::NoLabels { samples: 3 })));
        assert!(!path.exists());

        let path = dir.path().join("missing").join("out.root");
        let err = export(&path, &["x"], &[[1.]]).unwrap_err();
        assert!(matches!(err, ExportError::Io(_)));
    }

    #[test]
    fn invalid_tree_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.root");
        for name in ["a/b", "", "/t"] {
            let err = TreeWriter::builder()
                .filename(&path)
                .tree_name(name)
                .build()
                .write(&["x"], &[[1.]])
                .unwrap_err();
            assert!(matches!(err, ExportError::InvalidTreeName(n) if n == name));
        }
        assert!(!path.exists());
    }
}
