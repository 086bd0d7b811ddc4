//! Plain text dumps of grids.
//!
//! The first line is a header `# label1 label2 ...`, followed by one
//! line per sample with space-separated values in label order.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use audec::auto_decompress;
use itertools::Itertools;
use log::debug;
use thiserror::Error;

use crate::compression::{compress_writer, Compression};
use crate::grid::{Grid, ShapeError};
use crate::parsing;

#[derive(Debug, Error)]
pub enum TextError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse line {line}: `{content}`")]
    Parse { line: usize, content: String },
    #[error("Line {line} has {found} values, expected {expected}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Header does not match values: {0}")]
    Shape(#[from] ShapeError),
}

/// Write a grid as text, optionally compressed
pub fn write_grid(
    path: impl AsRef<Path>,
    grid: &Grid,
    compression: Option<Compression>,
) -> Result<(), TextError> {
    let path = path.as_ref();
    debug!(
        "Writing {} samples with {} values to {path:?}",
        grid.n_samples(),
        grid.n_labels()
    );
    let file = File::create(path)?;
    let mut out = compress_writer(BufWriter::new(file), compression)?;
    write_to(&mut out, grid)?;
    out.flush()?;
    Ok(())
}

/// Write a grid as text to an arbitrary writer
pub fn write_to(mut out: impl Write, grid: &Grid) -> Result<(), std::io::Error> {
    writeln!(out, "#{}", grid.labels().iter().map(|l| format!(" {l}")).join(""))?;
    for n in 0..grid.n_samples() {
        let line = grid.rows().iter().map(|row| format!("{:?}", row[n])).join(" ");
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Read a grid written by [write_grid]
///
/// Compressed files are decompressed automatically. Lines starting with
/// `#` are comments, the first of them holds the labels. Without a
/// header the labels are `col0`, `col1`, ...
pub fn read_grid(path: impl AsRef<Path>) -> Result<Grid, TextError> {
    let path = path.as_ref();
    debug!("Reading grid from {path:?}");
    let file = File::open(path)?;
    read_from(auto_decompress(BufReader::new(file)))
}

/// Read a grid from an arbitrary buffered reader
pub fn read_from(input: impl BufRead) -> Result<Grid, TextError> {
    let mut labels: Option<Vec<String>> = None;
    let mut samples: Vec<Vec<f64>> = Vec::new();
    for (nr, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            if labels.is_none() && samples.is_empty() {
                let (_, header) = parsing::labels(line).map_err(|_| TextError::Parse {
                    line: nr + 1,
                    content: line.to_owned(),
                })?;
                labels = Some(header.into_iter().map(String::from).collect());
            }
            continue;
        }
        let values = match parsing::values(line) {
            Ok(("", values)) => values,
            _ => {
                return Err(TextError::Parse {
                    line: nr + 1,
                    content: line.to_owned(),
                })
            }
        };
        if let Some(first) = samples.first() {
            if values.len() != first.len() {
                return Err(TextError::RaggedRow {
                    line: nr + 1,
                    expected: first.len(),
                    found: values.len(),
                });
            }
        }
        samples.push(values);
    }
    let labels = labels.unwrap_or_else(|| {
        let width = samples.first().map(|s| s.len()).unwrap_or_default();
        (0..width).map(|n| format!("col{n}")).collect()
    });
    Ok(Grid::from_samples(labels, &samples)?)
}
