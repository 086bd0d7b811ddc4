//! `rootgrid` converts between ROOT trees and dense numeric grids.
//!
//! A grid holds one row of `f64` values per selected branch, labelled
//! with the branch name. Grids can be stacked from several trees and
//! written back to a ROOT file as a single flat tree.
//!
//! # How to use
//!
//! ```no_run
//! use rootgrid::prelude::*;
//!
//! let opts = LoadOptions::builder()
//!     .selection(["x", "y"].into_iter().collect())
//!     .build();
//! let grid = load("events.root", &opts)?;
//! let (labels, samples) = grid.into_parts();
//! export("copy.root", &labels, &samples)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Most relevant modules
//!
//! - [prelude] exports the most relevant types and functions
//! - [grid] defines grids and how trees are stacked into them
//! - [reader] loads ROOT files
//! - [writer] exports grids to ROOT files
//! - [root] is the low-level ROOT file format layer
//!

/// Compression of text output
pub mod compression;
pub mod grid;
/// Most important exports
pub mod prelude;
/// Progress bar
pub mod progress_bar;
/// Loading grids from ROOT files
pub mod reader;
pub mod root;
pub mod text;
/// Common traits
pub mod traits;
/// Exporting grids to ROOT files
pub mod writer;

mod parsing;

use lazy_static::lazy_static;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
lazy_static! {
    pub static ref VERSION_MAJOR: u32 =
        env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap();
    pub static ref VERSION_MINOR: u32 =
        env!("CARGO_PKG_VERSION_MINOR").parse().unwrap();
    pub static ref VERSION_PATCH: u32 =
        env!("CARGO_PKG_VERSION_PATCH").parse().unwrap();
}
pub const GIT_REV: Option<&str> = option_env!("VERGEN_GIT_SHA");
pub const GIT_BRANCH: Option<&str> = option_env!("VERGEN_GIT_BRANCH");
