pub use crate::{
    grid::{select_and_stack, ColumnSelection, Grid},
    reader::{list_trees, load, LoadOptions},
    root::RootCompression,
    traits::TreeSource,
    writer::{export, TreeWriter},
};
