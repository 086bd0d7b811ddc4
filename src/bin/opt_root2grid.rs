use std::path::PathBuf;

use clap::Parser;
use rootgrid::compression::Compression;
use rootgrid::grid::ColumnSelection;

use crate::opt_common::LOGLEVEL_HELP;

#[derive(Debug, Parser)]
#[clap(about, author, version)]
/// Load ROOT trees into a grid and write it as text
pub(crate) struct Opt {
    /// Output file.
    #[clap(long, short, value_parser)]
    pub(crate) outfile: PathBuf,

    /// Only load the tree with the given name.
    ///
    /// Trees in subdirectories are named like `dir/tree`.
    #[clap(long, short)]
    pub(crate) tree: Option<String>,

    /// Comma-separated names of the branches to load.
    ///
    /// By default, all branches are loaded.
    #[clap(long, value_delimiter = ',')]
    pub(crate) columns: Option<Vec<String>>,

    /// Index of the last tree to load, counting from zero.
    #[clap(long)]
    pub(crate) tree_limit: Option<usize>,

    /// Comma-separated paths to save the grid after each additional tree.
    ///
    /// Give one path per tree. The path for the first tree is never
    /// used.
    #[clap(long, value_delimiter = ',', value_parser)]
    pub(crate) save_paths: Vec<PathBuf>,

    #[clap(
        short,
        long,
        help = "Compress output files.
Possible settings are 'bzip2', 'gzip', 'zstd', 'lz4'.
Compression levels can be set with algorithm_level e.g. 'zstd_5'.
Maximum levels are 'gzip_9', 'zstd_19', 'lz4_16'."
    )]
    pub(crate) compression: Option<Compression>,

    #[clap(short, long, default_value = "Info", help = LOGLEVEL_HELP)]
    pub(crate) loglevel: String,

    /// Input ROOT file.
    #[clap(value_parser)]
    pub(crate) infile: PathBuf,
}

impl Opt {
    pub(crate) fn selection(&self) -> ColumnSelection {
        match &self.columns {
            Some(names) => names.iter().cloned().collect(),
            None => ColumnSelection::All,
        }
    }
}
