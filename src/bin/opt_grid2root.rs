use std::path::PathBuf;

use clap::Parser;
use rootgrid::root::RootCompression;
use rootgrid::writer::DEFAULT_TREE_NAME;

use crate::opt_common::LOGLEVEL_HELP;

#[derive(Debug, Parser)]
#[clap(about, author, version)]
/// Write a text grid to a ROOT file
pub(crate) struct Opt {
    /// Output ROOT file.
    #[clap(long, short, value_parser)]
    pub(crate) outfile: PathBuf,

    /// Name of the output tree.
    #[clap(long, short, default_value = DEFAULT_TREE_NAME)]
    pub(crate) tree_name: String,

    /// Comma-separated branch names, replacing the labels in the input.
    #[clap(long, value_delimiter = ',')]
    pub(crate) labels: Option<Vec<String>>,

    #[clap(
        short,
        long,
        default_value = "zstd_5",
        help = "Compression of the ROOT file.
Possible settings are 'none', 'zlib', 'zstd'.
Compression levels can be set with algorithm_level e.g. 'zlib_9'.
Maximum levels are 'zlib_9', 'zstd_19'."
    )]
    pub(crate) compression: RootCompression,

    #[clap(short, long, default_value = "Info", help = LOGLEVEL_HELP)]
    pub(crate) loglevel: String,

    /// Input text file, optionally compressed.
    #[clap(value_parser)]
    pub(crate) infile: PathBuf,
}
