use std::path::PathBuf;

use clap::Parser;

use crate::opt_common::LOGLEVEL_HELP;

#[derive(Debug, Parser)]
#[clap(about, author, version)]
/// List the trees and branches in ROOT files
pub(crate) struct Opt {
    #[clap(short, long, default_value = "Warn", help = LOGLEVEL_HELP)]
    pub(crate) loglevel: String,

    /// Input ROOT files.
    #[clap(value_parser, required = true)]
    pub(crate) infiles: Vec<PathBuf>,
}
