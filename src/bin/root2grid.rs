mod opt_common;
mod opt_root2grid;

use anyhow::{Context, Result};
use log::info;
use rootgrid::reader::{load, LoadOptions};
use rootgrid::text::write_grid;

use crate::opt_common::{init_logging, parse_args};
use crate::opt_root2grid::Opt;

fn main() -> Result<()> {
    let opt: Opt = parse_args()?;
    init_logging("root2grid", &opt.loglevel, &opt);

    let opts = LoadOptions {
        tree_limit: opt.tree_limit,
        selection: opt.selection(),
        tree: opt.tree.clone(),
        save_paths: opt.save_paths.clone(),
        save_compression: opt.compression,
    };
    let grid = load(&opt.infile, &opts)
        .with_context(|| format!("Failed to load {:?}", opt.infile))?;
    write_grid(&opt.outfile, &grid, opt.compression)
        .with_context(|| format!("Failed to write {:?}", opt.outfile))?;
    info!("done");
    Ok(())
}
