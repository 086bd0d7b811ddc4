mod opt_common;
mod opt_grid2root;

use anyhow::{bail, Context, Result};
use log::info;
use rootgrid::grid::Grid;
use rootgrid::text::read_grid;
use rootgrid::writer::TreeWriter;

use crate::opt_common::{init_logging, parse_args};
use crate::opt_grid2root::Opt;

fn main() -> Result<()> {
    let opt: Opt = parse_args()?;
    init_logging("grid2root", &opt.loglevel, &opt);

    let mut grid = read_grid(&opt.infile)
        .with_context(|| format!("Failed to read {:?}", opt.infile))?;
    if let Some(labels) = &opt.labels {
        if labels.len() != grid.n_labels() {
            bail!(
                "Got {} labels, but {:?} has {} columns",
                labels.len(),
                opt.infile,
                grid.n_labels()
            );
        }
        let (_, rows) = grid.into_rows();
        grid = Grid::from_rows(labels.clone(), rows)?;
    }
    TreeWriter::builder()
        .filename(opt.outfile.as_path())
        .tree_name(opt.tree_name.as_str())
        .compression(opt.compression)
        .build()
        .write_grid(&grid)
        .with_context(|| format!("Failed to write {:?}", opt.outfile))?;
    info!("done");
    Ok(())
}
