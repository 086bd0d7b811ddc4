mod opt_common;
mod opt_ls;

use std::io::{stdout, Write};

use anyhow::{Context, Result};
use rootgrid::reader::list_trees;

use crate::opt_common::{init_logging, parse_args};
use crate::opt_ls::Opt;

fn main() -> Result<()> {
    let opt: Opt = parse_args()?;
    init_logging("rootgrid-ls", &opt.loglevel, &opt);

    let mut out = stdout().lock();
    for file in &opt.infiles {
        let trees = list_trees(file)
            .with_context(|| format!("Failed to read {file:?}"))?;
        writeln!(out, "# {}", file.display())?;
        serde_yaml::to_writer(&mut out, &trees)?;
    }
    Ok(())
}
