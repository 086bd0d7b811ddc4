use std::ffi::OsString;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use rootgrid::{GIT_BRANCH, GIT_REV, VERSION};

pub(crate) const LOGLEVEL_HELP: &str = "Verbosity level.
Possible values with increasing amount of output are
'off', 'error', 'warn', 'info', 'debug', 'trace'.\n";

/// Parse command line arguments, expanding `@file` arguments
pub(crate) fn parse_args<T: Parser>() -> Result<T> {
    let args: Vec<OsString> = argfile::expand_args_from(
        std::env::args_os(),
        argfile::parse_fromfile,
        argfile::PREFIX,
    )
    .with_context(|| "Failed to read argument file")?;
    Ok(T::parse_from(args))
}

/// Set up logging and announce ourselves
pub(crate) fn init_logging(name: &str, loglevel: &str, opt: &impl std::fmt::Debug) {
    let env = Env::default().filter_or("ROOTGRID_LOG", loglevel);
    env_logger::init_from_env(env);

    if let (Some(rev), Some(branch)) = (GIT_REV, GIT_BRANCH) {
        info!("{name} {VERSION} rev {rev} ({branch})");
    } else {
        info!("{name} {VERSION}");
    }
    debug!("settings: {opt:#?}");
}
