mod opt_common;
mod opt_grid2root;
mod opt_ls;
mod opt_root2grid;

use std::env::var_os;
use std::io::{stdout, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete::{generate, shells::*, Generator};
use strum::{Display, EnumString};

#[derive(
    Copy,
    Clone,
    Debug,
    Display,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    EnumString,
    ValueEnum,
)]
#[strum(ascii_case_insensitive)]
#[strum(serialize_all = "lowercase")]
enum Shell {
    Bash,
    Elvish,
    Fish,
    #[allow(clippy::enum_variant_names)]
    PowerShell,
    Zsh,
}

#[derive(Debug, Parser)]
struct ShellSelect {
    /// Shell for which to generate completions
    ///
    /// If omitted, use the shell from the `SHELL` environment variable
    #[clap(value_enum)]
    shell: Option<Shell>,
}

fn gen_completion<S: Copy + Generator, W: Write>(shell: S, mut to: W) {
    generate(
        shell,
        &mut crate::opt_root2grid::Opt::command(),
        "root2grid",
        &mut to,
    );
    generate(
        shell,
        &mut crate::opt_grid2root::Opt::command(),
        "grid2root",
        &mut to,
    );
    generate(shell, &mut crate::opt_ls::Opt::command(), "rootgrid-ls", &mut to);
}

fn main() -> Result<()> {
    let shell = ShellSelect::parse()
        .shell
        .map_or_else(get_login_shell, Ok)
        .context("Failed to determine shell")?;
    eprintln!("Generating {shell} completions");
    let out = stdout().lock();
    match shell {
        Shell::Bash => gen_completion(Bash, out),
        Shell::Elvish => gen_completion(Elvish, out),
        Shell::Fish => gen_completion(Fish, out),
        Shell::PowerShell => gen_completion(PowerShell, out),
        Shell::Zsh => gen_completion(Zsh, out),
    }
    Ok(())
}

fn get_login_shell() -> Result<Shell> {
    let shell = var_os("SHELL").context("SHELL is not set")?;
    let name = Path::new(&shell)
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid shell {shell:?}"))?;
    name.parse()
        .with_context(|| format!("{name} is not a supported shell"))
}
