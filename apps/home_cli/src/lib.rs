//! # home-cli
//!
//! The `home` command-line tool: a thin `clap` dispatcher over
//! [`home_compile`]'s pipeline driver and scheduler, split into a lib and a
//! thin bin crate so the command logic stays testable without shelling
//! out to a built binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

use clap::Parser;
use cli::{Cli, Commands};
use error::CliError;

pub fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build { path, opt_level, target, output, emit, no_cache } => {
            commands::build(path, opt_level, target, output, emit, no_cache, cli.color)
        }
        Commands::Run { path, opt_level, interpret, no_cache } => commands::run(path, opt_level, interpret, no_cache, cli.color),
        Commands::Check { path } => commands::check(path, cli.color),
        Commands::Test { path, filter } => commands::test(path, filter),
        Commands::Fmt { path } => commands::fmt(path),
        Commands::Pkg { action } => commands::pkg(action),
        Commands::Doc { path } => commands::doc(path),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).format_timestamp(None).init();
}
