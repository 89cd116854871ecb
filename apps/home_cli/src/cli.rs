//! Command-line surface, a `clap` derive
//! `Cli { command: Commands }` with one variant per compiler command
//! rather than a project-lifecycle command set.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "home", version, about = "The home compiler")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Force-enable or disable ANSI color in diagnostic output, overriding
    /// `NO_COLOR` and terminal detection.
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Print debug-level logging from every pipeline stage.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Always,
    Never,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OptLevelArg {
    #[value(name = "0")]
    O0,
    #[value(name = "1")]
    O1,
    #[value(name = "2")]
    O2,
    #[value(name = "3")]
    O3,
    #[value(name = "s")]
    Os,
}

impl From<OptLevelArg> for home_pass::OptLevel {
    fn from(level: OptLevelArg) -> Self {
        match level {
            OptLevelArg::O0 => home_pass::OptLevel::O0,
            OptLevelArg::O1 => home_pass::OptLevel::O1,
            OptLevelArg::O2 => home_pass::OptLevel::O2,
            OptLevelArg::O3 => home_pass::OptLevel::O3,
            OptLevelArg::Os => home_pass::OptLevel::Os,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmitArg {
    Object,
    Asm,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compiles the project (or a single file) to a native object/binary.
    Build {
        /// Source file or project directory; defaults to the current directory's `home.toml`.
        path: Option<PathBuf>,
        #[arg(short = 'O', long = "opt", value_enum, default_value_t = OptLevelArg::O0)]
        opt_level: OptLevelArg,
        /// Cross-compilation target triple; defaults to the host.
        #[arg(long)]
        target: Option<String>,
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = EmitArg::Object)]
        emit: EmitArg,
        #[arg(long)]
        no_cache: bool,
    },
    /// Compiles and runs a program, either natively or through the
    /// comptime-evaluator's tree-walking interpreter.
    Run {
        path: Option<PathBuf>,
        #[arg(short = 'O', long = "opt", value_enum, default_value_t = OptLevelArg::O0)]
        opt_level: OptLevelArg,
        /// Skip native codegen and run through `home-comptime` directly.
        #[arg(long)]
        interpret: bool,
        #[arg(long)]
        no_cache: bool,
    },
    /// Type-checks and borrow-checks without emitting an object.
    Check { path: Option<PathBuf> },
    /// Runs the project's test scripts.
    Test {
        path: Option<PathBuf>,
        /// Only run scripts whose name contains this substring.
        filter: Option<String>,
    },
    /// Formats source files in place. Not yet implemented; reformatting
    /// requires a pretty-printer this repository does not ship (tracked
    /// as an open item, see DESIGN.md).
    Fmt { path: Option<PathBuf> },
    /// Package management: fetch and resolve `[dependencies]`.
    Pkg {
        #[command(subcommand)]
        action: PkgAction,
    },
    /// Generates documentation from doc comments.
    Doc { path: Option<PathBuf> },
}

#[derive(Subcommand, Debug)]
pub enum PkgAction {
    /// Writes a starter `home.toml` and `src/main.home` in the given
    /// directory (current directory by default).
    Init { path: Option<PathBuf>, name: Option<String> },
    /// Adds (or updates) a `[dependencies]` entry in `home.toml`. Only
    /// edits the manifest; it does not fetch or resolve the dependency
    /// (spec §1 lists the package manager's download/archive logic as out
    /// of scope).
    Add { name: String, version: Option<String> },
    /// Downloads and resolves every `[dependencies]` entry. Not
    /// implemented: out of scope per spec §1.
    Install,
    /// Runs a named `[scripts]` entry from `home.toml`.
    Run { name: String },
    /// Prints the resolved dependency graph from `home.toml`.
    Tree,
}
