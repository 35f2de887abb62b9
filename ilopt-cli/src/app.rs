use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ilopt::optimize::Mode;

/// ilopt - post-compilation optimizer for .NET CIL modules
#[derive(Debug, Parser)]
#[command(name = "ilopt", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Overwrite existing output files without asking.
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Strip the locals-init flag from methods proven definitely assigned.
    StripLocalsInit {
        /// Paths to the .NET assemblies to optimize.
        #[arg(value_name = "ASSEMBLY", required = true)]
        assemblies: Vec<PathBuf>,

        /// Which proofs to accept beyond direct assignments.
        #[arg(long, value_enum, default_value = "none")]
        mode: ModeArg,

        /// Only optimize methods whose Namespace.Type::Method name matches.
        #[arg(short, long, value_name = "REGEX")]
        filter: Option<String>,

        /// Directory the optimized assemblies are written to.
        #[arg(long, value_name = "DIR", default_value = "optimized")]
        output_dir: PathBuf,
    },
}

/// CLI spelling of the analysis modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Only direct writes count as assignments.
    None,
    /// Additionally trust `out` parameters.
    Out,
    /// Additionally tolerate `localloc` bodies.
    Stackalloc,
    /// `out` and `stackalloc` combined.
    Csharp,
    /// Strip every eligible method without analysis.
    All,
}

impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Mode {
        match value {
            ModeArg::None => Mode::None,
            ModeArg::Out => Mode::Out,
            ModeArg::Stackalloc => Mode::Stackalloc,
            ModeArg::Csharp => Mode::CSharp,
            ModeArg::All => Mode::All,
        }
    }
}
