//! Command line argument parsing

use crate::models::{ChipVariant, RestoreMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "m3rula")]
#[command(about = "Guided turdusra1n / turdus_merula restores for A9 and A10 devices")]
pub struct Cli {
    /// Project directory holding project.json and the produced artifacts
    #[arg(short = 'p', long = "project", global = true, value_name = "PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease logging verbosity (only errors)
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to <config dir>/m3rula/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Restore mode; not stored in the project
    #[arg(short = 'm', long, global = true, value_enum, default_value_t = RestoreMode::Tethered)]
    pub mode: RestoreMode,

    /// Path to the turdusra1n binary
    #[arg(long, global = true, value_name = "PATH")]
    pub rain: Option<PathBuf>,

    /// Path to the turdus_merula binary
    #[arg(long, global = true, value_name = "PATH")]
    pub merula: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Commands {
    /// Create a new project directory
    Create {
        /// Parent directory (defaults to the current directory)
        #[arg(long)]
        parent: Option<PathBuf>,
        /// Directory name (defaults to <CHIP>_<MODE>_<timestamp>)
        #[arg(short, long)]
        name: Option<String>,
        /// Chip variant recorded in the new project
        #[arg(short, long, value_enum)]
        chip: Option<ChipVariant>,
    },
    /// Show project inputs, step progress and files
    Status,
    /// Select the IPSW firmware image
    Ipsw {
        /// Path to the .ipsw file
        path: PathBuf,
    },
    /// Select the SHSH signing blob and extract its generator
    Blob {
        /// Path to the .shsh / .shsh2 file
        path: PathBuf,
    },
    /// Switch the project's chip variant
    Chip {
        #[arg(value_enum)]
        chip: ChipVariant,
    },
    /// Run one step of the pipeline, then prompt for the next action
    Run {
        /// 1-based step number (defaults to the next pending step)
        #[arg(short, long)]
        step: Option<usize>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
