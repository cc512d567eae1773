use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fileflow")]
#[command(about = "Sorts downloads into folders by type and content", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the per-user config location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Organize every file in the source folders once
    Organize {
        /// Source folder; repeatable. Defaults to the configured sources.
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
        /// Put every category below this folder instead
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Re-check sensitivity of already organized media
    Reorganize {
        /// Folders to re-check. Defaults to the split category folders.
        dirs: Vec<PathBuf>,
    },
    /// Organize one file
    Single {
        path: PathBuf,
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Watch the source folders until Ctrl-C
    Watch {
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
    },
    /// Print the effective configuration
    PrintConfig,
}
