//! CLI argument parsing for drive-tester.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "drive-tester")]
#[command(version, about = "🩺 Parallel drive diagnostics (parted, smartctl, badblocks, fstrim)")]
pub struct Cli {
    /// Configuration file (default: $DRIVE_TESTER_CONFIG or /etc/drive-tester/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// 🧪 Run drive tester
    Test {
        /// Auto detect drives (without system drives)
        #[arg(short = 'a', long)]
        auto_detect: bool,

        /// Enable write test for SSDs
        #[arg(long)]
        force_ssd_writes: bool,

        /// Drive paths (e.g. /dev/sdb /dev/sdc)
        drives: Vec<String>,
    },

    /// 📋 List all detected drives
    List,

    /// Test one drive; started by `test` for every drive.
    #[command(hide = true)]
    Worker {
        /// Status cache file created by the supervisor
        #[arg(long)]
        cache: PathBuf,

        #[arg(long)]
        force_ssd_writes: bool,

        device: String,
    },
}
