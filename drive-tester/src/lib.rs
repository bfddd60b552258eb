use clap::Parser;
use drive_core::cli::{Cli, Command};
use drive_core::config::Config;

pub mod list_cmd;
pub mod progress;
pub mod test_cmd;
pub mod worker_cmd;

/// Parse the command line, run the selected command and return the exit code.
pub fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    drive_core::logging::init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Test {
            auto_detect,
            force_ssd_writes,
            drives,
        } => {
            log::info!("🧪 Testing drives: {:?} (auto-detect: {})", drives, auto_detect);
            test_cmd::run(
                &config,
                cli.config.as_deref(),
                &test_cmd::TestArgs {
                    auto_detect,
                    force_ssd_writes,
                    drives,
                },
            )
        }
        Command::List => list_cmd::run(&config),
        Command::Worker {
            cache,
            force_ssd_writes,
            device,
        } => worker_cmd::run(&config, &cache, force_ssd_writes, &device),
    }
}
