//! `test` subcommand: select drives, supervise one worker per drive, report.

use crate::progress::{status_line, ConsoleSections};
use anyhow::{Context, Result};
use clap::CommandFactory;
use drive_core::cli::Cli;
use drive_core::config::Config;
use drive_core::discovery::{discover_drives, select_drives, system_drives};
use drive_core::events::{EventBus, LogSubscriber, RunEvent};
use drive_core::notify::MattermostWebHook;
use drive_core::report::{render_report, REPORT_HEADER};
use drive_core::supervisor::{NoProgress, ProcessLauncher, ProgressView, Supervisor};
use drive_core::{StatusCache, TesterError};
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestArgs {
    pub auto_detect: bool,
    pub force_ssd_writes: bool,
    pub drives: Vec<String>,
}

pub fn run(config: &Config, config_path: Option<&Path>, args: &TestArgs) -> Result<i32> {
    let drives = match resolve_drives(config, args)? {
        Ok(drives) => drives,
        Err(TesterError::NoDrives) => {
            print_test_help();
            return Ok(TesterError::NoDrives.exit_code());
        }
        Err(e) => {
            eprintln!("{e}");
            return Ok(e.exit_code());
        }
    };
    log::info!("Drives selected for testing: {:?}", drives);

    let cache = match StatusCache::create(&config.cache_dir, config.cache_slots) {
        Ok(cache) => cache,
        Err(e) => {
            let err = TesterError::from(e);
            log::error!("{}", err);
            eprintln!("{err}");
            return Ok(err.exit_code());
        }
    };

    let launcher = ProcessLauncher::current_exe()
        .context("cannot locate the drive-tester executable")?
        .with_config(config_path.map(Path::to_path_buf))
        .with_force_ssd_writes(args.force_ssd_writes);
    let supervisor = Supervisor::new(launcher, &cache).with_poll_interval(config.poll_interval());

    let interactive = std::io::stdout().is_terminal();
    let results = if interactive {
        println!("{REPORT_HEADER}");
        let mut view = ConsoleSections::new(std::io::stdout());
        supervise(&supervisor, &drives, &mut view)
    } else {
        supervise(&supervisor, &drives, &mut NoProgress)
    };
    let results = match results {
        Ok(results) => results,
        Err(e) => {
            eprintln!("{e}");
            return Ok(e.exit_code());
        }
    };

    if !interactive {
        print!("{}", render_report(&results));
    }
    for (device, status) in &results {
        log::info!("{}", status_line(device, status, false));
    }

    run_event_bus(config).publish_run(&RunEvent { results });
    Ok(0)
}

fn supervise(
    supervisor: &Supervisor<'_, ProcessLauncher>,
    drives: &[String],
    view: &mut dyn ProgressView,
) -> Result<BTreeMap<String, drive_core::Status>, TesterError> {
    supervisor.run_all(drives, view)
}

/// Outer `Result` for I/O trouble while probing, inner for the run-level verdict.
fn resolve_drives(config: &Config, args: &TestArgs) -> Result<Result<Vec<String>, TesterError>> {
    let system = system_drives(&config.mountinfo_path)?;
    let discovered: Vec<String> = if args.auto_detect {
        discover_drives(&config.sys_block_dir)?
            .into_iter()
            .map(|d| d.dev_path.display().to_string())
            .collect()
    } else {
        Vec::new()
    };
    Ok(select_drives(
        &args.drives,
        args.auto_detect,
        &discovered,
        &system,
        |p| p.exists(),
    ))
}

fn run_event_bus(config: &Config) -> EventBus {
    let mut bus = EventBus::new().with(Arc::new(LogSubscriber));
    if let Some(url) = config.webhook_url() {
        match MattermostWebHook::new(url) {
            Ok(hook) => bus.subscribe(Arc::new(hook)),
            Err(e) => log::warn!("Mattermost notification disabled: {:#}", e),
        }
    }
    bus
}

fn print_test_help() {
    let mut cmd = Cli::command();
    if let Some(test) = cmd.find_subcommand_mut("test") {
        let _ = test.print_help();
        println!();
    }
}
