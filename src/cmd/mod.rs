//! CLI command implementations.
//!
//! | Module  | Commands handled |
//! |---------|------------------|
//! | `run`   | `Run`            |
//! | `sweep` | `Sweep`          |

pub mod run;
pub mod sweep;

pub use run::cmd_run;
pub use sweep::cmd_sweep;

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;

use multisect::config::{Config, ConfigOptions};
use multisect::driver::Multisector;
use multisect::range;
use multisect::report::{self, SessionReport, TargetReport};
use multisect::runner::CommandRunner;
use multisect::ui::MultisectUI;

use super::Cli;

pub(crate) fn build_config(cli: &Cli) -> Result<Config> {
    let config = Config::new(ConfigOptions {
        repository: cli.repository.clone(),
        workdir: cli.workdir.clone(),
        outputdir: cli.outputdir.clone(),
        branch: cli.branch.clone(),
        first: cli.first.clone(),
        last_before: cli.last_before.clone(),
        last: cli.last.clone(),
        short: cli.short,
        targets: cli.target.clone(),
        build: cli.build,
        configure_command: cli.configure_command.clone(),
        make_command: cli.make_command.clone(),
        test_command: cli.test_command.clone(),
        verbose: cli.verbose,
        quiet: cli.quiet,
        json: cli.json.clone(),
    })?;
    config.ensure_directories()?;
    Ok(config)
}

/// Everything a command needs to drive a session.
pub(crate) struct Session {
    pub config: Config,
    pub driver: Multisector<CommandRunner>,
    pub ui: Option<Arc<MultisectUI>>,
}

pub(crate) fn open_session(cli: &Cli) -> Result<Session> {
    let config = build_config(cli)?;
    let repo = git2::Repository::open(&config.repository).with_context(|| {
        format!(
            "Failed to open repository at {}",
            config.repository.display()
        )
    })?;
    let range = range::enumerate(&repo, &config.endpoints, config.short_len)?;
    let runner = CommandRunner::new(&config)?;
    let mut driver = Multisector::new(range, config.targets.clone(), runner);

    let ui = if config.quiet {
        None
    } else {
        Some(Arc::new(MultisectUI::new(
            driver.range().len() as u64,
            config.verbose,
        )))
    };
    if let Some(ui) = &ui {
        driver = driver.with_ui(ui.clone());
    }

    Ok(Session { config, driver, ui })
}

/// Render the session report, write the JSON copy, and put the working tree
/// back on its branch. The session outcome wins over a restore failure.
pub(crate) fn finish_session(
    session: &Session,
    outcome: Result<Vec<TargetReport>>,
) -> Result<()> {
    let restored = session
        .driver
        .runner()
        .restore()
        .context("Failed to restore the session branch");
    let targets = outcome?;
    restored?;

    if let Some(ui) = &session.ui {
        ui.finish(session.driver.probe_count(), session.driver.range().len());
    }

    let report = SessionReport {
        generated_at: Utc::now(),
        repository: session.config.repository.clone(),
        base: session.config.endpoints.base().to_string(),
        last: session.config.endpoints.last().to_string(),
        commit_count: session.driver.range().len(),
        probe_count: session.driver.probe_count(),
        targets,
    };
    report::render(&report);

    let json_path = session.config.json_report_path();
    report::save_json(&report, &json_path)?;
    println!("Report written to {}", json_path.display());
    Ok(())
}
