//! Exhaustive probing — `multisect sweep`.
//!
//! Visits every commit in the range. Unlike `run`, the report is derived
//! straight from the fully-populated views, so a range whose output
//! oscillates (and so can never validate as a multisection) still gets its
//! per-commit transition listing.

use anyhow::Result;

use multisect::driver::Multisector;
use multisect::report::{self, TargetReport};
use multisect::runner::CommandRunner;

use crate::Cli;

pub fn cmd_sweep(cli: &Cli) -> Result<()> {
    let mut session = super::open_session(cli)?;
    let outcome = sweep_session(&mut session.driver);
    super::finish_session(&session, outcome)
}

fn sweep_session(driver: &mut Multisector<CommandRunner>) -> Result<Vec<TargetReport>> {
    driver.prepare()?;
    driver.sweep_all()?;
    let mut targets = Vec::new();
    for (target, view) in driver.multisected_outputs()? {
        if let Some(target_report) = report::target_report(target, &view) {
            targets.push(target_report);
        }
    }
    Ok(targets)
}
