//! Full multisection — `multisect run`.

use anyhow::Result;

use multisect::driver::Multisector;
use multisect::report::TargetReport;
use multisect::runner::CommandRunner;

use crate::Cli;

pub fn cmd_run(cli: &Cli) -> Result<()> {
    let mut session = super::open_session(cli)?;
    let outcome = multisect_session(&mut session.driver);
    super::finish_session(&session, outcome)
}

fn multisect_session(driver: &mut Multisector<CommandRunner>) -> Result<Vec<TargetReport>> {
    driver.prepare()?;
    driver.multisect_all_targets()?;
    Ok(driver.inspect_transitions()?)
}
