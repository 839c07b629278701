//! Terminal progress UI, rendered via `indicatif` progress bars.
//!
//! Two bars are stacked vertically:
//! - Probe bar — how many commit rows have been filled, out of the range
//! - Status bar — spinner naming the commit currently being probed
//!
//! A probe can take minutes (configure, build, run), so the spinner keeps
//! ticking while the runner blocks. All output is coordinated through
//! `indicatif`'s `MultiProgress`.

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct MultisectUI {
    multi: MultiProgress,
    probe_bar: ProgressBar,
    status_bar: ProgressBar,
    verbose: bool,
}

impl MultisectUI {
    /// Create the UI sized to the commit range.
    pub fn new(total_commits: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let probe_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let probe_bar = multi.add(ProgressBar::new(total_commits));
        probe_bar.set_style(probe_style);
        probe_bar.set_prefix("Probed");

        let status_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let status_bar = multi.add(ProgressBar::new_spinner());
        status_bar.set_style(status_style);
        status_bar.set_prefix("Commit");

        Self {
            multi,
            probe_bar,
            status_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the
    /// rich UI fails, so messages are never silently lost.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Announce a probe starting at `index` and keep the spinner ticking
    /// while the runner blocks.
    pub fn probing(&self, index: usize, short_id: &str) {
        self.status_bar.set_message(format!(
            "probing {} {}",
            style(short_id).yellow(),
            style(format!("(position {index})")).dim()
        ));
        self.status_bar.enable_steady_tick(Duration::from_millis(100));
        if self.verbose {
            self.print_line(format!(
                "    {} probing {} at position {}",
                style("→").dim(),
                short_id,
                index
            ));
        }
    }

    /// Record another filled row on the probe bar.
    pub fn probed(&self, filled: u64) {
        self.probe_bar.set_position(filled);
    }

    /// Announce that one target's sequence validated.
    pub fn target_complete(&self, path: &str) {
        self.print_line(format!(
            "  {} {} multisected",
            style("✓").green(),
            style(path).cyan()
        ));
    }

    /// Verbose step line, shown only with `--verbose`.
    pub fn log_step(&self, msg: &str) {
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(msg).dim()));
        }
    }

    /// Tear the bars down and print the session tally.
    pub fn finish(&self, probes: usize, commits: usize) {
        self.status_bar.finish_and_clear();
        self.probe_bar.finish_and_clear();
        self.print_line(format!(
            "{} probed {} of {} commits",
            style("done").green().bold(),
            probes,
            commits
        ));
    }
}
