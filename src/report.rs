//! Transition reports: structured values plus console rendering.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::runner::TargetProbe;
use crate::target::Target;

/// One side of a transition, or a range endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub index: usize,
    pub commit_id: String,
    pub short_id: String,
    pub digest: String,
    pub artifact: PathBuf,
}

impl EndpointRecord {
    fn new(index: usize, probe: &TargetProbe) -> Self {
        Self {
            index,
            commit_id: probe.commit_id.clone(),
            short_id: probe.short_id.clone(),
            digest: probe.digest.clone(),
            artifact: probe.output_path.clone(),
        }
    }
}

/// A detected output change between two probed commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub older: EndpointRecord,
    pub newer: EndpointRecord,
}

/// Everything observed for one target across the range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    pub target: String,
    pub stub: String,
    pub oldest: EndpointRecord,
    pub newest: EndpointRecord,
    pub transitions: Vec<TransitionRecord>,
}

/// The session-level report written to JSON and rendered to the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub generated_at: DateTime<Utc>,
    pub repository: PathBuf,
    pub base: String,
    pub last: String,
    pub commit_count: usize,
    pub probe_count: usize,
    pub targets: Vec<TargetReport>,
}

/// Derive one target's report from its sparse view.
///
/// Transitions pair *adjacent defined* indices with differing digests;
/// undefined positions in between are skipped, which is sound because a
/// validated sequence only leaves gaps inside a single run. Returns `None`
/// when either range endpoint is still unprobed.
pub fn target_report(target: &Target, view: &[Option<&TargetProbe>]) -> Option<TargetReport> {
    let n = view.len();
    if n == 0 {
        return None;
    }
    let oldest = EndpointRecord::new(0, view[0]?);
    let newest = EndpointRecord::new(n - 1, view[n - 1]?);

    let mut transitions = Vec::new();
    let mut previous: Option<(usize, &TargetProbe)> = None;
    for (index, slot) in view.iter().enumerate() {
        let Some(probe) = slot else { continue };
        if let Some((prev_index, prev_probe)) = previous {
            if prev_probe.digest != probe.digest {
                transitions.push(TransitionRecord {
                    older: EndpointRecord::new(prev_index, prev_probe),
                    newer: EndpointRecord::new(index, probe),
                });
            }
        }
        previous = Some((index, probe));
    }

    Some(TargetReport {
        target: target.path.clone(),
        stub: target.stub.clone(),
        oldest,
        newest,
        transitions,
    })
}

/// Render the report to stdout.
pub fn render(report: &SessionReport) {
    println!();
    println!(
        "{} {}..{} — {} commits, {} probed",
        style("Range").bold(),
        report.base,
        report.last,
        report.commit_count,
        report.probe_count
    );

    for target in &report.targets {
        println!();
        println!("{} {}", style("Target").bold().cyan(), target.target);
        println!(
            "  oldest  {} {}",
            target.oldest.short_id,
            style(short_digest(&target.oldest.digest)).dim()
        );
        println!(
            "  newest  {} {}",
            target.newest.short_id,
            style(short_digest(&target.newest.digest)).dim()
        );
        if target.transitions.is_empty() {
            println!("  {}", style("no transitions").green());
            continue;
        }
        for transition in &target.transitions {
            println!(
                "  {} {} {} -> {} {}",
                style("transition").yellow(),
                transition.older.short_id,
                style(short_digest(&transition.older.digest)).dim(),
                transition.newer.short_id,
                style(short_digest(&transition.newer.digest)).dim()
            );
        }
    }
    println!();
}

/// Write the report as pretty-printed JSON.
pub fn save_json(report: &SessionReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))
}

fn short_digest(digest: &str) -> &str {
    &digest[..digest.len().min(12)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(index: usize, digest: &str) -> TargetProbe {
        TargetProbe {
            commit_id: format!("{index:040x}"),
            short_id: format!("{index:012x}"),
            output_path: PathBuf::from(format!("{index:012x}.t_sh.out")),
            digest: digest.to_string(),
            stub: "t_sh".to_string(),
        }
    }

    #[test]
    fn report_pairs_adjacent_defined_indices() {
        let p0 = probe(0, "A");
        let p4 = probe(4, "A");
        let p5 = probe(5, "B");
        let p9 = probe(9, "B");
        let mut view: Vec<Option<&TargetProbe>> = vec![None; 10];
        view[0] = Some(&p0);
        view[4] = Some(&p4);
        view[5] = Some(&p5);
        view[9] = Some(&p9);

        let report = target_report(&Target::new("t.sh"), &view).unwrap();
        assert_eq!(report.oldest.index, 0);
        assert_eq!(report.newest.index, 9);
        assert_eq!(report.transitions.len(), 1);
        assert_eq!(report.transitions[0].older.index, 4);
        assert_eq!(report.transitions[0].newer.index, 5);
        assert_eq!(report.transitions[0].older.digest, "A");
        assert_eq!(report.transitions[0].newer.digest, "B");
    }

    #[test]
    fn report_requires_both_endpoints() {
        let p0 = probe(0, "A");
        let mut view: Vec<Option<&TargetProbe>> = vec![None; 4];
        view[0] = Some(&p0);
        assert!(target_report(&Target::new("t.sh"), &view).is_none());

        let p3 = probe(3, "A");
        view[3] = Some(&p3);
        assert!(target_report(&Target::new("t.sh"), &view).is_some());
    }

    #[test]
    fn report_with_no_change_has_no_transitions() {
        let p0 = probe(0, "A");
        let p3 = probe(3, "A");
        let mut view: Vec<Option<&TargetProbe>> = vec![None; 4];
        view[0] = Some(&p0);
        view[3] = Some(&p3);
        let report = target_report(&Target::new("t.sh"), &view).unwrap();
        assert!(report.transitions.is_empty());
        assert_eq!(report.oldest.digest, report.newest.digest);
    }

    #[test]
    fn session_report_round_trips_through_json() {
        let p0 = probe(0, "A");
        let p1 = probe(1, "B");
        let view: Vec<Option<&TargetProbe>> = vec![Some(&p0), Some(&p1)];
        let target = target_report(&Target::new("t.sh"), &view).unwrap();
        let report = SessionReport {
            generated_at: Utc::now(),
            repository: PathBuf::from("/repo"),
            base: "v1.0".to_string(),
            last: "main".to_string(),
            commit_count: 2,
            probe_count: 2,
            targets: vec![target],
        };
        let json = serde_json::to_string(&report).unwrap();
        let parsed: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.targets, report.targets);
        assert_eq!(parsed.probe_count, 2);
    }

    #[test]
    fn short_digest_truncates_long_hashes() {
        assert_eq!(short_digest("abcdef0123456789deadbeef"), "abcdef012345");
        assert_eq!(short_digest("abc"), "abc");
    }
}
