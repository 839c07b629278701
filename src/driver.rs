//! The multisection driver.
//!
//! For each target, the driver identifies every commit index `i` such that
//! `digest(i) != digest(i - 1)`, probing as few commits as it can. It keeps
//! one active window per target and bisects inside it; completion is decided
//! solely by the sequence validator, re-evaluated after every cache update,
//! which also makes a second pass over an already-finished session free.
//!
//! Targets share one probe cache and are scheduled round-robin, so rows
//! filled while hunting one target's transitions are cache hits for the
//! rest. A target never skips a probe because some other target finished;
//! only the cache decides whether the runner actually runs.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::ProbeCache;
use crate::errors::DriverError;
use crate::range::CommitRange;
use crate::report::{self, TargetReport};
use crate::runner::{ProbeRunner, TargetProbe};
use crate::sequence;
use crate::target::Target;
use crate::ui::MultisectUI;

/// One target's active search window: commit indices `lo..=hi`, both
/// already probed, bracketing the next unresolved transition if any.
#[derive(Debug, Clone, Copy)]
struct Window {
    lo: usize,
    hi: usize,
}

pub struct Multisector<R: ProbeRunner> {
    range: CommitRange,
    targets: Vec<Target>,
    runner: R,
    cache: ProbeCache,
    windows: Vec<Window>,
    done: Vec<bool>,
    probes: Vec<usize>,
    prepared: bool,
    ui: Option<Arc<MultisectUI>>,
}

impl<R: ProbeRunner> Multisector<R> {
    pub fn new(range: CommitRange, targets: Vec<Target>, runner: R) -> Self {
        let last = range.len() - 1;
        let count = targets.len();
        Self {
            range,
            targets,
            runner,
            cache: ProbeCache::new(last + 1),
            windows: vec![Window { lo: 0, hi: last }; count],
            done: vec![false; count],
            probes: vec![0; count],
            prepared: false,
            ui: None,
        }
    }

    pub fn with_ui(mut self, ui: Arc<MultisectUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn range(&self) -> &CommitRange {
        &self.range
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Total runner invocations so far. Bounded by the range length.
    pub fn probe_count(&self) -> usize {
        self.cache.probe_count()
    }

    pub fn is_complete(&self) -> bool {
        self.done.iter().all(|done| *done)
    }

    /// Probe the range endpoints. Every window evaluation needs both, so
    /// all other operations require this to have run.
    pub fn prepare(&mut self) -> Result<(), DriverError> {
        let last = self.range.len() - 1;
        self.fill(0)?;
        self.fill(last)?;
        self.prepared = true;
        Ok(())
    }

    /// Drive every target to a validated sequence. Round-robin across the
    /// incomplete targets, yielding back after each real probe so the
    /// shared cache spreads fresh rows across all of them.
    pub fn multisect_all_targets(&mut self) -> Result<(), DriverError> {
        if !self.prepared {
            return Err(DriverError::NotPrepared {
                operation: "multisect_all_targets",
            });
        }
        while !self.is_complete() {
            for t in 0..self.targets.len() {
                if self.done[t] {
                    continue;
                }
                self.advance(t)?;
            }
        }
        Ok(())
    }

    /// The visit-every-commit mode: fill every row, then let the validator
    /// flag whichever targets parse.
    pub fn sweep_all(&mut self) -> Result<(), DriverError> {
        if !self.prepared {
            return Err(DriverError::NotPrepared {
                operation: "sweep_all",
            });
        }
        for index in 1..self.range.len() - 1 {
            self.fill(index)?;
        }
        for t in 0..self.targets.len() {
            self.refresh(t);
        }
        Ok(())
    }

    /// Per target, the sparse projection of everything probed so far.
    pub fn multisected_outputs(
        &self,
    ) -> Result<Vec<(&Target, Vec<Option<&TargetProbe>>)>, DriverError> {
        if !self.prepared {
            return Err(DriverError::NotPrepared {
                operation: "multisected_outputs",
            });
        }
        Ok(self
            .targets
            .iter()
            .map(|target| (target, self.cache.view(&target.stub)))
            .collect())
    }

    /// Per target, the endpoints and the ordered transition list. Requires
    /// every target to have completed.
    pub fn inspect_transitions(&self) -> Result<Vec<TargetReport>, DriverError> {
        if !self.prepared {
            return Err(DriverError::NotPrepared {
                operation: "inspect_transitions",
            });
        }
        let mut reports = Vec::with_capacity(self.targets.len());
        for (t, target) in self.targets.iter().enumerate() {
            if !self.done[t] {
                return Err(DriverError::NotComplete {
                    target: target.path.clone(),
                });
            }
            let view = self.cache.view(&target.stub);
            let report = report::target_report(target, &view).ok_or_else(|| {
                DriverError::ValidatorDisagreement {
                    target: target.path.clone(),
                }
            })?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Advance one target until it completes or at least one fresh probe
    /// has been issued, then yield back to the scheduler.
    fn advance(&mut self, t: usize) -> Result<(), DriverError> {
        let last = self.range.len() - 1;
        loop {
            self.refresh(t);
            if self.done[t] {
                return Ok(());
            }

            let Window { lo, hi } = self.windows[t];
            if hi - lo <= 1 {
                // Adjacent endpoints hold zero or one transition; nothing
                // left to split here. Hunt beyond `hi`, or give up at the
                // right edge: a still-rejected sequence with no splittable
                // window cannot be completed by more probing.
                if hi >= last {
                    return Err(self.inconsistency(t));
                }
                self.windows[t] = Window { lo: hi, hi: last };
                continue;
            }

            let mid = (lo + hi) / 2;
            let probed_mid = self.probe_for(t, mid)?;
            if self.digests_equal(t, mid, lo) {
                // [lo, mid] can sit in one run; any transition is right of
                // mid.
                self.windows[t].lo = mid;
                if probed_mid {
                    return Ok(());
                }
                continue;
            }

            // At least one transition in (lo, mid]. Pin mid's left
            // neighbour to decide whether the boundary is exactly at mid.
            let probed_left = self.probe_for(t, mid - 1)?;
            if self.digests_equal(t, mid - 1, lo) {
                // Boundary found at (mid - 1, mid); hunt the next one to
                // the right.
                self.windows[t] = Window { lo: mid, hi: last };
            } else {
                self.windows[t].hi = mid;
            }
            if probed_mid || probed_left {
                return Ok(());
            }
        }
    }

    /// Re-run the validator for one target and latch completion. The flag
    /// is monotonic: once set it never clears.
    fn refresh(&mut self, t: usize) {
        if self.done[t] {
            return;
        }
        let digests = self.digest_view(t);
        if sequence::accepts(&digests) {
            self.done[t] = true;
            if let Some(ui) = &self.ui {
                ui.target_complete(&self.targets[t].path);
            }
        }
    }

    fn digest_view(&self, t: usize) -> Vec<Option<&str>> {
        let stub = &self.targets[t].stub;
        (0..self.range.len())
            .map(|index| self.cache.digest_at(index, stub))
            .collect()
    }

    fn digests_equal(&self, t: usize, a: usize, b: usize) -> bool {
        let stub = &self.targets[t].stub;
        match (self.cache.digest_at(a, stub), self.cache.digest_at(b, stub)) {
            (Some(da), Some(db)) => da == db,
            _ => false,
        }
    }

    /// Fill row `index` on behalf of target `t`, counting the probe against
    /// that target's budget. Returns whether the runner actually ran.
    fn probe_for(&mut self, t: usize, index: usize) -> Result<bool, DriverError> {
        if self.cache.filled(index) {
            return Ok(false);
        }
        self.probes[t] += 1;
        if self.probes[t] > self.range.len() {
            return Err(DriverError::ProbeBudgetExceeded {
                target: self.targets[t].path.clone(),
                probes: self.probes[t],
                limit: self.range.len(),
            });
        }
        self.fill(index)?;
        Ok(true)
    }

    fn fill(&mut self, index: usize) -> Result<(), DriverError> {
        if self.cache.filled(index) {
            return Ok(());
        }
        let commit = self
            .range
            .get(index)
            .ok_or(DriverError::IndexOutOfRange {
                index,
                len: self.range.len(),
            })?;
        if let Some(ui) = &self.ui {
            ui.probing(index, &commit.short);
        }
        self.cache.ensure(index, commit, &mut self.runner)?;
        if let Some(ui) = &self.ui {
            ui.probed(self.cache.filled_count() as u64);
        }
        Ok(())
    }

    /// A target's window is fully resolved yet its sequence still fails
    /// validation. The one non-bug cause is a digest value resurfacing in a
    /// later run, which the run grammar rules out.
    fn inconsistency(&self, t: usize) -> DriverError {
        let target = self.targets[t].path.clone();
        let stub = &self.targets[t].stub;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current: Option<&str> = None;
        for index in 0..self.range.len() {
            let Some(digest) = self.cache.digest_at(index, stub) else {
                continue;
            };
            if current == Some(digest) {
                continue;
            }
            current = Some(digest);
            if !seen.insert(digest) {
                return DriverError::DigestRecurrence {
                    target,
                    digest: digest.to_string(),
                };
            }
        }
        DriverError::ValidatorDisagreement { target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProbeError;
    use crate::range::CommitEntry;
    use crate::runner::ProbeRow;
    use crate::sequence;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Replays fixed digest sequences instead of running commands, and
    /// remembers which commit indices were actually probed.
    struct ScriptedRunner {
        scripts: Vec<(Target, Vec<String>)>,
        index_of: HashMap<String, usize>,
        calls: Vec<usize>,
    }

    impl ScriptedRunner {
        fn new(range: &CommitRange, scripts: &[(&str, &str)]) -> Self {
            let index_of = range
                .iter()
                .enumerate()
                .map(|(i, commit)| (commit.id.clone(), i))
                .collect();
            let scripts = scripts
                .iter()
                .map(|(path, digests)| {
                    assert_eq!(digests.len(), range.len());
                    let digests = digests.chars().map(String::from).collect();
                    (Target::new(path), digests)
                })
                .collect();
            Self {
                scripts,
                index_of,
                calls: Vec::new(),
            }
        }
    }

    impl ProbeRunner for ScriptedRunner {
        fn probe(&mut self, commit: &CommitEntry) -> Result<ProbeRow, ProbeError> {
            let index = self.index_of[&commit.id];
            self.calls.push(index);
            let mut row = ProbeRow::new();
            for (target, digests) in &self.scripts {
                row.insert(
                    target.stub.clone(),
                    TargetProbe {
                        commit_id: commit.id.clone(),
                        short_id: commit.short.clone(),
                        output_path: PathBuf::from(format!(
                            "{}.{}.out",
                            commit.short, target.stub
                        )),
                        digest: digests[index].clone(),
                        stub: target.stub.clone(),
                    },
                );
            }
            Ok(row)
        }
    }

    fn synthetic_range(len: usize) -> CommitRange {
        let commits = (0..len)
            .map(|i| CommitEntry {
                id: format!("{i:040x}"),
                short: format!("{i:012x}"),
            })
            .collect();
        CommitRange::new(commits).unwrap()
    }

    fn multisect(scripts: &[(&str, &str)]) -> Multisector<ScriptedRunner> {
        let len = scripts[0].1.len();
        let range = synthetic_range(len);
        let runner = ScriptedRunner::new(&range, scripts);
        let targets = scripts.iter().map(|(path, _)| Target::new(path)).collect();
        let mut driver = Multisector::new(range, targets, runner);
        driver.prepare().unwrap();
        driver.multisect_all_targets().unwrap();
        driver
    }

    fn transition_indices(report: &TargetReport) -> Vec<(usize, usize)> {
        report
            .transitions
            .iter()
            .map(|tr| (tr.older.index, tr.newer.index))
            .collect()
    }

    fn sorted_calls(driver: &Multisector<ScriptedRunner>) -> Vec<usize> {
        let mut calls = driver.runner().calls.clone();
        calls.sort_unstable();
        calls
    }

    #[test]
    fn uniform_range_needs_only_the_endpoints() {
        let driver = multisect(&[("t.sh", "AAAAAAAAAA")]);
        assert_eq!(sorted_calls(&driver), vec![0, 9]);
        let report = &driver.inspect_transitions().unwrap()[0];
        assert!(report.transitions.is_empty());
        assert_eq!(report.oldest.digest, report.newest.digest);
    }

    #[test]
    fn single_transition_at_the_midpoint() {
        let driver = multisect(&[("t.sh", "AAAAABBBBB")]);
        let report = &driver.inspect_transitions().unwrap()[0];
        assert_eq!(transition_indices(report), vec![(4, 5)]);
        assert_eq!(sorted_calls(&driver), vec![0, 4, 5, 6, 9]);
    }

    #[test]
    fn single_transition_off_center() {
        let driver = multisect(&[("t.sh", "AABBBBBBBB")]);
        let report = &driver.inspect_transitions().unwrap()[0];
        assert_eq!(transition_indices(report), vec![(1, 2)]);
        assert_eq!(sorted_calls(&driver), vec![0, 1, 2, 3, 4, 9]);
    }

    #[test]
    fn two_transitions_found_in_order() {
        let driver = multisect(&[("t.sh", "AAABBBBCCC")]);
        let report = &driver.inspect_transitions().unwrap()[0];
        assert_eq!(transition_indices(report), vec![(2, 3), (6, 7)]);
        assert_eq!(sorted_calls(&driver), vec![0, 2, 3, 4, 6, 7, 9]);
    }

    #[test]
    fn adjacent_transitions_keep_all_three_digests() {
        let driver = multisect(&[("t.sh", "AAAABCCCCC")]);
        let report = &driver.inspect_transitions().unwrap()[0];
        assert_eq!(transition_indices(report), vec![(3, 4), (4, 5)]);
        assert_eq!(report.transitions[0].older.digest, "A");
        assert_eq!(report.transitions[0].newer.digest, "B");
        assert_eq!(report.transitions[1].older.digest, "B");
        assert_eq!(report.transitions[1].newer.digest, "C");
    }

    #[test]
    fn no_commit_is_probed_twice() {
        let driver = multisect(&[("t.sh", "AAABBBBBCC")]);
        let calls = &driver.runner().calls;
        let unique: HashSet<usize> = calls.iter().copied().collect();
        assert_eq!(unique.len(), calls.len());
        assert!(calls.len() <= 10);
    }

    #[test]
    fn second_target_rides_the_shared_cache() {
        let solo = multisect(&[("one.sh", "AAABBBBBCC")]);
        let dual = multisect(&[("one.sh", "AAABBBBBCC"), ("two.sh", "AAABBBBBCC")]);
        assert!(dual.is_complete());
        assert_eq!(dual.probe_count(), solo.probe_count());
        let reports = dual.inspect_transitions().unwrap();
        assert_eq!(
            transition_indices(&reports[0]),
            transition_indices(&reports[1])
        );
    }

    #[test]
    fn differing_targets_share_probes_through_one_cache() {
        let driver = multisect(&[("one.sh", "AAAAABBBBB"), ("two.sh", "CCDDDDDDDD")]);
        let reports = driver.inspect_transitions().unwrap();
        assert_eq!(transition_indices(&reports[0]), vec![(4, 5)]);
        assert_eq!(transition_indices(&reports[1]), vec![(1, 2)]);
        // One runner call per filled row, regardless of target count.
        let calls = &driver.runner().calls;
        let unique: HashSet<usize> = calls.iter().copied().collect();
        assert_eq!(unique.len(), calls.len());
    }

    #[test]
    fn completed_views_revalidate() {
        let driver = multisect(&[("t.sh", "AAABBBBCCC")]);
        for (_, view) in driver.multisected_outputs().unwrap() {
            let digests: Vec<Option<&str>> = view
                .iter()
                .map(|slot| slot.map(|probe| probe.digest.as_str()))
                .collect();
            assert!(sequence::accepts(&digests));
        }
    }

    #[test]
    fn transitions_are_strictly_increasing() {
        let driver = multisect(&[("t.sh", "ABBCCCDDDD")]);
        let report = &driver.inspect_transitions().unwrap()[0];
        let indices = transition_indices(report);
        for pair in indices.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn rerunning_a_complete_session_probes_nothing() {
        let mut driver = multisect(&[("t.sh", "AAAAABBBBB")]);
        let before = driver.probe_count();
        driver.multisect_all_targets().unwrap();
        assert_eq!(driver.probe_count(), before);
    }

    #[test]
    fn endpoints_are_always_filled_at_completion() {
        let driver = multisect(&[("t.sh", "AAAAABBBBB")]);
        let outputs = driver.multisected_outputs().unwrap();
        let (_, view) = &outputs[0];
        assert!(view[0].is_some());
        assert!(view[9].is_some());
    }

    #[test]
    fn multisect_before_prepare_is_a_usage_error() {
        let range = synthetic_range(4);
        let runner = ScriptedRunner::new(&range, &[("t.sh", "AAAA")]);
        let mut driver = Multisector::new(range, vec![Target::new("t.sh")], runner);
        let err = driver.multisect_all_targets().unwrap_err();
        assert!(matches!(err, DriverError::NotPrepared { .. }));
    }

    #[test]
    fn inspect_before_completion_is_a_usage_error() {
        let range = synthetic_range(10);
        let runner = ScriptedRunner::new(&range, &[("t.sh", "AAAAABBBBB")]);
        let mut driver = Multisector::new(range, vec![Target::new("t.sh")], runner);
        driver.prepare().unwrap();
        let err = driver.inspect_transitions().unwrap_err();
        assert!(matches!(err, DriverError::NotComplete { .. }));
    }

    #[test]
    fn digest_recurrence_aborts_the_session() {
        let range = synthetic_range(4);
        let runner = ScriptedRunner::new(&range, &[("t.sh", "ABAC")]);
        let mut driver = Multisector::new(range, vec![Target::new("t.sh")], runner);
        driver.prepare().unwrap();
        let err = driver.multisect_all_targets().unwrap_err();
        match err {
            DriverError::DigestRecurrence { digest, .. } => assert_eq!(digest, "A"),
            other => panic!("expected DigestRecurrence, got {other:?}"),
        }
    }

    #[test]
    fn sweep_fills_every_row() {
        let range = synthetic_range(6);
        let runner = ScriptedRunner::new(&range, &[("t.sh", "AABBBC")]);
        let mut driver = Multisector::new(range, vec![Target::new("t.sh")], runner);
        driver.prepare().unwrap();
        driver.sweep_all().unwrap();
        assert_eq!(driver.probe_count(), 6);
        assert!(driver.is_complete());
        let report = &driver.inspect_transitions().unwrap()[0];
        assert_eq!(transition_indices(report), vec![(1, 2), (4, 5)]);
    }
}
