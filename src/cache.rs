//! Probe memoization.
//!
//! The cache is an array of optional rows, one per commit position. A row
//! holds the probe results for every configured target at that commit, so a
//! row filled while servicing one target is immediately visible to all
//! others. Rows are filled at most once and never replaced; the runner is
//! invoked exactly once per position for the lifetime of the cache.

use crate::errors::DriverError;
use crate::range::CommitEntry;
use crate::runner::{ProbeRow, ProbeRunner, TargetProbe};

pub struct ProbeCache {
    rows: Vec<Option<ProbeRow>>,
    probes: usize,
}

impl ProbeCache {
    pub fn new(len: usize) -> Self {
        Self {
            rows: (0..len).map(|_| None).collect(),
            probes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether row `index` has been filled.
    pub fn filled(&self, index: usize) -> bool {
        self.rows.get(index).is_some_and(Option::is_some)
    }

    /// Number of filled rows.
    pub fn filled_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_some()).count()
    }

    /// Number of times the runner was actually invoked.
    pub fn probe_count(&self) -> usize {
        self.probes
    }

    /// Return row `index`, invoking the runner for `commit` if the row has
    /// never been filled. The runner runs at most once per index.
    pub fn ensure<R: ProbeRunner>(
        &mut self,
        index: usize,
        commit: &CommitEntry,
        runner: &mut R,
    ) -> Result<&ProbeRow, DriverError> {
        let len = self.rows.len();
        if index >= len {
            return Err(DriverError::IndexOutOfRange { index, len });
        }
        if self.rows[index].is_none() {
            let row = runner.probe(commit)?;
            self.probes += 1;
            self.rows[index] = Some(row);
        }
        Ok(self.rows[index]
            .as_ref()
            .expect("row filled by the branch above"))
    }

    pub fn row(&self, index: usize) -> Option<&ProbeRow> {
        self.rows.get(index)?.as_ref()
    }

    /// Sparse per-target projection: one slot per commit position, defined
    /// at exactly the filled indices. Borrows from the cache.
    pub fn view(&self, stub: &str) -> Vec<Option<&TargetProbe>> {
        self.rows
            .iter()
            .map(|row| row.as_ref().and_then(|r| r.get(stub)))
            .collect()
    }

    /// The digest recorded for `stub` at `index`, if that row is filled.
    pub fn digest_at(&self, index: usize, stub: &str) -> Option<&str> {
        self.rows
            .get(index)?
            .as_ref()?
            .get(stub)
            .map(|probe| probe.digest.as_str())
    }
}
