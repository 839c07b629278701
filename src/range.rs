//! Commit-range enumeration.
//!
//! The engine works over a fixed, linearly ordered sequence of commits
//! enumerated once at session start. Endpoints are given either as
//! `(first, last)` — the range includes both — or as `(last_before, last)` —
//! the range is everything after `last_before` up to and including `last`.
//! Ordering is oldest to newest via a topologically sorted, reversed
//! revwalk, so merged side branches linearize deterministically.

use git2::{Oid, Repository, Sort};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// One commit position in the range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    /// Full hex object id.
    pub id: String,
    /// Prefix of `id` used in filenames and messages.
    pub short: String,
}

/// How the session's endpoints were specified.
#[derive(Debug, Clone)]
pub enum RangeSpec {
    /// `first..=last`, both included.
    Endpoints { first: String, last: String },
    /// `(last_before, last]`: everything after `last_before`.
    After { last_before: String, last: String },
}

impl RangeSpec {
    pub fn base(&self) -> &str {
        match self {
            RangeSpec::Endpoints { first, .. } => first,
            RangeSpec::After { last_before, .. } => last_before,
        }
    }

    pub fn last(&self) -> &str {
        match self {
            RangeSpec::Endpoints { last, .. } | RangeSpec::After { last, .. } => last,
        }
    }

    /// Whether the base commit itself belongs to the range.
    fn includes_base(&self) -> bool {
        matches!(self, RangeSpec::Endpoints { .. })
    }
}

/// The ordered commit sequence, oldest first. Always at least two entries.
#[derive(Debug, Clone)]
pub struct CommitRange {
    commits: Vec<CommitEntry>,
}

impl CommitRange {
    pub fn new(commits: Vec<CommitEntry>) -> Result<Self, ConfigError> {
        if commits.len() < 2 {
            return Err(ConfigError::RangeTooSmall {
                count: commits.len(),
            });
        }
        Ok(Self { commits })
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CommitEntry> {
        self.commits.get(index)
    }

    pub fn first(&self) -> &CommitEntry {
        &self.commits[0]
    }

    pub fn last(&self) -> &CommitEntry {
        &self.commits[self.commits.len() - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommitEntry> {
        self.commits.iter()
    }
}

/// Enumerate the commit range described by `spec`, oldest to newest.
pub fn enumerate(
    repo: &Repository,
    spec: &RangeSpec,
    short_len: usize,
) -> Result<CommitRange, ConfigError> {
    let base_oid = resolve(repo, spec.base())?;
    let last_oid = resolve(repo, spec.last())?;

    if base_oid == last_oid {
        return Err(ConfigError::RangeTooSmall {
            count: usize::from(spec.includes_base()),
        });
    }
    if !repo.graph_descendant_of(last_oid, base_oid)? {
        return Err(ConfigError::DisjointEndpoints {
            base: spec.base().to_string(),
            last: spec.last().to_string(),
        });
    }

    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
    walk.push(last_oid)?;
    walk.hide(base_oid)?;

    let mut oids: Vec<Oid> = Vec::new();
    if spec.includes_base() {
        oids.push(base_oid);
    }
    for oid in walk {
        oids.push(oid?);
    }

    let commits = oids
        .into_iter()
        .map(|oid| entry_for(oid, short_len))
        .collect();
    CommitRange::new(commits)
}

fn entry_for(oid: Oid, short_len: usize) -> CommitEntry {
    let id = oid.to_string();
    let short = id[..short_len.min(id.len())].to_string();
    CommitEntry { id, short }
}

fn resolve(repo: &Repository, rev: &str) -> Result<Oid, ConfigError> {
    Ok(repo.revparse_single(rev)?.peel_to_commit()?.id())
}
