//! Observation targets and their filesystem-safe stubs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::ConfigError;

/// A named command whose output is observed at each probed commit.
///
/// `stub` is a filesystem-safe rewrite of `path` used as the cache key and
/// in artifact filenames: every `/` and `.` becomes `_`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub path: String,
    pub stub: String,
}

impl Target {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            stub: stub_for(path),
        }
    }

    /// The single implicit target used when watching build output.
    pub fn build() -> Self {
        Self {
            path: "build".to_string(),
            stub: "build".to_string(),
        }
    }
}

/// Rewrite a target path into its stub.
pub fn stub_for(path: &str) -> String {
    path.chars()
        .map(|c| if c == '/' || c == '.' { '_' } else { c })
        .collect()
}

/// Build the ordered target list from raw paths, rejecting duplicate stubs.
///
/// Distinct paths can collapse to the same stub (`a/b.c` and `a.b/c`), and a
/// session keyed by stubs cannot tell them apart, so duplicates are refused
/// up front.
pub fn build_target_set(paths: &[String]) -> Result<Vec<Target>, ConfigError> {
    if paths.is_empty() {
        return Err(ConfigError::NoTargets);
    }
    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(paths.len());
    for path in paths {
        let target = Target::new(path);
        if !seen.insert(target.stub.clone()) {
            return Err(ConfigError::DuplicateStub {
                stub: target.stub,
                path: path.clone(),
            });
        }
        targets.push(target);
    }
    Ok(targets)
}
