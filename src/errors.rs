//! Typed error hierarchy for the multisect engine.
//!
//! Three enums cover the three failure domains:
//! - `ConfigError` — bad input caught before any probe runs
//! - `ProbeError` — the external runner failed; fatal to the session
//! - `DriverError` — misuse of the driver API, or an internal invariant
//!   breach that signals a bug (or a broken monotonicity assumption), never
//!   bad user input
//!
//! Nothing is retried internally and partial results are not surfaced: a
//! session either runs to completion or aborts in its entirety.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while assembling and validating the session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("repository {path} does not exist or is not a directory")]
    MissingRepository { path: PathBuf },

    #[error("workdir {path} does not exist or is not a directory")]
    MissingWorkdir { path: PathBuf },

    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("--last is required")]
    MissingLast,

    #[error("exactly one of --first and --last-before must be given")]
    EndpointFlags,

    #[error("no targets configured; pass --target at least once")]
    NoTargets,

    #[error("--build and --target are mutually exclusive")]
    TargetsForbidden,

    #[error("--test-command is required unless --build is set")]
    MissingTestCommand,

    #[error("--make-command is required with --build")]
    MissingMakeCommand,

    #[error("duplicate target stub {stub} (from {path})")]
    DuplicateStub { stub: String, path: String },

    #[error("commit range contains {count} commit(s); need at least 2")]
    RangeTooSmall { count: usize },

    #[error("{last} does not descend from {base}")]
    DisjointEndpoints { base: String, last: String },

    #[error(transparent)]
    Git(#[from] git2::Error),
}

/// Errors from the external probe runner. Any missing row may be exactly
/// the one needed to resolve a boundary, so these abort the session.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code} at commit {commit}")]
    CommandFailed {
        command: String,
        commit: String,
        code: i32,
    },

    #[error("failed to check out commit {commit}: {source}")]
    Checkout {
        commit: String,
        #[source]
        source: git2::Error,
    },

    #[error("failed to write artifact {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Git(#[from] git2::Error),
}

/// Errors from the multisection driver itself.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("prepare() must run before {operation}")]
    NotPrepared { operation: &'static str },

    #[error("target {target} has not completed multisection")]
    NotComplete { target: String },

    #[error("probe index {index} out of range for {len} commits")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("probe budget exceeded for target {target}: {probes} probes across {limit} commits")]
    ProbeBudgetExceeded {
        target: String,
        probes: usize,
        limit: usize,
    },

    #[error(
        "digest {digest} recurs in a later run for target {target}; \
         output does not move monotonically across the range"
    )]
    DigestRecurrence { target: String, digest: String },

    #[error("sequence validation rejected a fully resolved range for target {target}")]
    ValidatorDisagreement { target: String },

    #[error(transparent)]
    Probe(#[from] ProbeError),
}
