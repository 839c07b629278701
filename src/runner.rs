//! The probe runner port and its command-driven implementation.
//!
//! A probe checks out one commit, runs the configured commands, and
//! captures what they print. The capture is digested after normalization;
//! the raw bytes land in the output directory so a human can diff the two
//! sides of a transition later.

use git2::Repository;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use crate::config::Config;
use crate::errors::{ConfigError, ProbeError};
use crate::normalize::{Normalizer, content_digest};
use crate::range::CommitEntry;
use crate::target::Target;

/// The observation recorded for one target at one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetProbe {
    pub commit_id: String,
    pub short_id: String,
    pub output_path: PathBuf,
    pub digest: String,
    pub stub: String,
}

/// All observations for one commit, keyed by target stub. A row is either
/// entirely present (every configured target) or entirely absent.
pub type ProbeRow = HashMap<String, TargetProbe>;

/// Port the multisection driver probes through. Implementations must be
/// deterministic per commit: probing the same commit twice yields the same
/// digests.
pub trait ProbeRunner {
    fn probe(&mut self, commit: &CommitEntry) -> Result<ProbeRow, ProbeError>;
}

/// What kind of output a session observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// Run a test command per target and observe its output.
    TestOutput,
    /// Observe the make command's own output under the implicit `build`
    /// target.
    BuildOutput,
}

/// Placeholder in a test command replaced by the target path.
const TARGET_PLACEHOLDER: &str = "{}";

/// Runs real commands against a real working tree.
///
/// Per probe: force-checkout the commit (detached), run the preparation
/// commands (fatal on failure — no trustworthy capture can exist without
/// them), then capture the observed command per target. `restore` puts the
/// working tree back on the session branch and is safe to call whether or
/// not any probe ran.
pub struct CommandRunner {
    repo: Repository,
    workdir: PathBuf,
    outputdir: PathBuf,
    mode: ProbeMode,
    targets: Vec<Target>,
    prep_commands: Vec<String>,
    observe_command: String,
    restore_branch: Option<String>,
    normalizer: Normalizer,
}

impl CommandRunner {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let repo = Repository::open(&config.repository)?;

        let restore_branch = match &config.branch {
            Some(branch) => Some(branch.clone()),
            None => repo
                .head()
                .ok()
                .filter(|head| head.is_branch())
                .and_then(|head| head.shorthand().map(str::to_string)),
        };

        let (prep_commands, observe_command) = match config.mode {
            ProbeMode::TestOutput => {
                let prep = [&config.configure_command, &config.make_command]
                    .into_iter()
                    .flatten()
                    .cloned()
                    .collect();
                let observe = config
                    .test_command
                    .clone()
                    .ok_or(ConfigError::MissingTestCommand)?;
                (prep, observe)
            }
            ProbeMode::BuildOutput => {
                let prep = config.configure_command.iter().cloned().collect();
                let observe = config
                    .make_command
                    .clone()
                    .ok_or(ConfigError::MissingMakeCommand)?;
                (prep, observe)
            }
        };

        Ok(Self {
            repo,
            workdir: config.workdir.clone(),
            outputdir: config.outputdir.clone(),
            mode: config.mode,
            targets: config.targets.clone(),
            prep_commands,
            observe_command,
            restore_branch,
            normalizer: Normalizer::default(),
        })
    }

    /// Re-attach HEAD to the session branch and check it out. A no-op when
    /// the session started from a detached HEAD with no `--branch` given.
    pub fn restore(&self) -> Result<(), ProbeError> {
        let Some(branch) = &self.restore_branch else {
            return Ok(());
        };
        self.repo.set_head(&format!("refs/heads/{branch}"))?;
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        self.repo.checkout_head(Some(&mut checkout))?;
        Ok(())
    }

    fn checkout(&self, commit: &CommitEntry) -> Result<(), ProbeError> {
        let err = |source: git2::Error| ProbeError::Checkout {
            commit: commit.short.clone(),
            source,
        };
        let oid = git2::Oid::from_str(&commit.id).map_err(err)?;
        let object = self.repo.find_object(oid, None).map_err(err)?;
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();
        self.repo.checkout_tree(&object, Some(&mut checkout)).map_err(err)?;
        self.repo.set_head_detached(oid).map_err(err)?;
        Ok(())
    }

    fn shell(&self, command: &str) -> Result<Output, ProbeError> {
        Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .output()
            .map_err(|source| ProbeError::SpawnFailed {
                command: command.to_string(),
                source,
            })
    }

    fn run_fatal(&self, command: &str, commit: &CommitEntry) -> Result<(), ProbeError> {
        let output = self.shell(command)?;
        if !output.status.success() {
            return Err(ProbeError::CommandFailed {
                command: command.to_string(),
                commit: commit.short.clone(),
                code: output.status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }

    /// Run a command and fold its streams and exit status into one capture.
    /// The exit status is data, not an error: a command that starts crashing
    /// is exactly the kind of transition a session exists to find.
    fn run_capture(&self, command: &str) -> Result<String, ProbeError> {
        let output = self.shell(command)?;
        let mut capture = String::new();
        capture.push_str(&String::from_utf8_lossy(&output.stdout));
        capture.push_str(&String::from_utf8_lossy(&output.stderr));
        capture.push_str(&format!("exit: {}\n", output.status.code().unwrap_or(-1)));
        Ok(capture)
    }

    fn observe_command_for(&self, target: &Target) -> String {
        match self.mode {
            ProbeMode::TestOutput => {
                if self.observe_command.contains(TARGET_PLACEHOLDER) {
                    self.observe_command.replace(TARGET_PLACEHOLDER, &target.path)
                } else {
                    format!("{} {}", self.observe_command, target.path)
                }
            }
            ProbeMode::BuildOutput => self.observe_command.clone(),
        }
    }

    fn record(
        &self,
        commit: &CommitEntry,
        target: &Target,
        capture: &str,
    ) -> Result<TargetProbe, ProbeError> {
        let digest = content_digest(&self.normalizer.normalize(capture));
        let output_path = self
            .outputdir
            .join(format!("{}.{}.out", commit.short, target.stub));
        fs::write(&output_path, capture).map_err(|source| ProbeError::ArtifactWrite {
            path: output_path.clone(),
            source,
        })?;
        Ok(TargetProbe {
            commit_id: commit.id.clone(),
            short_id: commit.short.clone(),
            output_path,
            digest,
            stub: target.stub.clone(),
        })
    }
}

impl ProbeRunner for CommandRunner {
    fn probe(&mut self, commit: &CommitEntry) -> Result<ProbeRow, ProbeError> {
        self.checkout(commit)?;
        for command in &self.prep_commands {
            self.run_fatal(command, commit)?;
        }
        let mut row = ProbeRow::new();
        for target in &self.targets {
            let command = self.observe_command_for(target);
            let capture = self.run_capture(&command)?;
            let probe = self.record(commit, target, &capture)?;
            row.insert(target.stub.clone(), probe);
        }
        Ok(row)
    }
}
