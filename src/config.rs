//! Runtime configuration for a multisect session.
//!
//! All user input is validated here, before any commit is probed: directory
//! existence, endpoint flags, mode consistency, and the target list. The
//! rest of the engine can then assume a well-formed session.

use std::path::PathBuf;

use crate::errors::ConfigError;
use crate::range::RangeSpec;
use crate::runner::ProbeMode;
use crate::target::{self, Target};

/// Raw option values as they arrive from the CLI.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub repository: PathBuf,
    pub workdir: Option<PathBuf>,
    pub outputdir: PathBuf,
    pub branch: Option<String>,
    pub first: Option<String>,
    pub last_before: Option<String>,
    pub last: Option<String>,
    pub short: usize,
    pub targets: Vec<String>,
    pub build: bool,
    pub configure_command: Option<String>,
    pub make_command: Option<String>,
    pub test_command: Option<String>,
    pub verbose: bool,
    pub quiet: bool,
    pub json: Option<PathBuf>,
}

/// Validated session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub repository: PathBuf,
    pub workdir: PathBuf,
    pub outputdir: PathBuf,
    pub branch: Option<String>,
    pub short_len: usize,
    pub mode: ProbeMode,
    pub targets: Vec<Target>,
    pub endpoints: RangeSpec,
    pub configure_command: Option<String>,
    pub make_command: Option<String>,
    pub test_command: Option<String>,
    pub verbose: bool,
    pub quiet: bool,
    pub json_path: Option<PathBuf>,
}

impl Config {
    pub fn new(opts: ConfigOptions) -> Result<Self, ConfigError> {
        let repository = opts
            .repository
            .canonicalize()
            .map_err(|_| ConfigError::MissingRepository {
                path: opts.repository.clone(),
            })?;
        if !repository.is_dir() {
            return Err(ConfigError::MissingRepository { path: repository });
        }

        let workdir = match opts.workdir {
            Some(dir) => {
                let dir = dir
                    .canonicalize()
                    .map_err(|_| ConfigError::MissingWorkdir { path: dir.clone() })?;
                if !dir.is_dir() {
                    return Err(ConfigError::MissingWorkdir { path: dir });
                }
                dir
            }
            None => repository.clone(),
        };

        let endpoints = match (opts.first, opts.last_before, opts.last) {
            (_, _, None) => return Err(ConfigError::MissingLast),
            (Some(first), None, Some(last)) => RangeSpec::Endpoints { first, last },
            (None, Some(last_before), Some(last)) => RangeSpec::After { last_before, last },
            _ => return Err(ConfigError::EndpointFlags),
        };

        let (mode, targets) = if opts.build {
            if !opts.targets.is_empty() {
                return Err(ConfigError::TargetsForbidden);
            }
            if opts.make_command.is_none() {
                return Err(ConfigError::MissingMakeCommand);
            }
            (ProbeMode::BuildOutput, vec![Target::build()])
        } else {
            if opts.test_command.is_none() {
                return Err(ConfigError::MissingTestCommand);
            }
            (ProbeMode::TestOutput, target::build_target_set(&opts.targets)?)
        };

        Ok(Self {
            repository,
            workdir,
            outputdir: opts.outputdir,
            branch: opts.branch,
            short_len: opts.short.clamp(4, 40),
            mode,
            targets,
            endpoints,
            configure_command: opts.configure_command,
            make_command: opts.make_command,
            test_command: opts.test_command,
            verbose: opts.verbose,
            quiet: opts.quiet,
            json_path: opts.json,
        })
    }

    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.outputdir).map_err(|source| ConfigError::OutputDir {
            path: self.outputdir.clone(),
            source,
        })
    }

    /// Where the JSON report goes: `--json` if given, else inside the
    /// output directory.
    pub fn json_report_path(&self) -> PathBuf {
        self.json_path
            .clone()
            .unwrap_or_else(|| self.outputdir.join("report.json"))
    }
}
