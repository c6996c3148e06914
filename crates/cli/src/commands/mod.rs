//! CLI Commands

pub mod list;
pub mod run;

use anyhow::{Context, Result};
use clap::Args;
use proctest_runner::{RunnerConfig, RunnerKind};
use std::path::PathBuf;

/// Options shared by every command that opens a session
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Runner configuration file (TOML)
    #[arg(long, env = "PROCTEST_CONFIG", default_value = "proctest.toml")]
    pub config: PathBuf,

    /// Backend to run against (http, local, skip)
    #[arg(long, env = "PROCTEST_RUNNER")]
    pub runner: Option<RunnerKind>,

    /// Root URL of the HTTP backend
    #[arg(long, env = "PROCTEST_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Bearer token for the HTTP backend
    #[arg(long, env = "PROCTEST_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Directory holding the process fixtures
    #[arg(long, env = "PROCTEST_FIXTURES")]
    pub fixtures: Option<PathBuf>,

    /// Comma-separated process ids to test
    #[arg(long, env = "PROCTEST_PROCESSES")]
    pub processes: Option<String>,

    /// Comma-separated process levels to test (L1, L2, L2A, L3, L4)
    #[arg(long, env = "PROCTEST_PROCESS_LEVELS")]
    pub process_levels: Option<String>,

    /// Also test experimental processes
    #[arg(long, env = "PROCTEST_EXPERIMENTAL")]
    pub experimental: bool,
}

impl SessionArgs {
    /// Configuration file values, overridden by command-line and environment options
    pub fn runner_config(&self) -> Result<RunnerConfig> {
        let mut config = RunnerConfig::load(&self.config)
            .with_context(|| format!("Failed to load {}", self.config.display()))?;

        if let Some(runner) = self.runner {
            config.runner = runner;
        }
        if let Some(url) = &self.backend_url {
            config.backend_url = Some(url.clone());
        }
        if let Some(token) = &self.auth_token {
            config.auth_token = Some(token.clone());
        }
        if let Some(fixtures) = &self.fixtures {
            config.fixtures_root = fixtures.clone();
        }
        if let Some(processes) = &self.processes {
            config.processes = Some(processes.clone());
        }
        if let Some(levels) = &self.process_levels {
            config.process_levels = Some(levels.clone());
        }
        config.experimental |= self.experimental;
        Ok(config)
    }
}
