//! Runner configuration

use proctest_common::ProcessFilters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::{BackendAdapter, HttpBackend, HttpConfig, LocalBackend, RunnerKind, SkippingBackend};
use crate::error::{RunnerError, RunnerResult};

/// Default location of the process fixtures
pub const DEFAULT_FIXTURES_ROOT: &str = "assets/processes/tests";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Backend variant the cases run against
    pub runner: RunnerKind,

    /// Root URL of the HTTP backend
    pub backend_url: Option<String>,

    /// Pre-issued bearer token for the HTTP backend
    pub auth_token: Option<String>,

    /// Directory holding the process fixtures
    pub fixtures_root: PathBuf,

    /// Comma-separated process ids to select
    pub processes: Option<String>,

    /// Comma-separated levels to select
    pub process_levels: Option<String>,

    /// Also run experimental processes and cases
    pub experimental: bool,

    /// Where `test-results.json` is written
    pub output_dir: PathBuf,

    /// Per-request timeout for the HTTP backend
    pub http_timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            runner: RunnerKind::default(),
            backend_url: None,
            auth_token: None,
            fixtures_root: PathBuf::from(DEFAULT_FIXTURES_ROOT),
            processes: None,
            process_levels: None,
            experimental: false,
            output_dir: PathBuf::from("test-results"),
            http_timeout_secs: 60,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file; a missing file yields the defaults
    pub fn load(path: &Path) -> RunnerResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Selection filters for this run
    pub fn filters(&self) -> RunnerResult<ProcessFilters> {
        Ok(ProcessFilters::from_csv(
            self.processes.as_deref(),
            self.process_levels.as_deref(),
            self.experimental,
        )?)
    }

    /// Build the configured backend
    pub fn backend(&self) -> RunnerResult<Box<dyn BackendAdapter>> {
        Ok(match self.runner {
            RunnerKind::Http => {
                let url = self
                    .backend_url
                    .clone()
                    .filter(|url| !url.trim().is_empty())
                    .ok_or_else(|| RunnerError::Config("No backend URL found".to_string()))?;
                Box::new(HttpBackend::new(HttpConfig {
                    url,
                    auth_token: self.auth_token.clone(),
                    timeout: Duration::from_secs(self.http_timeout_secs),
                })?)
            }
            RunnerKind::Local => Box::new(LocalBackend::new()),
            RunnerKind::Skip => Box::new(SkippingBackend),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctest_common::Level;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = RunnerConfig::load(&dir.path().join("proctest.toml")).unwrap();
        assert_eq!(config, RunnerConfig::default());
        assert_eq!(config.backend().unwrap().name(), "skip");
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proctest.toml");
        std::fs::write(
            &path,
            r#"
runner = "local"
process_levels = "L1, L2"
experimental = true
"#,
        )
        .unwrap();

        let config = RunnerConfig::load(&path).unwrap();
        assert_eq!(config.runner, RunnerKind::Local);
        assert_eq!(config.fixtures_root, PathBuf::from(DEFAULT_FIXTURES_ROOT));
        let filters = config.filters().unwrap();
        assert_eq!(filters.process_levels, Some(vec![Level::L1, Level::L2]));
        assert!(filters.experimental);
        assert_eq!(config.backend().unwrap().name(), "local");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proctest.toml");
        std::fs::write(&path, "runner = \"dask\"").unwrap();
        assert!(matches!(RunnerConfig::load(&path), Err(RunnerError::Toml(_))));
    }

    #[test]
    fn test_http_requires_url() {
        let config = RunnerConfig {
            runner: RunnerKind::Http,
            ..Default::default()
        };
        assert!(matches!(config.backend(), Err(RunnerError::Config(_))));

        let config = RunnerConfig {
            runner: RunnerKind::Http,
            backend_url: Some("openeo.example".to_string()),
            ..Default::default()
        };
        let backend = config.backend().unwrap();
        assert_eq!(backend.name(), "http");
        assert!(backend.is_json_only());
    }

    #[test]
    fn test_unknown_level_is_a_config_error() {
        let config = RunnerConfig {
            process_levels: Some("L7".to_string()),
            ..Default::default()
        };
        assert!(matches!(config.filters(), Err(RunnerError::Setup(_))));
    }
}
