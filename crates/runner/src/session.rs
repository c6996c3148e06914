//! Test session

use proctest_common::{ProcessDefinition, ProcessFilters, ProcessRegistry};
use tracing::info;

use crate::backend::BackendAdapter;
use crate::config::RunnerConfig;
use crate::driver::TestRunner;
use crate::error::RunnerResult;
use crate::skipper::Skipper;

/// Everything a run needs, created once and shared by all test cases
pub struct Session {
    config: RunnerConfig,
    registry: ProcessRegistry,
    filters: ProcessFilters,
    backend: Box<dyn BackendAdapter>,
    skipper: Skipper,
}

impl Session {
    /// Build the configured backend and load the fixtures
    pub fn initialize(config: RunnerConfig) -> RunnerResult<Self> {
        let backend = config.backend()?;
        Self::with_backend(config, backend)
    }

    /// Same as [`Session::initialize`] with an externally provided backend
    pub fn with_backend(config: RunnerConfig, backend: Box<dyn BackendAdapter>) -> RunnerResult<Self> {
        let filters = config.filters()?;
        let registry = ProcessRegistry::load(config.fixtures_root.clone())?;

        info!(
            "Session ready: {} backend, {} process definition(s)",
            backend.name(),
            registry.len()
        );
        if let Some(ids) = &filters.process_ids {
            info!("Selected processes: {}", ids.join(", "));
        }
        if let Some(levels) = &filters.process_levels {
            let levels: Vec<String> = levels.iter().map(ToString::to_string).collect();
            info!("Selected levels: {}", levels.join(", "));
        }

        Ok(Self {
            config,
            registry,
            filters,
            backend,
            skipper: Skipper::new(),
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn filters(&self) -> &ProcessFilters {
        &self.filters
    }

    pub fn backend(&self) -> &dyn BackendAdapter {
        self.backend.as_ref()
    }

    pub fn skipper(&self) -> &Skipper {
        &self.skipper
    }

    /// Processes passing the selection filters
    pub fn selected_processes(&self) -> Vec<&ProcessDefinition> {
        self.registry.get_processes_filtered(&self.filters)
    }

    pub fn runner(&self) -> TestRunner<'_> {
        TestRunner::new(self)
    }
}
