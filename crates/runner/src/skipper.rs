//! Skip decisions based on backend capabilities

use once_cell::sync::OnceCell;
use std::collections::BTreeSet;
use tracing::info;

use crate::backend::BackendAdapter;
use crate::error::RunnerResult;

/// Caches the backend's process listing for the lifetime of a session
#[derive(Debug, Default)]
pub struct Skipper {
    available: OnceCell<BTreeSet<String>>,
}

impl Skipper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process ids the backend supports, fetched on first use
    pub fn available_processes(&self, backend: &dyn BackendAdapter) -> RunnerResult<&BTreeSet<String>> {
        self.available.get_or_try_init(|| {
            let available: BTreeSet<String> = backend.list_processes()?.into_iter().map(|p| p.id).collect();
            info!("Backend {} supports {} processes", backend.name(), available.len());
            Ok(available)
        })
    }

    /// Skip reason when any of `processes` is not supported by the backend
    pub fn skip_if_unsupported_process(
        &self,
        backend: &dyn BackendAdapter,
        processes: &BTreeSet<String>,
    ) -> RunnerResult<Option<String>> {
        let available = self.available_processes(backend)?;
        let unsupported: Vec<&str> = processes
            .iter()
            .filter(|p| !available.contains(*p))
            .map(String::as_str)
            .collect();
        if unsupported.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!("Backend does not support: {}", unsupported.join(", "))))
        }
    }
}
