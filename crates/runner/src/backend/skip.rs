//! Backend used when no runner is configured: every case is skipped

use proctest_common::ProcessSpec;

use super::BackendAdapter;
use crate::error::{RunnerError, RunnerResult};
use crate::native::{NativeMap, NativeValue};

#[derive(Debug, Clone, Copy, Default)]
pub struct SkippingBackend;

impl BackendAdapter for SkippingBackend {
    fn name(&self) -> &'static str {
        "skip"
    }

    fn list_processes(&self) -> RunnerResult<Vec<ProcessSpec>> {
        Err(RunnerError::unsupported("SkippingRunner: No processes"))
    }

    fn execute(&self, process_id: &str, _arguments: NativeMap) -> RunnerResult<NativeValue> {
        Err(RunnerError::unsupported(format!(
            "SkippingRunner: skip executing process {}",
            process_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_everything_is_unsupported() {
        let backend = SkippingBackend;
        assert!(backend.list_processes().unwrap_err().is_unsupported());
        assert!(backend.describe_process("add").unwrap_err().is_unsupported());
        assert!(backend
            .execute("add", NativeMap::new())
            .unwrap_err()
            .is_unsupported());
    }
}
