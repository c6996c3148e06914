//! Backend adapters
//!
//! Every backend under test is reached through [`BackendAdapter`]. The
//! transcoder and the driver only ever see this trait; the concrete
//! variant is picked by name when a session is set up.

pub mod http;
pub mod local;
pub mod skip;

use proctest_common::{ProcessSpec, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{RunnerError, RunnerResult};
use crate::native::{NativeMap, NativeValue};

pub use http::{HttpBackend, HttpConfig};
pub use local::LocalBackend;
pub use skip::SkippingBackend;

/// Capability set of a backend under test
pub trait BackendAdapter {
    /// Short name used in logs and reports
    fn name(&self) -> &'static str;

    /// Processes supported by the backend
    fn list_processes(&self) -> RunnerResult<Vec<ProcessSpec>>;

    fn describe_process(&self, process_id: &str) -> RunnerResult<ProcessSpec> {
        self.list_processes()?
            .into_iter()
            .find(|p| p.id == process_id)
            .ok_or_else(|| RunnerError::process("ProcessUnsupported", format!("Process {:?} is not supported", process_id)))
    }

    /// Execute a single process with prepared arguments
    fn execute(&self, process_id: &str, arguments: NativeMap) -> RunnerResult<NativeValue>;

    fn encode_labeled_array(&self, _data: &Value) -> RunnerResult<NativeValue> {
        Err(RunnerError::unsupported("labeled arrays not implemented yet"))
    }

    fn encode_datacube(&self, _data: &Value) -> RunnerResult<NativeValue> {
        Err(RunnerError::unsupported("datacubes not implemented yet"))
    }

    /// Encode a nested callback graph passed to `parent_parameter` of `parent_process_id`
    fn encode_process_graph(
        &self,
        _process: &Value,
        _parent_process_id: &str,
        _parent_parameter: &str,
    ) -> RunnerResult<NativeValue> {
        Err(RunnerError::unsupported("process graphs not implemented yet"))
    }

    /// Hook for backend specific coercions of already resolved values
    fn encode_data(&self, data: NativeValue) -> RunnerResult<NativeValue> {
        Ok(data)
    }

    /// Convert a native result back into the generic form used for comparison
    fn decode_data(&self, data: NativeValue, expected: &Value) -> RunnerResult<Value> {
        Ok(collapse(data, expected).to_value())
    }

    fn get_nodata_value(&self) -> NativeValue {
        NativeValue::Null
    }

    /// Whether arguments must be representable as plain JSON
    fn is_json_only(&self) -> bool {
        false
    }
}

/// Shape normalization of list results.
///
/// Empty lists become null and single-element lists become their element,
/// unless the expected value is itself a list.
pub fn collapse(data: NativeValue, expected: &Value) -> NativeValue {
    if matches!(expected, Value::Array(_)) {
        return data;
    }
    match data {
        NativeValue::List(items) if items.is_empty() => NativeValue::Null,
        NativeValue::List(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

/// Backend variants selectable by name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerKind {
    Http,
    Local,
    #[default]
    Skip,
}

impl FromStr for RunnerKind {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(RunnerKind::Http),
            "local" => Ok(RunnerKind::Local),
            "skip" | "" => Ok(RunnerKind::Skip),
            other => Err(RunnerError::Config(format!("Unknown runner {:?}", other))),
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerKind::Http => write!(f, "http"),
            RunnerKind::Local => write!(f, "local"),
            RunnerKind::Skip => write!(f, "skip"),
        }
    }
}
