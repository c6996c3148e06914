//! In-process execution engine
//!
//! Processes are plain functions registered by name together with the
//! metadata advertised through `list_processes`. Nested callbacks are
//! evaluated by [`graph`], datacube processes live in [`cube`] and the
//! scalar/array processes in [`math`].

mod cube;
mod graph;
mod math;

use indexmap::IndexMap;
use proctest_common::{Map, ParameterSpec, ProcessSpec, Value};
use tracing::debug;

use super::BackendAdapter;
use crate::error::{RunnerError, RunnerResult};
use crate::native::{Callback, DataCube, LabeledArray, NativeMap, NativeValue};

type Implementation = fn(&LocalBackend, &mut Args) -> RunnerResult<NativeValue>;

struct Entry {
    spec: ProcessSpec,
    implementation: Implementation,
}

pub struct LocalBackend {
    processes: IndexMap<String, Entry>,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBackend {
    pub fn new() -> Self {
        let mut backend = Self {
            processes: IndexMap::new(),
        };
        math::register(&mut backend);
        cube::register(&mut backend);
        backend
    }

    fn register(&mut self, spec: ProcessSpec, implementation: Implementation) {
        self.processes.insert(
            spec.id.clone(),
            Entry {
                spec,
                implementation,
            },
        );
    }

    pub fn supports(&self, process_id: &str) -> bool {
        self.processes.contains_key(process_id)
    }

    /// Run a process by name, validating arguments against its metadata
    pub(crate) fn call(&self, process_id: &str, arguments: NativeMap) -> RunnerResult<NativeValue> {
        let entry = self.processes.get(process_id).ok_or_else(|| {
            RunnerError::process(
                "ProcessUnsupported",
                format!("Process with identifier '{}' is not available.", process_id),
            )
        })?;

        for name in arguments.keys() {
            if entry.spec.parameter(name).is_none() {
                return Err(RunnerError::process(
                    "ProcessParameterUnsupported",
                    format!("Process '{}' does not support parameter '{}'.", process_id, name),
                ));
            }
        }
        for parameter in entry.spec.parameters.iter().filter(|p| !p.optional) {
            if !arguments.contains_key(&parameter.name) {
                return Err(RunnerError::process(
                    "ProcessParameterMissing",
                    format!(
                        "Process '{}' parameter '{}' is required.",
                        process_id, parameter.name
                    ),
                ));
            }
        }

        debug!("Executing local process {}", process_id);
        let mut args = Args {
            process_id: process_id.to_string(),
            values: arguments,
        };
        (entry.implementation)(self, &mut args)
    }
}

impl BackendAdapter for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn list_processes(&self) -> RunnerResult<Vec<ProcessSpec>> {
        Ok(self.processes.values().map(|e| e.spec.clone()).collect())
    }

    fn describe_process(&self, process_id: &str) -> RunnerResult<ProcessSpec> {
        self.processes
            .get(process_id)
            .map(|e| e.spec.clone())
            .ok_or_else(|| {
                RunnerError::process(
                    "ProcessUnsupported",
                    format!("Process with identifier '{}' is not available.", process_id),
                )
            })
    }

    fn execute(&self, process_id: &str, arguments: NativeMap) -> RunnerResult<NativeValue> {
        self.call(process_id, arguments)
    }

    fn encode_labeled_array(&self, data: &Value) -> RunnerResult<NativeValue> {
        Ok(NativeValue::LabeledArray(LabeledArray::from_value(data)?))
    }

    fn encode_datacube(&self, data: &Value) -> RunnerResult<NativeValue> {
        Ok(NativeValue::Cube(DataCube::from_value(data)?))
    }

    fn encode_process_graph(
        &self,
        process: &Value,
        parent_process_id: &str,
        parent_parameter: &str,
    ) -> RunnerResult<NativeValue> {
        let graph = process
            .get("process_graph")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| RunnerError::process("ProcessGraphInvalid", "Process graph must be an object"))?;

        let parameters = self
            .processes
            .get(parent_process_id)
            .and_then(|e| e.spec.parameter(parent_parameter))
            .map(ParameterSpec::callback_parameters)
            .unwrap_or_default();

        Ok(NativeValue::Callback(Callback { graph, parameters }))
    }

    fn get_nodata_value(&self) -> NativeValue {
        NativeValue::Float(f64::NAN)
    }
}

/// Arguments of one process invocation
pub(crate) struct Args {
    process_id: String,
    values: NativeMap,
}

impl Args {
    /// Take an argument; absent arguments read as null
    pub fn take(&mut self, name: &str) -> NativeValue {
        self.values.shift_remove(name).unwrap_or_default()
    }

    /// Take an argument that is neither absent nor null
    pub fn optional(&mut self, name: &str) -> Option<NativeValue> {
        Some(self.take(name)).filter(|v| !v.is_null())
    }

    pub fn flag(&mut self, name: &str, default: bool) -> RunnerResult<bool> {
        match self.take(name) {
            NativeValue::Null => Ok(default),
            NativeValue::Bool(b) => Ok(b),
            other => Err(self.invalid(name, format!("expected boolean, got {}", other.kind()))),
        }
    }

    pub fn string(&mut self, name: &str) -> RunnerResult<String> {
        match self.take(name) {
            NativeValue::String(s) => Ok(s),
            other => Err(self.invalid(name, format!("expected string, got {}", other.kind()))),
        }
    }

    pub fn cube(&mut self, name: &str) -> RunnerResult<DataCube> {
        match self.take(name) {
            NativeValue::Cube(cube) => Ok(cube),
            other => Err(self.invalid(name, format!("expected datacube, got {}", other.kind()))),
        }
    }

    pub fn callback(&mut self, name: &str) -> RunnerResult<Callback> {
        match self.take(name) {
            NativeValue::Callback(callback) => Ok(callback),
            other => Err(self.invalid(name, format!("expected process graph, got {}", other.kind()))),
        }
    }

    pub fn invalid(&self, name: &str, reason: impl std::fmt::Display) -> RunnerError {
        RunnerError::process(
            "ProcessParameterInvalid",
            format!(
                "The value passed for parameter '{}' in process '{}' is invalid: {}",
                name, self.process_id, reason
            ),
        )
    }
}

fn spec(id: &str, summary: &str, parameters: Vec<ParameterSpec>) -> ProcessSpec {
    ProcessSpec {
        id: id.to_string(),
        summary: Some(summary.to_string()),
        parameters,
        experimental: None,
    }
}

fn required(name: &str) -> ParameterSpec {
    ParameterSpec {
        name: name.to_string(),
        description: None,
        schema: Value::Object(Map::new()),
        optional: false,
    }
}

fn optional(name: &str) -> ParameterSpec {
    ParameterSpec {
        optional: true,
        ..required(name)
    }
}

/// Parameter taking a callback that receives `parameters`
fn callback(name: &str, parameters: &[&str]) -> ParameterSpec {
    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::from("object"));
    schema.insert("subtype".to_string(), Value::from("process-graph"));
    schema.insert(
        "parameters".to_string(),
        Value::Array(
            parameters
                .iter()
                .map(|p| {
                    let mut param = Map::new();
                    param.insert("name".to_string(), Value::from(*p));
                    Value::Object(param)
                })
                .collect(),
        ),
    );
    ParameterSpec {
        schema: Value::Object(schema),
        ..required(name)
    }
}
