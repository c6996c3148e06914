//! Callback graph evaluation

use proctest_common::{Map, Value};
use std::collections::{HashMap, HashSet};

use super::LocalBackend;
use crate::backend::BackendAdapter;
use crate::error::{RunnerError, RunnerResult};
use crate::native::{Callback, NativeMap, NativeValue};

impl LocalBackend {
    /// Evaluate a callback with the values its parent passes in
    pub(crate) fn run_callback(&self, callback: &Callback, parameters: NativeMap) -> RunnerResult<NativeValue> {
        let result_node = result_node(&callback.graph)?;
        let mut evaluator = Evaluator {
            backend: self,
            graph: &callback.graph,
            parameters: &parameters,
            results: HashMap::new(),
            pending: HashSet::new(),
        };
        evaluator.node(&result_node)
    }
}

fn result_node(graph: &Map) -> RunnerResult<String> {
    let flagged: Vec<&String> = graph
        .iter()
        .filter(|(_, node)| node.get("result").and_then(Value::as_bool) == Some(true))
        .map(|(id, _)| id)
        .collect();

    match (flagged.as_slice(), graph.len()) {
        ([id], _) => Ok((*id).clone()),
        ([], 1) => Ok(graph.keys().next().cloned().unwrap_or_default()),
        ([], _) => Err(graph_invalid("no result node")),
        _ => Err(RunnerError::process(
            "MultipleResultNodes",
            "Multiple result nodes specified for the process graph.",
        )),
    }
}

struct Evaluator<'a> {
    backend: &'a LocalBackend,
    graph: &'a Map,
    parameters: &'a NativeMap,
    results: HashMap<String, NativeValue>,
    pending: HashSet<String>,
}

impl Evaluator<'_> {
    fn node(&mut self, id: &str) -> RunnerResult<NativeValue> {
        if let Some(result) = self.results.get(id) {
            return Ok(result.clone());
        }
        if !self.pending.insert(id.to_string()) {
            return Err(graph_invalid(format!("cycle through node '{}'", id)));
        }

        let node = self
            .graph
            .get(id)
            .ok_or_else(|| graph_invalid(format!("unknown node '{}'", id)))?;
        let process_id = node
            .get("process_id")
            .and_then(Value::as_str)
            .ok_or_else(|| graph_invalid(format!("node '{}' has no process_id", id)))?;

        let mut arguments = NativeMap::new();
        if let Some(raw) = node.get("arguments").and_then(Value::as_object) {
            for (name, value) in raw {
                arguments.insert(name.clone(), self.resolve(value, process_id, name)?);
            }
        }

        let result = self.backend.call(process_id, arguments)?;
        self.pending.remove(id);
        self.results.insert(id.to_string(), result.clone());
        Ok(result)
    }

    fn resolve(&mut self, value: &Value, process_id: &str, parameter: &str) -> RunnerResult<NativeValue> {
        match value {
            Value::Object(map) => {
                if let Some(node) = map.get("from_node").and_then(Value::as_str) {
                    return self.node(node);
                }
                if let Some(name) = map.get("from_parameter").and_then(Value::as_str) {
                    return self.parameters.get(name).cloned().ok_or_else(|| {
                        RunnerError::process(
                            "ProcessGraphParameterMissing",
                            format!("The process parameter '{}' is not available.", name),
                        )
                    });
                }
                if map.contains_key("process_graph") {
                    return self.backend.encode_process_graph(value, process_id, parameter);
                }
                match value.type_tag() {
                    Some("datacube") => self.backend.encode_datacube(value),
                    Some("labeled-array") => self.backend.encode_labeled_array(value),
                    _ => {
                        let mut resolved = NativeMap::new();
                        for (key, item) in map {
                            resolved.insert(key.clone(), self.resolve(item, process_id, parameter)?);
                        }
                        Ok(NativeValue::Map(resolved))
                    }
                }
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve(item, process_id, parameter))
                .collect::<RunnerResult<Vec<_>>>()
                .map(NativeValue::List),
            other => Ok(NativeValue::from_value(other.clone())),
        }
    }
}

fn graph_invalid(reason: impl std::fmt::Display) -> RunnerError {
    RunnerError::process("ProcessGraphInvalid", format!("Invalid process graph: {}", reason))
}
