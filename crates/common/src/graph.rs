//! Process graph helpers

use std::collections::BTreeSet;

use crate::value::{Map, Value};

/// Node id used for single-process graphs
pub const SINGLE_NODE_ID: &str = "node";

/// Wrap one process invocation into a minimal `{process_graph: {...}}` document
pub fn single_node_graph(process_id: &str, arguments: Map) -> Value {
    let mut node = Map::new();
    node.insert("process_id".to_string(), Value::from(process_id));
    node.insert("arguments".to_string(), Value::Object(arguments));
    node.insert("result".to_string(), Value::Bool(true));

    let mut graph = Map::new();
    graph.insert(SINGLE_NODE_ID.to_string(), Value::Object(node));

    let mut process = Map::new();
    process.insert("process_graph".to_string(), Value::Object(graph));
    Value::Object(process)
}

/// Process ids used by a graph, including nested callback graphs.
///
/// Accepts either a flat graph (`{node_id: {process_id, arguments}}`) or a
/// wrapper object with a `process_graph` key.
pub fn extract_process_ids(graph: &Value) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    let flat = graph.get("process_graph").unwrap_or(graph);
    collect_graph(flat, &mut ids);
    ids
}

/// Process ids of every callback graph nested anywhere inside `value`
pub fn nested_process_ids(value: &Value) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    collect_nested(value, &mut ids);
    ids
}

fn collect_graph(flat: &Value, ids: &mut BTreeSet<String>) {
    let Some(nodes) = flat.as_object() else {
        return;
    };
    for node in nodes.values() {
        if let Some(pid) = node.get("process_id").and_then(Value::as_str) {
            ids.insert(pid.to_string());
        }
        if let Some(arguments) = node.get("arguments") {
            collect_nested(arguments, ids);
        }
    }
}

fn collect_nested(value: &Value, ids: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(graph) = map.get("process_graph") {
                collect_graph(graph, ids);
            } else {
                map.values().for_each(|v| collect_nested(v, ids));
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_nested(v, ids)),
        _ => {}
    }
}
