//! Argument transcoding
//!
//! Turns the backend-agnostic argument trees of a test case into the
//! backend's native values. Typed objects and nested process graphs are
//! handed to the backend's encoders; everything else is rebuilt
//! structurally.

use indexmap::IndexMap;
use proctest_common::Value;
use std::path::Path;
use tracing::warn;

use crate::backend::BackendAdapter;
use crate::error::{RunnerError, RunnerResult};
use crate::native::{NativeMap, NativeValue};

/// Prepare every argument of a test case
pub fn prepare_arguments(
    arguments: &IndexMap<String, Value>,
    process_id: &str,
    backend: &dyn BackendAdapter,
    file: &Path,
) -> RunnerResult<NativeMap> {
    arguments
        .iter()
        .map(|(name, arg)| {
            prepare_argument(arg, process_id, name, backend, file).map(|value| (name.clone(), value))
        })
        .collect()
}

/// Prepare a single argument tree for `name` of `process_id`
pub fn prepare_argument(
    arg: &Value,
    process_id: &str,
    name: &str,
    backend: &dyn BackendAdapter,
    file: &Path,
) -> RunnerResult<NativeValue> {
    let value = transcode(arg, process_id, name, backend, file)?;
    if backend.is_json_only() {
        check_non_json_values(&value)?;
    }
    Ok(value)
}

fn transcode(
    arg: &Value,
    process_id: &str,
    name: &str,
    backend: &dyn BackendAdapter,
    file: &Path,
) -> RunnerResult<NativeValue> {
    let loaded;
    let arg = match arg.get("$ref").and_then(Value::as_str) {
        Some(reference) => {
            loaded = load_ref(reference, file)?;
            &loaded
        }
        None => arg,
    };

    let value = match arg {
        Value::Object(map) if map.contains_key("type") => match arg.type_tag() {
            Some("labeled-array") => backend.encode_labeled_array(arg)?,
            Some("datacube") => backend.encode_datacube(arg)?,
            Some("nodata") => backend.get_nodata_value(),
            _ => {
                warn!("Unhandled argument type: {}", arg);
                NativeValue::from_value(arg.clone())
            }
        },
        Value::Object(map) if map.contains_key("process_graph") => {
            backend.encode_process_graph(arg, process_id, name)?
        }
        Value::Object(map) => NativeValue::Map(
            map.iter()
                .map(|(key, item)| {
                    transcode(item, process_id, name, backend, file).map(|v| (key.clone(), v))
                })
                .collect::<RunnerResult<NativeMap>>()?,
        ),
        Value::Array(items) => NativeValue::List(
            items
                .iter()
                .map(|item| transcode(item, process_id, name, backend, file))
                .collect::<RunnerResult<Vec<_>>>()?,
        ),
        other => NativeValue::from_value(other.clone()),
    };

    backend.encode_data(value)
}

/// Load an external reference relative to the fixture that declares it
pub fn load_ref(reference: &str, file: &Path) -> RunnerResult<Value> {
    let path = file.parent().unwrap_or_else(|| Path::new(".")).join(reference);
    let failed = |reason: String| RunnerError::Reference {
        reference: reference.to_string(),
        reason,
    };

    let structured = [".json", ".json5", ".geojson"];
    let text = [".txt", ".wkt2"];

    if structured.iter().any(|ext| reference.ends_with(ext)) {
        let source = std::fs::read_to_string(&path).map_err(|e| failed(e.to_string()))?;
        Value::from_json5_str(&source).map_err(|e| failed(e.to_string()))
    } else if text.iter().any(|ext| reference.ends_with(ext)) {
        std::fs::read_to_string(&path)
            .map(Value::String)
            .map_err(|e| failed(e.to_string()))
    } else {
        Err(failed(format!("Unhandled external reference {}.", reference)))
    }
}

/// NaN and infinities cannot be sent to a JSON-only backend
pub fn check_non_json_values(value: &NativeValue) -> RunnerResult<()> {
    match value {
        NativeValue::Float(f) if f.is_nan() => {
            Err(RunnerError::unsupported("HTTP JSON APIs don't support NaN values"))
        }
        NativeValue::Float(f) if f.is_infinite() => {
            Err(RunnerError::unsupported("HTTP JSON APIs don't support infinity values"))
        }
        NativeValue::List(items) => items.iter().try_for_each(check_non_json_values),
        NativeValue::Map(map) => map.values().try_for_each(check_non_json_values),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HttpBackend, HttpConfig, LocalBackend, SkippingBackend};
    use tempfile::TempDir;

    fn fixture_dir() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("point.geojson"), r#"{"type": "Point", "coordinates": [1, 2]}"#).unwrap();
        std::fs::write(dir.path().join("crs.wkt2"), "GEOGCRS[\"WGS 84\"]").unwrap();
        std::fs::write(dir.path().join("raw.bin"), "x").unwrap();
        let file = dir.path().join("fixture.json5");
        (dir, file)
    }

    fn http() -> HttpBackend {
        HttpBackend::new(HttpConfig {
            url: "http://127.0.0.1:9".to_string(),
            ..HttpConfig::default()
        })
        .unwrap()
    }

    fn value(source: &str) -> Value {
        Value::from_json5_str(source).unwrap()
    }

    #[test]
    fn test_plain_values_pass_through() {
        let (_dir, file) = fixture_dir();
        let arg = value("{a: [1, 2.5, 'x', null], b: {c: true}}");
        let prepared = prepare_argument(&arg, "p", "data", &LocalBackend::new(), &file).unwrap();
        assert_eq!(prepared.to_value(), arg);
    }

    #[test]
    fn test_refs_are_resolved() {
        let (_dir, file) = fixture_dir();
        let backend = LocalBackend::new();

        let geometry = prepare_argument(&value("{'$ref': 'point.geojson'}"), "p", "geometries", &backend, &file).unwrap();
        assert_eq!(geometry.to_value().type_tag(), Some("Point"));

        let crs = prepare_argument(&value("{'$ref': 'crs.wkt2'}"), "p", "crs", &backend, &file).unwrap();
        assert_eq!(crs, NativeValue::String("GEOGCRS[\"WGS 84\"]".to_string()));
    }

    #[test]
    fn test_unknown_ref_extension_is_a_hard_failure() {
        let (_dir, file) = fixture_dir();
        let err = prepare_argument(&value("{'$ref': 'raw.bin'}"), "p", "x", &LocalBackend::new(), &file).unwrap_err();
        assert!(matches!(err, RunnerError::Reference { .. }));
        assert!(!err.is_unsupported());

        let err = prepare_argument(&value("{'$ref': 'missing.json'}"), "p", "x", &LocalBackend::new(), &file).unwrap_err();
        assert!(matches!(err, RunnerError::Reference { .. }));
    }

    #[test]
    fn test_nodata_uses_backend_sentinel() {
        let (_dir, file) = fixture_dir();
        let arg = value("[1, {type: 'nodata'}]");
        let local = prepare_argument(&arg, "sum", "data", &LocalBackend::new(), &file).unwrap();
        match local {
            NativeValue::List(items) => assert!(items[1].is_nan()),
            other => panic!("expected list, got {:?}", other),
        }

        let remote = prepare_argument(&arg, "sum", "data", &http(), &file).unwrap();
        assert_eq!(remote.to_value(), value("[1, null]"));
    }

    #[test]
    fn test_typed_objects_dispatch_to_backend() {
        let (_dir, file) = fixture_dir();
        let cube = value("{type: 'datacube', dimensions: {x: {type: 'spatial', values: [1]}}, data: [1]}");
        let local = prepare_argument(&cube, "apply", "data", &LocalBackend::new(), &file).unwrap();
        assert!(matches!(local, NativeValue::Cube(_)));

        let err = prepare_argument(&cube, "apply", "data", &http(), &file).unwrap_err();
        assert!(err.is_unsupported());

        let unknown = value("{type: 'geometry-collection', items: []}");
        let passed = prepare_argument(&unknown, "p", "x", &LocalBackend::new(), &file).unwrap();
        assert_eq!(passed.to_value(), unknown);
    }

    #[test]
    fn test_nested_graph_keeps_parent_context() {
        let (_dir, file) = fixture_dir();
        let graph = value("{process_graph: {m: {process_id: 'mean', arguments: {data: {from_parameter: 'data'}}, result: true}}}");
        let prepared = prepare_argument(&graph, "reduce_dimension", "reducer", &LocalBackend::new(), &file).unwrap();
        match prepared {
            NativeValue::Callback(callback) => assert_eq!(callback.parameters, vec!["data", "context"]),
            other => panic!("expected callback, got {:?}", other),
        }

        let err = prepare_argument(&graph, "reduce_dimension", "reducer", &SkippingBackend, &file).unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_json_only_rejects_non_finite_numbers() {
        let (_dir, file) = fixture_dir();
        let err = prepare_argument(&value("{x: [1, NaN]}"), "p", "x", &http(), &file).unwrap_err();
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("NaN"));

        let err = prepare_argument(&value("-Infinity"), "p", "x", &http(), &file).unwrap_err();
        assert!(err.to_string().contains("infinity"));

        assert!(prepare_argument(&value("Infinity"), "p", "x", &LocalBackend::new(), &file).is_ok());
    }

    #[test]
    fn test_prepare_arguments_keeps_order() {
        let (_dir, file) = fixture_dir();
        let mut arguments = IndexMap::new();
        arguments.insert("y".to_string(), Value::Int(2));
        arguments.insert("x".to_string(), Value::Int(1));
        let prepared = prepare_arguments(&arguments, "add", &LocalBackend::new(), &file).unwrap();
        assert_eq!(prepared.keys().collect::<Vec<_>>(), vec!["y", "x"]);
    }
}
