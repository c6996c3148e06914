//! Result comparison
//!
//! Decoded results are compared against the expected value of a test case
//! with a tolerance-aware structural diff. Paths in diffs use the
//! `root['key'][0]` notation so that exclusions can be written as plain
//! paths or regular expressions.

use once_cell::sync::Lazy;
use proctest_common::{isostr_to_datetime, Map, Throws, Value};
use regex::Regex;
use std::fmt;
use std::path::Path;
use tracing::warn;

use crate::backend::BackendAdapter;
use crate::error::{RunnerError, RunnerResult};
use crate::native::NativeValue;
use crate::transcode::load_ref;

static REFERENCE_SYSTEM_PATH: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"root\['dimensions'\]\[[^\]]+\]\['reference_system'\]"));

/// Outcome of a check
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Match,
    Mismatch(String),
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match)
    }
}

/// Normalize special nodes of the expected value and the matching result nodes.
///
/// `{"$ref"}` nodes are loaded, `{type: "datetime"}` nodes become timestamps
/// (the result counterpart is parsed best-effort) and `{type: "nodata"}`
/// nodes become the backend's nodata value. Both trees are returned as new
/// values.
pub fn prepare_results(
    backend: &dyn BackendAdapter,
    file: &Path,
    expected: &Value,
    result: Option<&Value>,
) -> RunnerResult<(Value, Option<Value>)> {
    match expected {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                let loaded = load_ref(reference, file)?;
                return prepare_loaded(backend, file, loaded, result);
            }
            prepare_loaded(backend, file, expected.clone(), result)
        }
        Value::Array(items) => {
            let result_items = result.and_then(Value::as_array);
            let mut out_expected = Vec::with_capacity(items.len());
            let mut out_result = result_items.cloned();
            for (i, item) in items.iter().enumerate() {
                let counterpart = result_items.and_then(|r| r.get(i));
                let (e, r) = prepare_results(backend, file, item, counterpart)?;
                out_expected.push(e);
                if let (Some(out), Some(r)) = (out_result.as_mut(), r) {
                    out[i] = r;
                }
            }
            Ok((
                Value::Array(out_expected),
                out_result.map(Value::Array).or_else(|| result.cloned()),
            ))
        }
        other => Ok((other.clone(), result.cloned())),
    }
}

fn prepare_loaded(
    backend: &dyn BackendAdapter,
    file: &Path,
    expected: Value,
    result: Option<&Value>,
) -> RunnerResult<(Value, Option<Value>)> {
    let Value::Object(map) = &expected else {
        return prepare_results(backend, file, &expected, result);
    };

    if map.contains_key("type") {
        return Ok(match expected.type_tag() {
            Some("datetime") => {
                let raw = map.get("value").and_then(Value::as_str).unwrap_or_default();
                let expected = Value::DateTime(isostr_to_datetime(raw)?);
                let result = result.map(|r| match r {
                    Value::String(s) => isostr_to_datetime(s)
                        .map(Value::DateTime)
                        .unwrap_or_else(|_| r.clone()),
                    other => other.clone(),
                });
                (expected, result)
            }
            Some("nodata") => (backend.get_nodata_value().to_value(), result.cloned()),
            _ => (expected.clone(), result.cloned()),
        });
    }

    let result_map = result.and_then(Value::as_object);
    let mut out_expected = Map::new();
    let mut out_result = result_map.cloned();
    for (key, item) in map {
        let counterpart = result_map.and_then(|r| r.get(key));
        let (e, r) = prepare_results(backend, file, item, counterpart)?;
        out_expected.insert(key.clone(), e);
        if let (Some(out), Some(r)) = (out_result.as_mut(), r) {
            out.insert(key.clone(), r);
        }
    }
    Ok((
        Value::Object(out_expected),
        out_result.map(Value::Object).or_else(|| result.cloned()),
    ))
}

/// Kind of a single structural difference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    ValuesChanged,
    TypeChanges,
    DictionaryItemAdded,
    DictionaryItemRemoved,
    IterableItemAdded,
    IterableItemRemoved,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::ValuesChanged => "values_changed",
            ChangeKind::TypeChanges => "type_changes",
            ChangeKind::DictionaryItemAdded => "dictionary_item_added",
            ChangeKind::DictionaryItemRemoved => "dictionary_item_removed",
            ChangeKind::IterableItemAdded => "iterable_item_added",
            ChangeKind::IterableItemRemoved => "iterable_item_removed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub path: String,
    pub kind: ChangeKind,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.path)?;
        match (&self.expected, &self.actual) {
            (Some(e), Some(a)) => write!(f, ": expected {}, got {}", e, a),
            (Some(e), None) => write!(f, ": {}", e),
            (None, Some(a)) => write!(f, ": {}", a),
            (None, None) => Ok(()),
        }
    }
}

/// Options of a structural diff
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Absolute tolerance for numeric leaves
    pub delta: f64,
    pub exclude_paths: Vec<String>,
    pub exclude_regex_paths: Vec<Regex>,
}

impl DiffOptions {
    pub fn new(delta: f64) -> Self {
        Self {
            delta,
            ..Default::default()
        }
    }

    fn excluded(&self, path: &str) -> bool {
        self.exclude_paths.iter().any(|p| p == path)
            || self.exclude_regex_paths.iter().any(|r| r.is_match(path))
    }
}

/// Structural diff of `expected` against `actual`.
///
/// Numbers compare across integer/float, NaN equals NaN and numeric leaves
/// within `delta` are equal.
pub fn diff(expected: &Value, actual: &Value, options: &DiffOptions) -> Vec<Difference> {
    let mut differences = Vec::new();
    walk(expected, actual, "root".to_string(), options, &mut differences);
    differences
}

fn walk(expected: &Value, actual: &Value, path: String, options: &DiffOptions, out: &mut Vec<Difference>) {
    if options.excluded(&path) {
        return;
    }

    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => {
            for (key, item) in e {
                let child = format!("{}['{}']", path, key);
                match a.get(key) {
                    Some(other) => walk(item, other, child, options, out),
                    None if !options.excluded(&child) => out.push(Difference {
                        path: child,
                        kind: ChangeKind::DictionaryItemRemoved,
                        expected: Some(item.clone()),
                        actual: None,
                    }),
                    None => {}
                }
            }
            for (key, item) in a {
                let child = format!("{}['{}']", path, key);
                if !e.contains_key(key) && !options.excluded(&child) {
                    out.push(Difference {
                        path: child,
                        kind: ChangeKind::DictionaryItemAdded,
                        expected: None,
                        actual: Some(item.clone()),
                    });
                }
            }
        }
        (Value::Array(e), Value::Array(a)) => {
            for (i, item) in e.iter().enumerate() {
                let child = format!("{}[{}]", path, i);
                match a.get(i) {
                    Some(other) => walk(item, other, child, options, out),
                    None => out.push(Difference {
                        path: child,
                        kind: ChangeKind::IterableItemRemoved,
                        expected: Some(item.clone()),
                        actual: None,
                    }),
                }
            }
            for (i, item) in a.iter().enumerate().skip(e.len()) {
                out.push(Difference {
                    path: format!("{}[{}]", path, i),
                    kind: ChangeKind::IterableItemAdded,
                    expected: None,
                    actual: Some(item.clone()),
                });
            }
        }
        _ if expected.is_number() && actual.is_number() => {
            if !numbers_close(expected, actual, options.delta) {
                out.push(changed(path, ChangeKind::ValuesChanged, expected, actual));
            }
        }
        _ if std::mem::discriminant(expected) != std::mem::discriminant(actual) => {
            out.push(changed(path, ChangeKind::TypeChanges, expected, actual));
        }
        _ if expected != actual => {
            out.push(changed(path, ChangeKind::ValuesChanged, expected, actual));
        }
        _ => {}
    }
}

fn changed(path: String, kind: ChangeKind, expected: &Value, actual: &Value) -> Difference {
    Difference {
        path,
        kind,
        expected: Some(expected.clone()),
        actual: Some(actual.clone()),
    }
}

/// Leaf equality: exact, both NaN, or within `delta`
pub fn numbers_close(expected: &Value, actual: &Value, delta: f64) -> bool {
    match (expected, actual) {
        (Value::Int(e), Value::Int(a)) => e == a || (*e as f64 - *a as f64).abs() <= delta,
        _ => match (expected.as_f64(), actual.as_f64()) {
            (Some(e), Some(a)) => e == a || (e.is_nan() && a.is_nan()) || (e - a).abs() <= delta,
            _ => false,
        },
    }
}

/// Relative tolerance check with a tiny absolute floor
pub fn approx_eq(expected: f64, actual: f64, rel: f64) -> bool {
    if expected == actual {
        return true;
    }
    if expected.is_infinite() || actual.is_infinite() {
        return false;
    }
    (expected - actual).abs() <= (rel * expected.abs()).max(1e-12)
}

/// Check an expected exception against the captured outcome.
///
/// A mismatching exception kind only produces a warning.
pub fn check_exception(throws: &Throws, outcome: &Result<NativeValue, RunnerError>) -> (Verdict, Option<String>) {
    match outcome {
        Ok(value) => (
            Verdict::Mismatch(format!("Expected an exception, but got {}", value)),
            None,
        ),
        Err(error) => {
            let warning = throws
                .kind()
                .filter(|expected| *expected != error.kind())
                .map(|expected| format!("Expected exception {} but got {}", expected, error.kind()));
            if let Some(message) = &warning {
                warn!("{}", message);
            }
            (Verdict::Match, warning)
        }
    }
}

/// Decode a result and compare it with the expected return value
pub fn check_return_value(
    expected: &Value,
    delta: f64,
    result: NativeValue,
    backend: &dyn BackendAdapter,
    file: &Path,
) -> RunnerResult<Verdict> {
    let decoded = backend.decode_data(result, expected)?;
    let (expected, actual) = prepare_results(backend, file, expected, Some(&decoded))?;
    let actual = actual.unwrap_or_default();

    let verdict = match &expected {
        Value::Object(map) => {
            if !matches!(actual, Value::Object(_)) {
                return Ok(Verdict::Mismatch(format!("Expected a dict but got {}", actual.kind())));
            }
            let mut options = DiffOptions::new(delta);
            if expected.type_tag() == Some("datacube") {
                match REFERENCE_SYSTEM_PATH.as_ref() {
                    Ok(regex) => options.exclude_regex_paths.push(regex.clone()),
                    Err(e) => warn!("Not excluding reference systems from the datacube diff: {}", e),
                }
                options.exclude_paths.push("root['nodata']".to_string());
                if map.get("data").map_or(true, Value::is_null) {
                    options.exclude_paths.push("root['data']".to_string());
                }
            }
            from_differences(diff(&expected, &actual, &options))
        }
        Value::Array(_) => {
            if !matches!(actual, Value::Array(_)) {
                return Ok(Verdict::Mismatch(format!("Expected a list but got {}", actual.kind())));
            }
            from_differences(diff(&expected, &actual, &DiffOptions::new(delta)))
        }
        Value::Float(e) if e.is_nan() => match actual {
            Value::Float(a) if a.is_nan() => Verdict::Match,
            other => Verdict::Mismatch(format!("Got {} instead of NaN", other)),
        },
        Value::Int(_) | Value::Float(_) => match actual.as_f64() {
            None => Verdict::Mismatch(format!(
                "Expected a numerical result but got {} of type {}",
                actual,
                actual.kind()
            )),
            Some(a) if a.is_nan() => Verdict::Mismatch("Got unexpected NaN as result".to_string()),
            Some(a) => {
                let e = expected.as_f64().unwrap_or_default();
                if approx_eq(e, a, delta) {
                    Verdict::Match
                } else {
                    Verdict::Mismatch(format!("Expected {} ± {} but got {}", expected, delta, actual))
                }
            }
        },
        _ if actual == expected => Verdict::Match,
        _ => Verdict::Mismatch(format!("Expected {} but got {}", expected, actual)),
    };
    Ok(verdict)
}

fn from_differences(differences: Vec<Difference>) -> Verdict {
    if differences.is_empty() {
        return Verdict::Match;
    }
    let lines: Vec<String> = differences.iter().map(ToString::to_string).collect();
    Verdict::Mismatch(format!("Differences: {}", lines.join("; ")))
}
