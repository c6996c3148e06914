//! Core types for proctest

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;
use crate::value::Value;

/// Default numeric tolerance for return value checks
pub const DEFAULT_DELTA: f64 = 1e-10;

/// Conformance tier of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Level {
    L1,
    L2,
    L2A,
    L3,
    L4,
}

impl Default for Level {
    /// Processes without an explicit level belong to the last tier
    fn default() -> Self {
        Self::L4
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L1" => Ok(Level::L1),
            "L2" => Ok(Level::L2),
            "L2A" => Ok(Level::L2A),
            "L3" => Ok(Level::L3),
            "L4" => Ok(Level::L4),
            _ => Err(Error::UnknownLevel(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::L1 => write!(f, "L1"),
            Level::L2 => write!(f, "L2"),
            Level::L2A => write!(f, "L2A"),
            Level::L3 => write!(f, "L3"),
            Level::L4 => write!(f, "L4"),
        }
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Expected exception of a test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Throws {
    /// `throws: true` (any exception) or `throws: false` (none expected)
    Flag(bool),
    /// Name of the expected exception kind
    Kind(String),
}

impl Throws {
    /// Whether the case declares that an exception is expected
    pub fn expects_exception(&self) -> bool {
        match self {
            Throws::Flag(flag) => *flag,
            Throws::Kind(kind) => !kind.is_empty(),
        }
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Throws::Kind(kind) => Some(kind),
            Throws::Flag(_) => None,
        }
    }
}

/// A single example invocation of a process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub arguments: IndexMap<String, Value>,

    /// Expected return value; `Some(Value::Null)` when declared as `null`
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub returns: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throws: Option<Throws>,

    /// Companion processes that must be supported for the case to be meaningful
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<bool>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl TestCase {
    pub fn expects_exception(&self) -> bool {
        self.throws.as_ref().is_some_and(Throws::expects_exception)
    }

    pub fn expects_return(&self) -> bool {
        self.returns.is_some()
    }

    pub fn delta(&self) -> f64 {
        self.delta.unwrap_or(DEFAULT_DELTA)
    }
}

/// A process with its conformance metadata and test cases
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessDefinition {
    pub process_id: String,
    pub level: Level,
    pub experimental: bool,
    /// Raw definition document (parameters, returns, categories, ...)
    pub metadata: Value,
    pub tests: Vec<TestCase>,
    /// File the definition was loaded from
    pub path: PathBuf,
}

impl ProcessDefinition {
    /// Effective level of a case: case override, then process level
    pub fn case_level(&self, case: &TestCase) -> Level {
        case.level.unwrap_or(self.level)
    }

    /// Effective experimental flag of a case: case override, then process flag
    pub fn case_experimental(&self, case: &TestCase) -> bool {
        case.experimental.unwrap_or(self.experimental)
    }
}

/// Process description as advertised by a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<bool>,
}

impl ProcessSpec {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub optional: bool,
}

impl ParameterSpec {
    /// Names of the parameters a callback passed to this parameter receives
    pub fn callback_parameters(&self) -> Vec<String> {
        let schemas = match &self.schema {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        };
        schemas
            .into_iter()
            .filter(|schema| schema.get("subtype").and_then(Value::as_str) == Some("process-graph"))
            .filter_map(|schema| schema.get("parameters").and_then(Value::as_array))
            .flatten()
            .filter_map(|p| p.get("name").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}
