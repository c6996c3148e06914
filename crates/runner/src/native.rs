//! Backend-native values: the representation arguments are transcoded into
//! and results come back as.

use indexmap::IndexMap;
use proctest_common::{isostr_to_datetime, Map, Timestamp, Value};
use std::fmt;

use crate::error::{RunnerError, RunnerResult};

pub type NativeMap = IndexMap<String, NativeValue>;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum NativeValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(Timestamp),
    List(Vec<NativeValue>),
    Map(NativeMap),
    LabeledArray(LabeledArray),
    Cube(DataCube),
    Callback(Callback),
}

impl NativeValue {
    /// Plain structural conversion, no typed objects are interpreted
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => NativeValue::Null,
            Value::Bool(b) => NativeValue::Bool(b),
            Value::Int(i) => NativeValue::Int(i),
            Value::Float(f) => NativeValue::Float(f),
            Value::String(s) => NativeValue::String(s),
            Value::DateTime(ts) => NativeValue::DateTime(ts),
            Value::Array(items) => {
                NativeValue::List(items.into_iter().map(NativeValue::from_value).collect())
            }
            Value::Object(map) => NativeValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, NativeValue::from_value(v)))
                    .collect(),
            ),
        }
    }

    /// Convert back into the generic JSON-like form
    pub fn to_value(&self) -> Value {
        match self {
            NativeValue::Null => Value::Null,
            NativeValue::Bool(b) => Value::Bool(*b),
            NativeValue::Int(i) => Value::Int(*i),
            NativeValue::Float(f) => Value::Float(*f),
            NativeValue::String(s) => Value::String(s.clone()),
            NativeValue::DateTime(ts) => Value::DateTime(*ts),
            NativeValue::List(items) => Value::Array(items.iter().map(NativeValue::to_value).collect()),
            NativeValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
            NativeValue::LabeledArray(array) => array.to_value(),
            NativeValue::Cube(cube) => cube.to_value(),
            NativeValue::Callback(callback) => {
                let mut map = Map::new();
                map.insert("process_graph".to_string(), Value::Object(callback.graph.clone()));
                Value::Object(map)
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, NativeValue::Float(f) if f.is_nan())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::Int(i) => Some(*i as f64),
            NativeValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "boolean",
            NativeValue::Int(_) => "integer",
            NativeValue::Float(_) => "number",
            NativeValue::String(_) => "string",
            NativeValue::DateTime(_) => "datetime",
            NativeValue::List(_) => "array",
            NativeValue::Map(_) => "object",
            NativeValue::LabeledArray(_) => "labeled-array",
            NativeValue::Cube(_) => "datacube",
            NativeValue::Callback(_) => "process-graph",
        }
    }
}

impl From<f64> for NativeValue {
    fn from(f: f64) -> Self {
        NativeValue::Float(f)
    }
}

impl From<i64> for NativeValue {
    fn from(i: i64) -> Self {
        NativeValue::Int(i)
    }
}

impl From<bool> for NativeValue {
    fn from(b: bool) -> Self {
        NativeValue::Bool(b)
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

/// An array whose elements carry labels
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabeledArray {
    pub labels: Vec<Value>,
    pub values: Vec<NativeValue>,
}

impl LabeledArray {
    /// Encode from `{type: "labeled-array", data: [{key, value}, ...]}`
    pub fn from_value(value: &Value) -> RunnerResult<Self> {
        let entries = value
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("labeled-array", "missing `data` array"))?;

        let mut array = LabeledArray::default();
        for entry in entries {
            let key = entry
                .get("key")
                .ok_or_else(|| invalid("labeled-array", "entry without `key`"))?;
            array.labels.push(key.clone());
            array
                .values
                .push(NativeValue::from_value(entry.get("value").cloned().unwrap_or_default()));
        }
        Ok(array)
    }

    pub fn to_value(&self) -> Value {
        let data = self
            .labels
            .iter()
            .zip(&self.values)
            .map(|(label, value)| {
                let mut entry = Map::new();
                entry.insert("key".to_string(), label.clone());
                entry.insert("value".to_string(), value.to_value());
                Value::Object(entry)
            })
            .collect();

        let mut map = Map::new();
        map.insert("type".to_string(), Value::from("labeled-array"));
        map.insert("data".to_string(), Value::Array(data));
        Value::Object(map)
    }

    pub fn get_label(&self, label: &Value) -> Option<&NativeValue> {
        self.labels
            .iter()
            .position(|l| labels_equal(l, label))
            .and_then(|i| self.values.get(i))
    }
}

/// Labels match across numeric types and between timestamps and ISO strings
pub fn labels_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::DateTime(x), Value::String(s)) | (Value::String(s), Value::DateTime(x)) => {
            isostr_to_datetime(s).map(|y| y == *x).unwrap_or(false)
        }
        _ if a.is_number() && b.is_number() => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

/// An encoded nested process graph
#[derive(Debug, Clone, PartialEq)]
pub struct Callback {
    /// Flat graph: node id to `{process_id, arguments, result?}`
    pub graph: Map,
    /// Parameter names the parent process passes into the callback
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionType {
    Spatial,
    Temporal,
    Bands,
    Other,
}

impl DimensionType {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("spatial") => DimensionType::Spatial,
            Some("temporal") => DimensionType::Temporal,
            Some("bands") => DimensionType::Bands,
            _ => DimensionType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionType::Spatial => "spatial",
            DimensionType::Temporal => "temporal",
            DimensionType::Bands => "bands",
            DimensionType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionType,
    pub axis: Option<String>,
    /// Temporal labels are held as `Value::DateTime`
    pub labels: Vec<Value>,
    pub reference_system: Option<Value>,
}

impl Dimension {
    pub fn new(name: impl Into<String>, kind: DimensionType, labels: Vec<Value>) -> Self {
        let name = name.into();
        let axis = match (kind, name.as_str()) {
            (DimensionType::Spatial, "x") | (DimensionType::Spatial, "y") => Some(name.clone()),
            _ => None,
        };
        Self {
            name,
            kind,
            axis,
            labels,
            reference_system: None,
        }
    }

    fn from_value(name: &str, spec: &Value) -> RunnerResult<Self> {
        let kind = DimensionType::parse(spec.type_tag());
        let raw_labels = spec
            .get("values")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let labels = if kind == DimensionType::Temporal {
            raw_labels
                .into_iter()
                .map(|label| match &label {
                    Value::String(s) => isostr_to_datetime(s)
                        .map(Value::DateTime)
                        .map_err(|e| invalid("datacube", e.to_string())),
                    _ => Ok(label),
                })
                .collect::<RunnerResult<Vec<_>>>()?
        } else {
            raw_labels
        };

        let mut dimension = Dimension::new(name, kind, labels);
        if let Some(axis) = spec.get("axis").and_then(Value::as_str) {
            dimension.axis = Some(axis.to_string());
        }
        dimension.reference_system = spec.get("reference_system").cloned();
        Ok(dimension)
    }

    fn to_value(&self) -> Value {
        let axis = self.axis.clone().or_else(|| match self.name.as_str() {
            "x" | "y" => Some(self.name.clone()),
            _ => None,
        });
        let kind = match (&axis, self.kind) {
            (Some(_), DimensionType::Other) => DimensionType::Spatial,
            (_, kind) => kind,
        };

        let values = self
            .labels
            .iter()
            .map(|label| match label {
                Value::DateTime(ts) => Value::String(ts.to_isostr()),
                other => other.clone(),
            })
            .collect();

        let mut map = Map::new();
        map.insert("type".to_string(), Value::from(kind.as_str()));
        if let Some(axis) = axis {
            map.insert("axis".to_string(), Value::String(axis));
        }
        map.insert("values".to_string(), Value::Array(values));
        if let Some(crs) = &self.reference_system {
            map.insert("reference_system".to_string(), crs.clone());
        }
        Value::Object(map)
    }
}

/// A labeled n-dimensional array, data stored flat in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct DataCube {
    pub dimensions: Vec<Dimension>,
    pub data: Vec<NativeValue>,
    pub nodata: Option<Value>,
}

impl DataCube {
    pub fn new(dimensions: Vec<Dimension>, data: Vec<NativeValue>) -> RunnerResult<Self> {
        let cube = Self {
            dimensions,
            data,
            nodata: None,
        };
        if cube.data.len() != cube.size() {
            return Err(invalid(
                "datacube",
                format!("expected {} values, got {}", cube.size(), cube.data.len()),
            ));
        }
        Ok(cube)
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dimensions.iter().map(|d| d.labels.len()).collect()
    }

    pub fn size(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name == name)
    }

    pub fn dimension_names(&self) -> Vec<String> {
        self.dimensions.iter().map(|d| d.name.clone()).collect()
    }

    /// Row-major strides per dimension
    pub fn strides(&self) -> Vec<usize> {
        let shape = self.shape();
        let mut strides = vec![1; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }
        strides
    }

    /// Encode from the fixture form
    /// `{type: "datacube", order?, dimensions: {name: {...}} | [{name, ...}], data, nodata?}`
    pub fn from_value(value: &Value) -> RunnerResult<Self> {
        let dimensions = match value.get("dimensions") {
            Some(Value::Object(map)) => {
                let order: Vec<String> = match value.get("order").and_then(Value::as_array) {
                    Some(order) => order
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                    None => map.keys().cloned().collect(),
                };
                if order.len() != map.len() || map.keys().any(|name| !order.contains(name)) {
                    return Err(invalid(
                        "datacube",
                        format!("order {:?} does not list all {} dimensions", order, map.len()),
                    ));
                }
                order
                    .iter()
                    .map(|name| {
                        let spec = map
                            .get(name)
                            .ok_or_else(|| invalid("datacube", format!("unknown dimension {:?} in order", name)))?;
                        Dimension::from_value(name, spec)
                    })
                    .collect::<RunnerResult<Vec<_>>>()?
            }
            Some(Value::Array(items)) => items
                .iter()
                .map(|spec| {
                    let name = spec
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| invalid("datacube", "dimension without name"))?;
                    Dimension::from_value(name, spec)
                })
                .collect::<RunnerResult<Vec<_>>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(invalid(
                    "datacube",
                    format!("`dimensions` must be an object or array, got {}", other.kind()),
                ))
            }
        };

        let shape: Vec<usize> = dimensions.iter().map(|d| d.labels.len()).collect();
        let mut data = Vec::with_capacity(shape.iter().product());
        match value.get("data") {
            Some(Value::Null) | None => {
                data.resize(shape.iter().product(), NativeValue::Null);
            }
            Some(nested) => flatten(nested, &shape, &mut data)?,
        }

        let mut cube = DataCube::new(dimensions, data)?;
        cube.nodata = value.get("nodata").cloned();
        Ok(cube)
    }

    /// Decode into the canonical JSON form
    pub fn to_value(&self) -> Value {
        let order = self
            .dimensions
            .iter()
            .map(|d| Value::String(d.name.clone()))
            .collect();
        let dimensions = self
            .dimensions
            .iter()
            .map(|d| (d.name.clone(), d.to_value()))
            .collect();

        let mut map = Map::new();
        map.insert("type".to_string(), Value::from("datacube"));
        map.insert("order".to_string(), Value::Array(order));
        map.insert("dimensions".to_string(), Value::Object(dimensions));
        map.insert("data".to_string(), nest(&self.data, &self.shape()));
        if let Some(nodata) = &self.nodata {
            map.insert("nodata".to_string(), nodata.clone());
        }
        Value::Object(map)
    }
}

fn flatten(value: &Value, shape: &[usize], out: &mut Vec<NativeValue>) -> RunnerResult<()> {
    let Some((&len, rest)) = shape.split_first() else {
        if let Value::Array(_) = value {
            return Err(invalid("datacube", "data is nested deeper than its dimensions"));
        }
        out.push(NativeValue::from_value(value.clone()));
        return Ok(());
    };
    let items = value
        .as_array()
        .ok_or_else(|| invalid("datacube", format!("expected nested array, got {}", value.kind())))?;
    if items.len() != len {
        return Err(invalid(
            "datacube",
            format!("expected {} elements along axis, got {}", len, items.len()),
        ));
    }
    for item in items {
        flatten(item, rest, out)?;
    }
    Ok(())
}

fn nest(values: &[NativeValue], shape: &[usize]) -> Value {
    let Some((&len, rest)) = shape.split_first() else {
        return values.first().map(NativeValue::to_value).unwrap_or_default();
    };
    let chunk: usize = rest.iter().product();
    Value::Array(
        (0..len)
            .map(|i| nest(&values[i * chunk..(i + 1) * chunk], rest))
            .collect(),
    )
}

pub(crate) fn invalid(what: &str, reason: impl fmt::Display) -> RunnerError {
    RunnerError::process("ProcessParameterInvalid", format!("Invalid {}: {}", what, reason))
}
