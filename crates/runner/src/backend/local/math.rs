//! Arithmetic, comparison, logic and array processes

use proctest_common::{isostr_to_datetime, ParameterSpec, Timestamp, Value};
use std::cmp::Ordering;

use super::{callback, optional, required, spec, Args, LocalBackend};
use crate::error::{RunnerError, RunnerResult};
use crate::native::{NativeMap, NativeValue};

pub(super) fn register(backend: &mut LocalBackend) {
    let xy = || vec![required("x"), required("y")];

    backend.register(spec("add", "Addition of two numbers", xy()), add);
    backend.register(spec("subtract", "Subtraction of two numbers", xy()), subtract);
    backend.register(spec("multiply", "Multiplication of two numbers", xy()), multiply);
    backend.register(spec("divide", "Division of two numbers", xy()), divide);
    backend.register(spec("absolute", "Absolute value", vec![required("x")]), absolute);
    backend.register(spec("sqrt", "Square root", vec![required("x")]), sqrt);
    backend.register(
        spec("power", "Exponentiation", vec![required("base"), required("p")]),
        power,
    );

    let comparison = || vec![required("x"), required("y")];
    let equality = || vec![required("x"), required("y"), optional("delta"), optional("case_sensitive")];
    backend.register(spec("eq", "Equal to comparison", equality()), eq);
    backend.register(spec("neq", "Not equal to comparison", equality()), neq);
    backend.register(spec("gt", "Greater than comparison", comparison()), gt);
    backend.register(spec("gte", "Greater than or equal to comparison", comparison()), gte);
    backend.register(spec("lt", "Less than comparison", comparison()), lt);
    backend.register(spec("lte", "Less than or equal to comparison", comparison()), lte);

    backend.register(spec("and", "Logical AND", xy()), and);
    backend.register(spec("or", "Logical OR", xy()), or);
    backend.register(spec("xor", "Logical XOR (exclusive or)", xy()), xor);
    backend.register(spec("not", "Inverting a boolean", vec![required("x")]), not);

    let reducer = || vec![required("data"), optional("ignore_nodata")];
    backend.register(spec("sum", "Compute the sum by adding up numbers", reducer()), sum);
    backend.register(spec("product", "Compute the product by multiplying numbers", reducer()), product);
    backend.register(spec("mean", "Arithmetic mean (average)", reducer()), mean);
    backend.register(spec("median", "Statistical median", reducer()), median);
    backend.register(spec("min", "Minimum value", reducer()), min);
    backend.register(spec("max", "Maximum value", reducer()), max);
    backend.register(
        spec(
            "count",
            "Count the number of elements",
            vec![
                required("data"),
                ParameterSpec {
                    optional: true,
                    ..callback("condition", &["x", "context"])
                },
                optional("context"),
            ],
        ),
        count,
    );
    backend.register(
        spec(
            "array_element",
            "Get an element from an array",
            vec![
                required("data"),
                optional("index"),
                optional("label"),
                optional("return_nodata"),
            ],
        ),
        array_element,
    );
    backend.register(
        spec("array_labels", "Get the labels for an array", vec![required("data")]),
        array_labels,
    );
    backend.register(spec("is_nan", "Value is not a number", vec![required("x")]), is_nan);
    backend.register(spec("is_nodata", "Value is a no-data value", vec![required("x")]), is_nodata);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn native(self) -> NativeValue {
        match self {
            Num::Int(i) => NativeValue::Int(i),
            Num::Float(f) => NativeValue::Float(f),
        }
    }

    fn from_native(value: &NativeValue) -> Option<Num> {
        match value {
            NativeValue::Int(i) => Some(Num::Int(*i)),
            NativeValue::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }
}

/// Numeric argument; null reads as `None`
fn number(args: &mut Args, name: &str) -> RunnerResult<Option<Num>> {
    match args.take(name) {
        NativeValue::Null => Ok(None),
        value => Num::from_native(&value)
            .map(Some)
            .ok_or_else(|| args.invalid(name, format!("expected number, got {}", value.kind()))),
    }
}

fn binary(
    args: &mut Args,
    (a, b): (&str, &str),
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> RunnerResult<NativeValue> {
    let x = number(args, a)?;
    let y = number(args, b)?;
    Ok(match (x, y) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => match int_op(x, y) {
            Some(result) => NativeValue::Int(result),
            None => NativeValue::Float(float_op(x as f64, y as f64)),
        },
        (Some(x), Some(y)) => NativeValue::Float(float_op(x.f64(), y.f64())),
        _ => NativeValue::Null,
    })
}

fn add(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    binary(args, ("x", "y"), i64::checked_add, |x, y| x + y)
}

fn subtract(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    binary(args, ("x", "y"), i64::checked_sub, |x, y| x - y)
}

fn multiply(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    binary(args, ("x", "y"), i64::checked_mul, |x, y| x * y)
}

/// Division by zero yields +/- infinity (or NaN for 0/0)
fn divide(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    binary(args, ("x", "y"), |_, _| None, |x, y| x / y)
}

fn power(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    binary(
        args,
        ("base", "p"),
        |base, p| u32::try_from(p).ok().and_then(|p| base.checked_pow(p)),
        f64::powf,
    )
}

fn absolute(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    Ok(match number(args, "x")? {
        Some(Num::Int(x)) => x
            .checked_abs()
            .map(NativeValue::Int)
            .unwrap_or(NativeValue::Float((x as f64).abs())),
        Some(Num::Float(x)) => NativeValue::Float(x.abs()),
        None => NativeValue::Null,
    })
}

fn sqrt(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    Ok(match number(args, "x")? {
        Some(x) => NativeValue::Float(x.f64().sqrt()),
        None => NativeValue::Null,
    })
}

fn equals(x: &NativeValue, y: &NativeValue, delta: Option<f64>, case_sensitive: bool) -> Option<bool> {
    if x.is_null() || y.is_null() {
        return None;
    }
    let equal = match (Num::from_native(x), Num::from_native(y)) {
        (Some(a), Some(b)) => match delta {
            Some(delta) => (a.f64() - b.f64()).abs() <= delta,
            None => a.f64() == b.f64(),
        },
        _ => match (x, y) {
            (NativeValue::String(a), NativeValue::String(b)) if !case_sensitive => {
                a.to_lowercase() == b.to_lowercase()
            }
            (NativeValue::String(a), NativeValue::String(b)) => match (timestamp(x), timestamp(y)) {
                (Some(ta), Some(tb)) => ta == tb,
                _ => a == b,
            },
            (NativeValue::Bool(a), NativeValue::Bool(b)) => a == b,
            (NativeValue::DateTime(_), _) | (_, NativeValue::DateTime(_)) => {
                matches!((timestamp(x), timestamp(y)), (Some(a), Some(b)) if a == b)
            }
            _ => false,
        },
    };
    Some(equal)
}

fn equality_args(args: &mut Args) -> RunnerResult<(NativeValue, NativeValue, Option<f64>, bool)> {
    let x = args.take("x");
    let y = args.take("y");
    let delta = number(args, "delta")?.map(Num::f64);
    let case_sensitive = args.flag("case_sensitive", true)?;
    Ok((x, y, delta, case_sensitive))
}

fn optional_bool(value: Option<bool>) -> NativeValue {
    value.map(NativeValue::Bool).unwrap_or(NativeValue::Null)
}

fn eq(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let (x, y, delta, case_sensitive) = equality_args(args)?;
    Ok(optional_bool(equals(&x, &y, delta, case_sensitive)))
}

fn neq(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let (x, y, delta, case_sensitive) = equality_args(args)?;
    Ok(optional_bool(equals(&x, &y, delta, case_sensitive).map(|eq| !eq)))
}

fn timestamp(value: &NativeValue) -> Option<Timestamp> {
    match value {
        NativeValue::DateTime(ts) => Some(*ts),
        NativeValue::String(s) => isostr_to_datetime(s).ok(),
        _ => None,
    }
}

/// Ordering of numbers or temporal values; anything else is unordered
fn order(x: &NativeValue, y: &NativeValue) -> Option<Ordering> {
    match (Num::from_native(x), Num::from_native(y)) {
        (Some(a), Some(b)) => a.f64().partial_cmp(&b.f64()),
        _ => match (timestamp(x)?, timestamp(y)?) {
            (Timestamp::Zoned(a), Timestamp::Zoned(b)) => Some(a.cmp(&b)),
            (Timestamp::Naive(a), Timestamp::Naive(b)) => Some(a.cmp(&b)),
            (Timestamp::Zoned(a), Timestamp::Naive(b)) => Some(a.naive_utc().cmp(&b)),
            (Timestamp::Naive(a), Timestamp::Zoned(b)) => Some(a.cmp(&b.naive_utc())),
        },
    }
}

fn compare(args: &mut Args, accept: fn(Ordering) -> bool) -> RunnerResult<NativeValue> {
    let x = args.take("x");
    let y = args.take("y");
    if x.is_null() || y.is_null() {
        return Ok(NativeValue::Null);
    }
    Ok(NativeValue::Bool(order(&x, &y).is_some_and(accept)))
}

fn gt(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    compare(args, Ordering::is_gt)
}

fn gte(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    compare(args, Ordering::is_ge)
}

fn lt(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    compare(args, Ordering::is_lt)
}

fn lte(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    compare(args, Ordering::is_le)
}

fn boolean(args: &mut Args, name: &str) -> RunnerResult<Option<bool>> {
    match args.take(name) {
        NativeValue::Null => Ok(None),
        NativeValue::Bool(b) => Ok(Some(b)),
        other => Err(args.invalid(name, format!("expected boolean, got {}", other.kind()))),
    }
}

fn and(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let x = boolean(args, "x")?;
    let y = boolean(args, "y")?;
    Ok(optional_bool(match (x, y) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }))
}

fn or(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let x = boolean(args, "x")?;
    let y = boolean(args, "y")?;
    Ok(optional_bool(match (x, y) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }))
}

fn xor(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let x = boolean(args, "x")?;
    let y = boolean(args, "y")?;
    Ok(optional_bool(x.zip(y).map(|(x, y)| x != y)))
}

fn not(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    Ok(optional_bool(boolean(args, "x")?.map(|x| !x)))
}

/// Elements of a plain or labeled array
fn array(args: &mut Args, name: &str) -> RunnerResult<Vec<NativeValue>> {
    match args.take(name) {
        NativeValue::List(items) => Ok(items),
        NativeValue::LabeledArray(array) => Ok(array.values),
        other => Err(args.invalid(name, format!("expected array, got {}", other.kind()))),
    }
}

/// Numbers of `data`, or `None` when nodata is present and not ignored
fn valid_numbers(args: &mut Args) -> RunnerResult<Option<Vec<Num>>> {
    let values = array(args, "data")?;
    let ignore_nodata = args.flag("ignore_nodata", true)?;

    let mut numbers = Vec::with_capacity(values.len());
    for value in &values {
        if value.is_null() || value.is_nan() {
            if ignore_nodata {
                continue;
            }
            return Ok(None);
        }
        match Num::from_native(value) {
            Some(n) => numbers.push(n),
            None => return Err(args.invalid("data", format!("expected numbers, got {}", value.kind()))),
        }
    }
    Ok(Some(numbers).filter(|n| !n.is_empty()))
}

fn fold(numbers: &[Num], int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> NativeValue {
    let Some((first, rest)) = numbers.split_first() else {
        return NativeValue::Null;
    };
    let mut acc = *first;
    for n in rest {
        acc = match (acc, *n) {
            (Num::Int(a), Num::Int(b)) => int_op(a, b)
                .map(Num::Int)
                .unwrap_or(Num::Float(float_op(a as f64, b as f64))),
            (a, b) => Num::Float(float_op(a.f64(), b.f64())),
        };
    }
    acc.native()
}

fn sum(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    Ok(valid_numbers(args)?
        .map(|n| fold(&n, i64::checked_add, |a, b| a + b))
        .unwrap_or_default())
}

fn product(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    Ok(valid_numbers(args)?
        .map(|n| fold(&n, i64::checked_mul, |a, b| a * b))
        .unwrap_or_default())
}

fn mean(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    Ok(valid_numbers(args)?
        .map(|n| NativeValue::Float(n.iter().map(|x| x.f64()).sum::<f64>() / n.len() as f64))
        .unwrap_or_default())
}

fn median(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let Some(numbers) = valid_numbers(args)? else {
        return Ok(NativeValue::Null);
    };
    let mut sorted: Vec<f64> = numbers.iter().map(|n| n.f64()).collect();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    Ok(NativeValue::Float(median))
}

fn extreme(args: &mut Args, wanted: Ordering) -> RunnerResult<NativeValue> {
    let Some(numbers) = valid_numbers(args)? else {
        return Ok(NativeValue::Null);
    };
    let best = numbers.into_iter().reduce(|best, n| {
        if n.f64().total_cmp(&best.f64()) == wanted {
            n
        } else {
            best
        }
    });
    Ok(best.map(Num::native).unwrap_or_default())
}

fn min(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    extreme(args, Ordering::Less)
}

fn max(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    extreme(args, Ordering::Greater)
}

/// Valid elements by default, all elements for `condition: true`, or the
/// elements a callback condition accepts
fn count(backend: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let values = array(args, "data")?;
    let context = args.take("context");
    let counted = match args.take("condition") {
        NativeValue::Null => values.iter().filter(|v| !v.is_null() && !v.is_nan()).count(),
        NativeValue::Bool(true) => values.len(),
        NativeValue::Callback(condition) => {
            let mut counted = 0;
            for value in values {
                let mut params = NativeMap::new();
                params.insert("x".to_string(), value);
                params.insert("context".to_string(), context.clone());
                if backend.run_callback(&condition, params)? == NativeValue::Bool(true) {
                    counted += 1;
                }
            }
            counted
        }
        other => {
            return Err(args.invalid(
                "condition",
                format!("expected true or a process graph, got {}", other.kind()),
            ))
        }
    };
    Ok(NativeValue::Int(counted as i64))
}

fn array_element(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let data = args.take("data");
    let index = args.optional("index");
    let label = args.optional("label");
    let return_nodata = args.flag("return_nodata", false)?;

    let element = match (index, label) {
        (Some(_), Some(_)) => {
            return Err(RunnerError::process(
                "ArrayElementParameterConflict",
                "The process 'array_element' only allows that either the 'index' or the 'labels' parameter is set.",
            ))
        }
        (None, None) => {
            return Err(RunnerError::process(
                "ArrayElementParameterMissing",
                "The process 'array_element' requires either the 'index' or 'labels' parameter to be set.",
            ))
        }
        (Some(index), None) => {
            let index = match index {
                NativeValue::Int(i) if i >= 0 => i as usize,
                other => return Err(args.invalid("index", format!("expected non-negative integer, got {}", other))),
            };
            match &data {
                NativeValue::List(items) => items.get(index).cloned(),
                NativeValue::LabeledArray(array) => array.values.get(index).cloned(),
                other => return Err(args.invalid("data", format!("expected array, got {}", other.kind()))),
            }
        }
        (None, Some(label)) => match &data {
            NativeValue::LabeledArray(array) => array.get_label(&label.to_value()).cloned(),
            NativeValue::List(_) => {
                return Err(RunnerError::process(
                    "ArrayNotLabeled",
                    "The array is not a labeled array, but the `label` parameter is set. Use the `index` instead.",
                ))
            }
            other => return Err(args.invalid("data", format!("expected array, got {}", other.kind()))),
        },
    };

    match element {
        Some(element) => Ok(element),
        None if return_nodata => Ok(NativeValue::Null),
        None => Err(RunnerError::process(
            "ArrayElementNotAvailable",
            "The array has no element with the specified index or label.",
        )),
    }
}

fn array_labels(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    match args.take("data") {
        NativeValue::LabeledArray(array) => Ok(NativeValue::List(array.labels.iter().map(label).collect())),
        NativeValue::List(items) => Ok(NativeValue::List(
            (0..items.len() as i64).map(NativeValue::Int).collect(),
        )),
        other => Err(args.invalid("data", format!("expected array, got {}", other.kind()))),
    }
}

/// Labels are returned in their JSON form, timestamps as ISO strings
pub(super) fn label(label: &Value) -> NativeValue {
    match label {
        Value::DateTime(ts) => NativeValue::String(ts.to_isostr()),
        other => NativeValue::from_value(other.clone()),
    }
}

fn is_nan(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let x = args.take("x");
    Ok(NativeValue::Bool(match Num::from_native(&x) {
        Some(n) => n.f64().is_nan(),
        None => true,
    }))
}

fn is_nodata(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let x = args.take("x");
    Ok(NativeValue::Bool(x.is_null() || x.is_nan()))
}

#[cfg(test)]
mod tests {
    use crate::backend::{BackendAdapter, LocalBackend};
    use crate::native::{NativeMap, NativeValue};
    use proctest_common::Value;
    use test_case::test_case;

    fn run(process_id: &str, source: &str) -> Result<Value, String> {
        let backend = LocalBackend::new();
        let mut arguments = NativeMap::new();
        if let Value::Object(map) = Value::from_json5_str(source).unwrap() {
            for (name, value) in map {
                let native = match value.type_tag() {
                    Some("labeled-array") => backend.encode_labeled_array(&value).unwrap(),
                    _ => NativeValue::from_value(value),
                };
                arguments.insert(name, native);
            }
        }
        backend
            .execute(process_id, arguments)
            .map(|v| v.to_value())
            .map_err(|e| e.kind().to_string())
    }

    fn value(source: &str) -> Value {
        Value::from_json5_str(source).unwrap()
    }

    #[test_case("add", "{x: 0, y: 0}", "0" ; "add zeros")]
    #[test_case("add", "{x: 1.5, y: 2}", "3.5" ; "add mixed")]
    #[test_case("add", "{x: null, y: 2}", "null" ; "add null")]
    #[test_case("subtract", "{x: 5, y: 7}", "-2" ; "subtract")]
    #[test_case("multiply", "{x: -2, y: 2.5}", "-5.0" ; "multiply")]
    #[test_case("divide", "{x: 1, y: 0}", "Infinity" ; "divide by zero")]
    #[test_case("divide", "{x: 5, y: 2}", "2.5" ; "divide")]
    #[test_case("absolute", "{x: -3}", "3" ; "absolute int")]
    #[test_case("power", "{base: 2, p: 10}", "1024" ; "power int")]
    #[test_case("power", "{base: 4, p: 0.5}", "2.0" ; "power float")]
    #[test_case("sqrt", "{x: 9}", "3.0" ; "sqrt")]
    fn test_arithmetic(process_id: &str, arguments: &str, expected: &str) {
        assert_eq!(run(process_id, arguments), Ok(value(expected)));
    }

    #[test_case("eq", "{x: 1, y: 1.0}", "true" ; "eq numeric types")]
    #[test_case("eq", "{x: 1, y: 1.1, delta: 0.2}", "true" ; "eq delta")]
    #[test_case("eq", "{x: 'Test', y: 'test', case_sensitive: false}", "true" ; "eq case insensitive")]
    #[test_case("eq", "{x: '2020-01-01T00:00:00Z', y: '2020-01-01T01:00:00+01:00'}", "true" ; "eq temporal")]
    #[test_case("eq", "{x: 1, y: null}", "null" ; "eq null")]
    #[test_case("neq", "{x: true, y: false}", "true" ; "neq")]
    #[test_case("gt", "{x: 2, y: 1}", "true" ; "gt")]
    #[test_case("gt", "{x: 'a', y: 1}", "false" ; "gt unordered")]
    #[test_case("lte", "{x: '2020-01-01', y: '2021-01-01'}", "true" ; "lte temporal")]
    #[test_case("and", "{x: null, y: false}", "false" ; "and null false")]
    #[test_case("and", "{x: null, y: true}", "null" ; "and null true")]
    #[test_case("or", "{x: null, y: true}", "true" ; "or null true")]
    #[test_case("xor", "{x: true, y: false}", "true" ; "xor")]
    #[test_case("not", "{x: null}", "null" ; "not null")]
    fn test_comparison_and_logic(process_id: &str, arguments: &str, expected: &str) {
        assert_eq!(run(process_id, arguments), Ok(value(expected)));
    }

    #[test_case("sum", "{data: [1, 2, null, 3]}", "6" ; "sum skips nodata")]
    #[test_case("sum", "{data: [1, NaN], ignore_nodata: false}", "null" ; "sum keeps nodata")]
    #[test_case("sum", "{data: []}", "null" ; "sum empty")]
    #[test_case("product", "{data: [2, 3, 4]}", "24" ; "product")]
    #[test_case("mean", "{data: [1, 0, 3, 2]}", "1.5" ; "mean")]
    #[test_case("median", "{data: [1, 3, 3, 6, 7, 8, 9]}", "6.0" ; "median odd")]
    #[test_case("median", "{data: [1, 2, 3, 4, 5, 6, 8, 9]}", "4.5" ; "median even")]
    #[test_case("min", "{data: [1, 0, 3, 2]}", "0" ; "min")]
    #[test_case("max", "{data: [-1, -5.5, null]}", "-1" ; "max")]
    #[test_case("count", "{data: [1, 0, null, 2]}", "3" ; "count valid")]
    #[test_case("count", "{data: [1, 0, null, 2], condition: true}", "4" ; "count all")]
    fn test_reducers(process_id: &str, arguments: &str, expected: &str) {
        assert_eq!(run(process_id, arguments), Ok(value(expected)));
    }

    #[test_case("{data: [9, 8, 7], index: 2}", Ok("7") ; "by index")]
    #[test_case("{data: [9, 8], index: 5, return_nodata: true}", Ok("null") ; "nodata")]
    #[test_case("{data: [9, 8], index: 5}", Err("ArrayElementNotAvailable") ; "out of range")]
    #[test_case("{data: [9, 8]}", Err("ArrayElementParameterMissing") ; "missing")]
    #[test_case("{data: [9], index: 0, label: 'a'}", Err("ArrayElementParameterConflict") ; "conflict")]
    #[test_case("{data: [9], label: 'a'}", Err("ArrayNotLabeled") ; "not labeled")]
    #[test_case(
        "{data: {type: 'labeled-array', data: [{key: 'B1', value: 1}, {key: 'B2', value: 2}]}, label: 'B2'}",
        Ok("2") ; "by label"
    )]
    fn test_array_element(arguments: &str, expected: Result<&str, &str>) {
        let expected = expected.map(value).map_err(str::to_string);
        assert_eq!(run("array_element", arguments), expected);
    }

    #[test]
    fn test_array_labels() {
        assert_eq!(run("array_labels", "{data: [5, 6]}"), Ok(value("[0, 1]")));
        assert_eq!(
            run(
                "array_labels",
                "{data: {type: 'labeled-array', data: [{key: 'a', value: 1}, {key: 'b', value: 2}]}}"
            ),
            Ok(value("['a', 'b']"))
        );
    }

    #[test]
    fn test_nan_and_nodata_checks() {
        assert_eq!(run("is_nan", "{x: NaN}"), Ok(Value::Bool(true)));
        assert_eq!(run("is_nan", "{x: 1}"), Ok(Value::Bool(false)));
        assert_eq!(run("is_nan", "{x: 'Test'}"), Ok(Value::Bool(true)));
        assert_eq!(run("is_nodata", "{x: null}"), Ok(Value::Bool(true)));
        assert_eq!(run("is_nodata", "{x: NaN}"), Ok(Value::Bool(true)));
        assert_eq!(run("is_nodata", "{x: 0}"), Ok(Value::Bool(false)));
    }
}
