//! Datacube processes

use proctest_common::{isostr_to_datetime, Value};

use super::math::label;
use super::{callback, optional, required, spec, Args, LocalBackend};
use crate::error::{RunnerError, RunnerResult};
use crate::native::{Dimension, DimensionType, LabeledArray, NativeMap, NativeValue};

pub(super) fn register(backend: &mut LocalBackend) {
    backend.register(
        spec(
            "apply",
            "Apply a process to each value",
            vec![required("data"), callback("process", &["x", "context"]), optional("context")],
        ),
        apply,
    );
    backend.register(
        spec(
            "reduce_dimension",
            "Reduce dimensions",
            vec![
                required("data"),
                callback("reducer", &["data", "context"]),
                required("dimension"),
                optional("context"),
            ],
        ),
        reduce_dimension,
    );
    backend.register(
        spec(
            "dimension_labels",
            "Get the dimension labels",
            vec![required("data"), required("dimension")],
        ),
        dimension_labels,
    );
    backend.register(
        spec(
            "add_dimension",
            "Add a new dimension",
            vec![required("data"), required("name"), required("label"), optional("type")],
        ),
        add_dimension,
    );
    backend.register(
        spec(
            "drop_dimension",
            "Remove a dimension",
            vec![required("data"), required("name")],
        ),
        drop_dimension,
    );
}

fn dimension_not_available(name: &str) -> RunnerError {
    RunnerError::process(
        "DimensionNotAvailable",
        format!("A dimension with the specified name '{}' does not exist.", name),
    )
}

fn apply(backend: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let mut cube = args.cube("data")?;
    let process = args.callback("process")?;
    let context = args.take("context");

    cube.data = std::mem::take(&mut cube.data)
        .into_iter()
        .map(|x| {
            let mut params = NativeMap::new();
            params.insert("x".to_string(), x);
            params.insert("context".to_string(), context.clone());
            backend.run_callback(&process, params)
        })
        .collect::<RunnerResult<Vec<_>>>()?;
    Ok(NativeValue::Cube(cube))
}

/// Row-major multi-index of a flat offset
fn unravel(mut offset: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (i, len) in shape.iter().enumerate().rev() {
        if *len > 0 {
            index[i] = offset % len;
            offset /= len;
        }
    }
    index
}

fn reduce_dimension(backend: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let mut cube = args.cube("data")?;
    let reducer = args.callback("reducer")?;
    let dimension = args.string("dimension")?;
    let context = args.take("context");

    let axis = cube
        .dimension_index(&dimension)
        .ok_or_else(|| dimension_not_available(&dimension))?;
    let shape = cube.shape();
    let strides = cube.strides();
    let reduced = cube.dimensions.remove(axis);

    let other_axes: Vec<usize> = (0..shape.len()).filter(|&i| i != axis).collect();
    let out_shape: Vec<usize> = other_axes.iter().map(|&i| shape[i]).collect();
    let out_size: usize = out_shape.iter().product();

    let mut data = Vec::with_capacity(out_size);
    for out in 0..out_size {
        let index = unravel(out, &out_shape);
        let base: usize = other_axes
            .iter()
            .zip(&index)
            .map(|(&dim, &i)| i * strides[dim])
            .sum();

        let values = (0..shape[axis])
            .map(|k| cube.data[base + k * strides[axis]].clone())
            .collect();
        let mut params = NativeMap::new();
        params.insert(
            "data".to_string(),
            NativeValue::LabeledArray(LabeledArray {
                labels: reduced.labels.clone(),
                values,
            }),
        );
        params.insert("context".to_string(), context.clone());

        let value = match backend.run_callback(&reducer, params)? {
            NativeValue::List(mut items) if items.len() == 1 => items.remove(0),
            NativeValue::List(_) | NativeValue::LabeledArray(_) | NativeValue::Cube(_) => {
                return Err(args.invalid("reducer", "the reducer must return a single value"))
            }
            value => value,
        };
        data.push(value);
    }

    cube.data = data;
    Ok(NativeValue::Cube(cube))
}

fn dimension_labels(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let cube = args.cube("data")?;
    let dimension = args.string("dimension")?;
    let index = cube
        .dimension_index(&dimension)
        .ok_or_else(|| dimension_not_available(&dimension))?;
    Ok(NativeValue::List(
        cube.dimensions[index].labels.iter().map(label).collect(),
    ))
}

fn add_dimension(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let mut cube = args.cube("data")?;
    let name = args.string("name")?;
    let label = args.take("label").to_value();
    let kind = match args.optional("type") {
        Some(NativeValue::String(kind)) => DimensionType::parse(Some(&kind)),
        Some(other) => return Err(args.invalid("type", format!("expected string, got {}", other.kind()))),
        None => DimensionType::Other,
    };

    if cube.dimension_index(&name).is_some() {
        return Err(RunnerError::process(
            "DimensionExists",
            format!("A dimension with the specified name '{}' exists already.", name),
        ));
    }

    let label = match label {
        Value::String(s) if kind == DimensionType::Temporal => isostr_to_datetime(&s)
            .map(Value::DateTime)
            .map_err(|e| args.invalid("label", e))?,
        other => other,
    };
    // A trailing axis of length one keeps the row-major data layout
    cube.dimensions.push(Dimension::new(name, kind, vec![label]));
    Ok(NativeValue::Cube(cube))
}

fn drop_dimension(_: &LocalBackend, args: &mut Args) -> RunnerResult<NativeValue> {
    let mut cube = args.cube("data")?;
    let name = args.string("name")?;
    let index = cube
        .dimension_index(&name)
        .ok_or_else(|| dimension_not_available(&name))?;
    if cube.dimensions[index].labels.len() > 1 {
        return Err(RunnerError::process(
            "DimensionLabelCountMismatch",
            "The number of dimension labels exceeds one, which requires a reducer.",
        ));
    }
    cube.dimensions.remove(index);
    Ok(NativeValue::Cube(cube))
}
