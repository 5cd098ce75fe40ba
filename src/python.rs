use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use pyo3::IntoPyObjectExt;
use serde::Serialize;
use serde_json::Value;

use crate::column::ColumnDef;
use crate::field::{self, FieldType};
use crate::record::RowData;
use crate::view::{self, ViewParams};
use crate::{config, writeback};

// --- Helpers ---

fn json_to_py(py: Python<'_>, value: Value) -> PyResult<PyObject> {
    match value {
        Value::Null => Ok(py.None()),
        Value::Bool(b) => b.into_py_any(py),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into_py_any(py)
            } else if let Some(f) = n.as_f64() {
                f.into_py_any(py)
            } else {
                n.to_string().into_py_any(py)
            }
        }
        Value::String(s) => s.into_py_any(py),
        Value::Array(arr) => {
            let list = PyList::empty(py);
            for item in arr {
                list.append(json_to_py(py, item)?)?;
            }
            Ok(list.into())
        }
        Value::Object(map) => {
            let dict = PyDict::new(py);
            for (k, v) in map {
                dict.set_item(k, json_to_py(py, v)?)?;
            }
            Ok(dict.into())
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> PyResult<T> {
    serde_json::from_str(text).map_err(|e| PyValueError::new_err(format!("invalid {}: {}", what, e)))
}

fn to_py<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let val = serde_json::to_value(value).map_err(|e| PyValueError::new_err(e.to_string()))?;
    json_to_py(py, val)
}

// --- Bindings ---

#[pyfunction]
fn decode_field(field_type: &str, raw_json: &str) -> PyResult<String> {
    let raw: Value = parse_json(raw_json, "field value")?;
    Ok(field::decode(&FieldType::from_tag(field_type), &raw))
}

#[pyfunction]
fn format_display(field_type: &str, value: &str) -> String {
    field::format_display(&FieldType::from_tag(field_type), value)
}

#[pyfunction]
fn build_update(
    py: Python<'_>,
    property_name: &str,
    field_type: &str,
    value: &str,
) -> PyResult<PyObject> {
    let payload = writeback::build_update(property_name, &FieldType::from_tag(field_type), value);
    to_py(py, &payload)
}

#[pyfunction]
fn derive_view(
    py: Python<'_>,
    rows_json: &str,
    columns_json: &str,
    params_json: &str,
) -> PyResult<PyObject> {
    let rows: Vec<RowData> = parse_json(rows_json, "rows")?;
    let columns: Vec<ColumnDef> = parse_json(columns_json, "columns")?;
    let params: ViewParams = parse_json(params_json, "view parameters")?;
    let groups = view::derive_view(&rows, &columns, &params);
    to_py(py, &groups)
}

#[pyfunction]
fn normalize_collection_id(value: &str) -> String {
    config::normalize_collection_id(value)
}

/// A Python module implemented in Rust.
#[pymodule]
fn _dbmirror_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(decode_field, m)?)?;
    m.add_function(wrap_pyfunction!(format_display, m)?)?;
    m.add_function(wrap_pyfunction!(build_update, m)?)?;
    m.add_function(wrap_pyfunction!(derive_view, m)?)?;
    m.add_function(wrap_pyfunction!(normalize_collection_id, m)?)?;
    Ok(())
}
