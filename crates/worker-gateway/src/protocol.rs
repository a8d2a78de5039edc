use provider_core::{Cell, ErrorKind, FetchPayload, ProviderError, TabularResult};
use serde::Deserialize;
use serde_json::Value;

use crate::classify::{call_failure, classify_failure};

/// One line of worker stdout. The worker always reports through this
/// envelope; anything else on stdout is a process failure.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerResponse {
    pub success: bool,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}

impl WorkerResponse {
    /// Convert a parsed envelope into a payload or a classified error.
    pub fn into_payload(self) -> Result<FetchPayload, ProviderError> {
        if !self.success {
            let message = self
                .error
                .unwrap_or_else(|| "worker reported failure without a message".to_string());
            let kind = match self.error_type.as_deref() {
                Some("ValueError") | Some("ValidationError") | Some("TypeError") => {
                    ErrorKind::Validation
                }
                _ => classify_failure(&message),
            };
            return Err(call_failure(kind, message));
        }

        match self.kind.as_deref() {
            Some("table") | Some("dataframe") => {
                let columns = self.columns.unwrap_or_default();
                let rows = match self.data {
                    Some(Value::Array(raw_rows)) => raw_rows
                        .into_iter()
                        .map(|row| match row {
                            Value::Array(cells) => {
                                Ok(cells.into_iter().map(value_to_cell).collect())
                            }
                            other => Err(ProviderError::InvalidData(format!(
                                "table row is not an array: {other}"
                            ))),
                        })
                        .collect::<Result<Vec<Vec<Cell>>, _>>()?,
                    Some(other) => {
                        return Err(ProviderError::InvalidData(format!(
                            "table payload has non-array data: {other}"
                        )))
                    }
                    None => Vec::new(),
                };
                for (idx, row) in rows.iter().enumerate() {
                    if row.len() != columns.len() {
                        return Err(ProviderError::InvalidData(format!(
                            "row {idx} has {} cells for {} columns",
                            row.len(),
                            columns.len()
                        )));
                    }
                }
                Ok(FetchPayload::Table(TabularResult { columns, rows }))
            }
            Some("scalar") | Some("value") | None => {
                let scalar = match self.data {
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                Ok(FetchPayload::Scalar(scalar))
            }
            Some(other) => Err(ProviderError::InvalidData(format!(
                "unknown payload type from worker: {other}"
            ))),
        }
    }
}

/// Pandas leaks several spellings of "no value" through JSON. All of
/// them become [`Cell::Missing`] here, at the boundary.
fn value_to_cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Missing,
        Value::Bool(b) => Cell::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Cell::number(f)
            } else {
                Cell::Missing
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty()
                || trimmed.eq_ignore_ascii_case("nan")
                || trimmed == "NaT"
                || trimmed == "None"
            {
                Cell::Missing
            } else {
                Cell::Text(s)
            }
        }
        // nested structures are not part of the tabular contract
        other => Cell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(raw: Value) -> WorkerResponse {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_table_payload() {
        let response = parse(json!({
            "success": true,
            "type": "dataframe",
            "columns": ["日期", "收盘"],
            "data": [["2024-01-02", 10.5], ["2024-01-03", null]]
        }));
        let table = response.into_payload().unwrap().into_table().unwrap();
        assert_eq!(table.columns, vec!["日期", "收盘"]);
        assert_eq!(table.numeric(0, "收盘"), Some(10.5));
        assert!(table.cell(1, "收盘").unwrap().is_missing());
    }

    #[test]
    fn test_missing_sentinels_normalized() {
        assert!(value_to_cell(json!("nan")).is_missing());
        assert!(value_to_cell(json!("NaT")).is_missing());
        assert!(value_to_cell(json!("None")).is_missing());
        assert!(value_to_cell(json!("")).is_missing());
        assert_eq!(value_to_cell(json!("nancy")), Cell::Text("nancy".to_string()));
    }

    #[test]
    fn test_ragged_row_rejected() {
        let response = parse(json!({
            "success": true,
            "type": "table",
            "columns": ["a", "b"],
            "data": [["only one"]]
        }));
        let err = response.into_payload().unwrap_err();
        assert!(matches!(err, ProviderError::InvalidData(_)));
    }

    #[test]
    fn test_scalar_payload() {
        let response = parse(json!({
            "success": true,
            "type": "scalar",
            "data": "12.34"
        }));
        match response.into_payload().unwrap() {
            FetchPayload::Scalar(s) => assert_eq!(s, "12.34"),
            other => panic!("expected scalar, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_classified_from_message() {
        let response = parse(json!({
            "success": false,
            "error": "read timed out after 300s"
        }));
        let err = response.into_payload().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_callee_validation_not_retryable() {
        let response = parse(json!({
            "success": false,
            "error": "unknown period 'hourly'",
            "error_type": "ValueError"
        }));
        let err = response.into_payload().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
    }
}
