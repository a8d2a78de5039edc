use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES};
use crate::error::ProviderError;

/// One heterogeneous table cell. `Missing` is the explicit sentinel for
/// NaN, null, NaT and non-finite values crossing the worker boundary —
/// they are never silently coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Build a numeric cell, collapsing non-finite values to `Missing`.
    pub fn number(value: f64) -> Self {
        if value.is_finite() {
            Cell::Number(value)
        } else {
            Cell::Missing
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Numeric view of a cell. Textual cells are parsed since upstream
    /// tables arrive stringly typed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Number(_) => None,
            Cell::Integer(i) => Some(*i as f64),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Cell::Bool(_) | Cell::Missing => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Ordered named columns plus ordered rows. An empty table is a valid
/// success state, distinct from a failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl TabularResult {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    pub fn numeric(&self, row: usize, column: &str) -> Option<f64> {
        self.cell(row, column)?.as_f64()
    }

    pub fn text(&self, row: usize, column: &str) -> Option<&str> {
        self.cell(row, column)?.as_str()
    }
}

/// What a successful invocation yields: a table or a plain scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FetchPayload {
    Table(TabularResult),
    Scalar(String),
}

impl FetchPayload {
    pub fn into_table(self) -> Result<TabularResult, ProviderError> {
        match self {
            FetchPayload::Table(t) => Ok(t),
            FetchPayload::Scalar(s) => Err(ProviderError::InvalidData(format!(
                "expected tabular payload, got scalar: {s}"
            ))),
        }
    }

    pub fn as_table(&self) -> Option<&TabularResult> {
        match self {
            FetchPayload::Table(t) => Some(t),
            FetchPayload::Scalar(_) => None,
        }
    }
}

/// One external call, owned by the caller for the duration of the call.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub endpoint: String,
    pub params: Map<String, Value>,
    pub timeout_override: Option<Duration>,
    pub max_retries: u32,
    pub backoff_base: f64,
}

impl InvocationRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Map::new(),
            timeout_override: None,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_override = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_backoff_base(mut self, base: f64) -> Self {
        self.backoff_base = base;
        self
    }
}

/// One daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Normalized per-share figures from one annual report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub report_date: NaiveDate,
    /// Diluted earnings per share.
    pub eps: Option<f64>,
    /// Book value per share, pre-adjustment.
    pub bps: Option<f64>,
    /// Operating cash flow per share.
    pub cashflow_ps: Option<f64>,
    pub weighted_eps: Option<f64>,
    /// EPS excluding non-recurring items.
    pub deducted_eps: Option<f64>,
    pub adjusted_bps: Option<f64>,
    pub capital_reserve_ps: Option<f64>,
    pub undistributed_profit_ps: Option<f64>,
    /// Net profit growth rate, percent.
    pub growth_rate: Option<f64>,
    /// Return on equity, percent.
    pub roe: Option<f64>,
}

impl FinancialRecord {
    pub fn empty(report_date: NaiveDate) -> Self {
        Self {
            report_date,
            eps: None,
            bps: None,
            cashflow_ps: None,
            weighted_eps: None,
            deducted_eps: None,
            adjusted_bps: None,
            capital_reserve_ps: None,
            undistributed_profit_ps: None,
            growth_rate: None,
            roe: None,
        }
    }
}

/// Annual reports keyed by fiscal year.
pub type ReportSet = BTreeMap<i32, FinancialRecord>;

/// One row of the as-of join. Either the strictly-prior report is attached
/// or the financial side is absent entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPoint {
    pub trade_date: NaiveDate,
    pub close: f64,
    pub report_year: Option<i32>,
    pub record: Option<FinancialRecord>,
}
