//! Eurostat dissemination API (JSON-stat).
//!
//! The response carries every dimension's category labels plus a sparse
//! `value` object keyed by the flat position in the label cross-product.
//! Only positions present in `value` become rows.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::persist;
use crate::config::SourceConfig;
use crate::http_client::HttpClient;
use crate::table::{Cell, Table};
use crate::types::{DatasetRequest, StatError, StatResult};

/// Name of the observation column.
pub const VALUE_COLUMN: &str = "Value";

#[derive(Debug, Deserialize)]
struct Response {
    dimension: Map<String, Value>,
    value: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Dimension {
    category: Category,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(default)]
    index: Option<Value>,
    label: Map<String, Value>,
}

impl Category {
    fn label_of(&self, code: &str) -> String {
        match self.label.get(code) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => code.to_string(),
        }
    }

    /// Labels in category position order.
    fn ordered_labels(&self) -> StatResult<Vec<String>> {
        match &self.index {
            Some(Value::Object(index)) => {
                let mut positions = Vec::with_capacity(index.len());
                for (code, pos) in index {
                    let pos = pos.as_u64().ok_or_else(|| {
                        StatError::shape(format!("category index for {code} is not an integer"))
                    })?;
                    positions.push((pos, code.as_str()));
                }
                positions.sort();
                Ok(positions.into_iter().map(|(_, c)| self.label_of(c)).collect())
            }
            Some(Value::Array(codes)) => Ok(codes
                .iter()
                .map(|c| match c {
                    Value::String(code) => self.label_of(code),
                    other => other.to_string(),
                })
                .collect()),
            _ => Ok(self.label.keys().map(|code| self.label_of(code)).collect()),
        }
    }
}

/// Row-major decoder for positions in the label cross-product.
struct CrossProduct {
    labels: Vec<Vec<String>>,
    strides: Vec<u64>,
    len: u64,
}

impl CrossProduct {
    fn new(labels: Vec<Vec<String>>) -> StatResult<Self> {
        let mut strides = vec![0u64; labels.len()];
        let mut len = 1u64;
        for (i, dim) in labels.iter().enumerate().rev() {
            strides[i] = len;
            len = len
                .checked_mul(dim.len() as u64)
                .ok_or_else(|| StatError::shape("dimension cross-product overflows"))?;
        }
        Ok(Self {
            labels,
            strides,
            len,
        })
    }

    /// Labels at flat position `n`; the last dimension varies fastest.
    fn row(&self, n: u64) -> Vec<Cell> {
        if n >= self.len {
            return vec![Cell::Null; self.labels.len()];
        }
        self.labels
            .iter()
            .zip(&self.strides)
            .map(|(dim, stride)| {
                let i = (n / stride) % dim.len() as u64;
                Cell::Text(dim[i as usize].clone())
            })
            .collect()
    }
}

/// Reshape a JSON-stat body into one row per value present.
///
/// Columns are the dimension ids in response order followed by `Value`.
pub fn reshape(body: &Value) -> StatResult<Table> {
    let response = Response::deserialize(body)?;

    let mut columns = Vec::with_capacity(response.dimension.len() + 1);
    let mut labels = Vec::with_capacity(response.dimension.len());
    for (id, dim) in &response.dimension {
        let dim = Dimension::deserialize(dim)?;
        columns.push(id.clone());
        labels.push(dim.category.ordered_labels()?);
    }
    columns.push(VALUE_COLUMN.to_string());
    let product = CrossProduct::new(labels)?;

    let mut values = Vec::with_capacity(response.value.len());
    for (key, value) in &response.value {
        let n: u64 = key
            .parse()
            .map_err(|_| StatError::shape(format!("value key {key:?} is not an index")))?;
        values.push((n, Cell::from_json(value)));
    }
    values.sort_by_key(|(n, _)| *n);

    let mut table = Table::new(columns);
    for (n, value) in values {
        let mut row = product.row(n);
        row.push(value);
        table.push_row(row)?;
    }
    Ok(table)
}

/// Eurostat connector.
pub struct Eurostat {
    http: HttpClient,
    config: SourceConfig,
}

impl Eurostat {
    pub fn new(http: HttpClient, config: SourceConfig) -> Self {
        Self { http, config }
    }

    /// Pull `request.dataset`, reshape it and optionally write
    /// `{out_dir}/{dataset}.csv`.
    pub async fn fetch(&self, request: &DatasetRequest) -> StatResult<Table> {
        tracing::info!("pulling data from Eurostat: {}", request.dataset);
        let url = format!("{}{}", self.config.base_url, request.dataset);
        let body = self.http.get_json(&url, &request.params).await?;

        tracing::info!("processing data");
        let table = reshape(&body)?;
        tracing::debug!("{} rows x {} columns", table.len(), table.columns().len());

        if request.write {
            persist(&table, &self.config.output_path(&request.dataset))?;
        }
        Ok(table)
    }
}
