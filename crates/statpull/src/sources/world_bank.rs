//! World Bank indicators API v2.
//!
//! Responses are `[page_info, records]` with already-denormalized records,
//! so reshaping is just flattening the nested `country` object and tagging
//! every row with the indicator.

use serde_json::{Map, Value};

use super::persist;
use crate::config::SourceConfig;
use crate::http_client::HttpClient;
use crate::table::{Cell, Table};
use crate::types::{DatasetRequest, StatError, StatResult};

pub const INDICATOR_COLUMN: &str = "indicator";
pub const INDICATOR_NAME_COLUMN: &str = "indicator_name";
pub const COUNTRY_ID_COLUMN: &str = "country_id";
pub const COUNTRY_NAME_COLUMN: &str = "country_name";

/// Error payloads come back as `[{"message": [{"value": ".."}]}]`.
fn upstream_message(body: &Value) -> Option<String> {
    body.get(0)?
        .get("message")?
        .as_array()?
        .iter()
        .filter_map(|m| m.get("value").and_then(Value::as_str))
        .next()
        .map(str::to_string)
}

fn nested_text<'a>(
    record: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> StatResult<&'a Value> {
    record
        .get(key)
        .and_then(|v| v.get(field))
        .ok_or_else(|| StatError::Shape(format!("record has no `{key}.{field}`")))
}

/// Flatten `country` into `country_id`/`country_name` at the end of the record.
fn flatten_record(record: &Value) -> StatResult<Vec<(String, Cell)>> {
    let record = record
        .as_object()
        .ok_or_else(|| StatError::shape("record is not an object"))?;

    let country_id = Cell::from_json(nested_text(record, "country", "id")?);
    let country_name = Cell::from_json(nested_text(record, "country", "value")?);

    let mut fields: Vec<(String, Cell)> = record
        .iter()
        .filter(|(k, _)| k.as_str() != "country")
        .map(|(k, v)| (k.clone(), Cell::from_json(v)))
        .collect();
    fields.push((COUNTRY_ID_COLUMN.to_string(), country_id));
    fields.push((COUNTRY_NAME_COLUMN.to_string(), country_name));
    Ok(fields)
}

/// Reshape a World Bank body into a flat table tagged with `indicator`.
pub fn reshape(indicator: &str, body: &Value) -> StatResult<Table> {
    let records = match body.get(1) {
        Some(Value::Array(records)) => records,
        _ => {
            return Err(StatError::Shape(match upstream_message(body) {
                Some(msg) => format!("no records: {msg}"),
                None => "expected [page_info, records]".to_string(),
            }))
        }
    };
    let first = records
        .first()
        .ok_or_else(|| StatError::shape("response contains no records"))?;
    let first = first
        .as_object()
        .ok_or_else(|| StatError::shape("record is not an object"))?;
    let indicator_name = Cell::from_json(nested_text(first, "indicator", "value")?);

    let flat = records
        .iter()
        .map(flatten_record)
        .collect::<StatResult<Vec<_>>>()?;

    // Union of keys in order of first appearance
    let mut columns: Vec<String> = Vec::new();
    for record in &flat {
        for (key, _) in record {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    let indicator_idx = match columns.iter().position(|c| c == INDICATOR_COLUMN) {
        Some(i) => i,
        None => {
            columns.push(INDICATOR_COLUMN.to_string());
            columns.len() - 1
        }
    };
    columns.push(INDICATOR_NAME_COLUMN.to_string());

    let mut table = Table::new(columns.clone());
    for record in flat {
        let mut row = vec![Cell::Null; columns.len()];
        for (key, cell) in record {
            if let Some(i) = columns.iter().position(|c| *c == key) {
                row[i] = cell;
            }
        }
        row[indicator_idx] = Cell::text(indicator);
        row[columns.len() - 1] = indicator_name.clone();
        table.push_row(row)?;
    }
    Ok(table)
}

/// World Bank connector.
pub struct WorldBank {
    http: HttpClient,
    config: SourceConfig,
}

impl WorldBank {
    pub fn new(http: HttpClient, config: SourceConfig) -> Self {
        Self { http, config }
    }

    /// Pull one indicator for all countries.
    ///
    /// Pagination size and frequency travel in `request.params`
    /// (`per_page`, `freq`); only the first page is read.
    pub async fn fetch(&self, request: &DatasetRequest) -> StatResult<Table> {
        tracing::info!("pulling data from World Bank: {}", request.dataset);
        let url = format!("{}{}", self.config.base_url, request.dataset);
        let body = self.http.get_json(&url, &request.params).await?;

        tracing::info!("processing data");
        let table = reshape(&request.dataset, &body)?;
        tracing::debug!("{} rows x {} columns", table.len(), table.columns().len());

        if request.write {
            persist(&table, &self.config.output_path(&request.dataset))?;
        }
        Ok(table)
    }
}
