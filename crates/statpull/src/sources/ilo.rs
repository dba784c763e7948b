//! ILO SDMX REST API (`format=jsondata`).
//!
//! ## Layout
//!
//! `data.structures[0]` describes the series dimensions, the time
//! dimension, per-observation attributes and per-series units as ordered
//! code lists. `data.dataSets[0].series` maps `"i:j:k"` series keys to
//! observations keyed by time position, each an array
//! `[value, attr_1, attr_2, ..]` of positional indices.
//!
//! ## Output
//!
//! One row per (series, time) pair. Every dimension is emitted twice: once
//! resolved against value ids and once against value names.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::persist;
use crate::config::SourceConfig;
use crate::http_client::HttpClient;
use crate::table::{Cell, Table};
use crate::types::{DatasetRequest, StatError, StatResult};

pub const DATASET_CODE_COLUMN: &str = "DS";
pub const DATASET_NAME_COLUMN: &str = "Dataset";
pub const VALUE_COLUMN: &str = "Value";

/// Empty filter segments appended after a country code.
const COUNTRY_FILTER_SUFFIX: &str = ".....";

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Data,
}

#[derive(Debug, Deserialize)]
struct Data {
    structures: Vec<RawStructure>,
    #[serde(rename = "dataSets")]
    data_sets: Vec<RawDataSet>,
}

#[derive(Debug, Deserialize)]
struct RawStructure {
    name: Value,
    dimensions: RawDimensions,
    attributes: RawAttributes,
}

#[derive(Debug, Deserialize)]
struct RawDimensions {
    series: Vec<RawComponent>,
    observation: Vec<RawComponent>,
}

#[derive(Debug, Deserialize)]
struct RawAttributes {
    #[serde(default)]
    observation: Vec<RawComponent>,
    #[serde(default)]
    series: Vec<RawComponent>,
}

#[derive(Debug, Deserialize)]
struct RawComponent {
    id: String,
    #[serde(default)]
    name: Value,
    #[serde(default)]
    values: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawDataSet {
    series: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    observations: Map<String, Value>,
}

/// SDMX names are either plain strings or `{lang: text}` maps.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("en")
            .or_else(|| map.values().next())
            .map(text_of)
            .unwrap_or_default(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A dimension with parallel id and name label lists.
#[derive(Debug, Clone, PartialEq)]
pub struct IloDimension {
    pub id: String,
    pub name: String,
    pub value_ids: Vec<String>,
    pub value_names: Vec<String>,
}

impl IloDimension {
    fn from_raw(raw: &RawComponent) -> Self {
        let field = |v: &Map<String, Value>, key: &str| v.get(key).map(text_of).unwrap_or_default();
        Self {
            id: raw.id.clone(),
            name: text_of(&raw.name),
            value_ids: raw.values.iter().map(|v| field(v, "id")).collect(),
            value_names: raw.values.iter().map(|v| field(v, "name")).collect(),
        }
    }
}

/// An observation-level attribute whose cells are positional indices.
#[derive(Debug, Clone, PartialEq)]
pub struct IloAttribute {
    pub id: String,
    pub labels: Vec<Cell>,
}

impl IloAttribute {
    /// Resolve an index cell to its label; anything else passes through.
    fn resolve(&self, cell: Cell) -> Cell {
        if self.labels.is_empty() {
            return cell;
        }
        match cell {
            Cell::Int(i) if i >= 0 && (i as usize) < self.labels.len() => {
                self.labels[i as usize].clone()
            }
            other => other,
        }
    }
}

/// Decoded metadata from `structures[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IloStructure {
    pub name: String,
    /// Series dimensions followed by the time dimension.
    pub dimensions: Vec<IloDimension>,
    pub attributes: Vec<IloAttribute>,
    /// Series-level unit id and its constant label.
    pub units: Vec<(String, Cell)>,
}

impl IloStructure {
    fn from_raw(raw: &RawStructure) -> StatResult<Self> {
        let time = raw
            .dimensions
            .observation
            .first()
            .ok_or_else(|| StatError::shape("structure has no observation dimension"))?;

        let mut dimensions: Vec<IloDimension> =
            raw.dimensions.series.iter().map(IloDimension::from_raw).collect();
        dimensions.push(IloDimension::from_raw(time));

        let attributes = raw
            .attributes
            .observation
            .iter()
            .map(|a| IloAttribute {
                id: a.id.clone(),
                labels: a
                    .values
                    .iter()
                    .map(|v| v.values().next().map(Cell::from_json).unwrap_or(Cell::Null))
                    .collect(),
            })
            .collect();

        let units = raw
            .attributes
            .series
            .iter()
            .map(|u| {
                let label = u
                    .values
                    .first()
                    .and_then(|v| v.get("name"))
                    .map(|n| Cell::Text(text_of(n)))
                    .unwrap_or(Cell::Null);
                (u.id.clone(), label)
            })
            .collect();

        Ok(Self {
            name: text_of(&raw.name),
            dimensions,
            attributes,
            units,
        })
    }

    /// Dimension id to its ordered value ids.
    pub fn dimension_ids(&self) -> Vec<(String, Vec<String>)> {
        self.dimensions
            .iter()
            .map(|d| (d.id.clone(), d.value_ids.clone()))
            .collect()
    }

    /// Output column order: code, name, (id, name) per dimension, units,
    /// value, attributes.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![
            DATASET_CODE_COLUMN.to_string(),
            DATASET_NAME_COLUMN.to_string(),
        ];
        for dim in &self.dimensions {
            columns.push(dim.id.clone());
            columns.push(dim.name.clone());
        }
        columns.extend(self.units.iter().map(|(id, _)| id.clone()));
        columns.push(VALUE_COLUMN.to_string());
        columns.extend(self.attributes.iter().map(|a| a.id.clone()));
        columns
    }
}

/// Parse only the structure metadata of a response.
pub fn parse_structure(body: &Value) -> StatResult<IloStructure> {
    let envelope = Envelope::deserialize(body)?;
    let raw = envelope
        .data
        .structures
        .first()
        .ok_or_else(|| StatError::shape("response has no structures"))?;
    IloStructure::from_raw(raw)
}

/// Reshape an SDMX-JSON body into one row per observation.
pub fn reshape(dataset: &str, body: &Value) -> StatResult<Table> {
    let envelope = Envelope::deserialize(body)?;
    let raw = envelope
        .data
        .structures
        .first()
        .ok_or_else(|| StatError::shape("response has no structures"))?;
    let structure = IloStructure::from_raw(raw)?;
    let data_set = envelope
        .data
        .data_sets
        .first()
        .ok_or_else(|| StatError::shape("response has no dataSets"))?;

    let mut table = Table::new(structure.columns());
    for (series_key, series) in &data_set.series {
        let series = RawSeries::deserialize(series)?;
        for (time_key, observation) in &series.observations {
            let key = format!("{series_key}:{time_key}");
            let row = observation_row(dataset, &structure, &key, observation)?;
            table.push_row(row)?;
        }
    }
    Ok(table)
}

fn observation_row(
    dataset: &str,
    structure: &IloStructure,
    key: &str,
    observation: &Value,
) -> StatResult<Vec<Cell>> {
    let positions: Vec<&str> = key.split(':').collect();
    if positions.len() != structure.dimensions.len() {
        return Err(StatError::Shape(format!(
            "key {key:?} has {} parts, expected {}",
            positions.len(),
            structure.dimensions.len()
        )));
    }

    let cells: &[Value] = match observation {
        Value::Array(items) => items,
        Value::Null => &[],
        other => std::slice::from_ref(other),
    };
    let cell_at = |i: usize| cells.get(i).map(Cell::from_json).unwrap_or(Cell::Null);

    let mut row = vec![
        Cell::text(dataset),
        Cell::text(structure.name.as_str()),
    ];
    for (dim, pos) in structure.dimensions.iter().zip(&positions) {
        let index = pos.parse::<usize>().ok();
        let resolve = |labels: &[String]| {
            index
                .and_then(|i| labels.get(i))
                .cloned()
                .unwrap_or_else(|| pos.to_string())
        };
        row.push(Cell::Text(resolve(&dim.value_ids)));
        row.push(Cell::Text(resolve(&dim.value_names)));
    }
    row.extend(structure.units.iter().map(|(_, unit)| unit.clone()));
    row.push(cell_at(0));
    for (k, attr) in structure.attributes.iter().enumerate() {
        row.push(attr.resolve(cell_at(k + 1)));
    }
    Ok(row)
}

/// ILO connector.
pub struct Ilo {
    http: HttpClient,
    config: SourceConfig,
}

impl Ilo {
    pub fn new(http: HttpClient, config: SourceConfig) -> Self {
        Self { http, config }
    }

    /// `{base}{dataset}` or `{base}{dataset}/{country}.....`
    pub fn url(&self, dataset: &str, country: Option<&str>) -> String {
        match country {
            Some(country) => format!(
                "{}{dataset}/{country}{COUNTRY_FILTER_SUFFIX}",
                self.config.base_url
            ),
            None => format!("{}{dataset}", self.config.base_url),
        }
    }

    /// Pull `request.dataset`, optionally filtered to one country.
    ///
    /// Returns the assembled observation table.
    pub async fn fetch(
        &self,
        request: &DatasetRequest,
        country: Option<&str>,
    ) -> StatResult<Table> {
        tracing::info!("pulling data from ILO: {}", request.dataset);
        let url = self.url(&request.dataset, country);
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({"data": {
            "structures": [{
                "name": "Employment by sex",
                "dimensions": {
                    "series": [
                        {"id": "REF_AREA", "name": "Reference area", "values": [
                            {"id": "AUT", "name": "Austria"},
                            {"id": "BEL", "name": "Belgium"}
                        ]},
                        {"id": "SEX", "name": "Sex", "values": [
                            {"id": "SEX_T", "name": "Total"},
                            {"id": "SEX_F", "name": "Female"}
                        ]}
                    ],
                    "observation": [
                        {"id": "TIME_PERIOD", "name": "Time", "values": [
                            {"id": "2014", "name": "2014"},
                            {"id": "2015", "name": "2015"}
                        ]}
                    ]
                },
                "attributes": {
                    "observation": [
                        {"id": "OBS_STATUS", "values": [{"id": "B", "name": "Break"}]},
                        {"id": "NOTE", "values": []}
                    ],
                    "series": [
                        {"id": "UNIT_MEASURE", "values": [{"id": "NB", "name": "Number"}]}
                    ]
                }
            }],
            "dataSets": [{
                "series": {
                    "0:1": {"observations": {"0": [4021.5, 0, 7], "1": [4050.0, null, null]}},
                    "1:0": {"observations": {"1": [5000]}}
                }
            }]
        }})
    }

    #[test]
    fn test_column_order() {
        let table = reshape("EMP_TEMP_SEX_NB", &sample()).unwrap();
        assert_eq!(
            table.columns(),
            [
                "DS",
                "Dataset",
                "REF_AREA",
                "Reference area",
                "SEX",
                "Sex",
                "TIME_PERIOD",
                "Time",
                "UNIT_MEASURE",
                "Value",
                "OBS_STATUS",
                "NOTE"
            ]
        );
    }

    #[test]
    fn test_rows_resolve_ids_and_names() {
        let table = reshape("EMP_TEMP_SEX_NB", &sample()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.rows()[0],
            vec![
                Cell::text("EMP_TEMP_SEX_NB"),
                Cell::text("Employment by sex"),
                Cell::text("AUT"),
                Cell::text("Austria"),
                Cell::text("SEX_F"),
                Cell::text("Female"),
                Cell::text("2014"),
                Cell::text("2014"),
                Cell::text("Number"),
                Cell::Float(4021.5),
                Cell::text("B"),
                Cell::Int(7),
            ]
        );
        let last = &table.rows()[2];
        assert_eq!(last[2], Cell::text("BEL"));
        assert_eq!(last[7], Cell::text("2015"));
        assert_eq!(last[9], Cell::Int(5000));
        assert!(last[10].is_null());
        assert!(last[11].is_null());
    }

    #[test]
    fn test_id_and_name_columns_pair_up() {
        let body = sample();
        let structure = parse_structure(&body).unwrap();
        let table = reshape("X", &body).unwrap();
        for (d, dim) in structure.dimensions.iter().enumerate() {
            let id_col = 2 + 2 * d;
            for row in table.rows() {
                let id = row[id_col].as_str().unwrap();
                let name = row[id_col + 1].as_str().unwrap();
                let pos = dim.value_ids.iter().position(|v| v == id).unwrap();
                assert_eq!(dim.value_names[pos], name);
            }
        }
    }

    #[test]
    fn test_dimension_ids() {
        let structure = parse_structure(&sample()).unwrap();
        let ids = structure.dimension_ids();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[2], ("TIME_PERIOD".to_string(), vec!["2014".to_string(), "2015".to_string()]));
    }

    #[test]
    fn test_localized_names() {
        assert_eq!(text_of(&json!({"fr": "Sexe", "en": "Sex"})), "Sex");
        assert_eq!(text_of(&json!({"fr": "Sexe"})), "Sexe");
    }

    #[test]
    fn test_key_width_mismatch() {
        let mut body = sample();
        body["data"]["dataSets"][0]["series"] = json!({"0": {"observations": {"0": [1]}}});
        assert!(matches!(reshape("X", &body), Err(StatError::Shape(_))));
    }

    #[test]
    fn test_missing_data_sets() {
        let mut body = sample();
        body["data"]["dataSets"] = json!([]);
        assert!(matches!(reshape("X", &body), Err(StatError::Shape(_))));
    }
}
