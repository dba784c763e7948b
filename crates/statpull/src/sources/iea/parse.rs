//! Cleaning and pivoting of the IEA results table.

use scraper::{ElementRef, Html, Selector};

use crate::table::{Cell, Table};
use crate::types::{StatError, StatResult};

/// Header of the fuel column in the long-form table.
pub const FUEL_COLUMN: &str = "fuel";

/// Columns of the long-form IEA table.
pub const COLUMNS: [&str; 5] = ["country", "year", "flow", FUEL_COLUMN, "value"];

fn selector(css: &str) -> StatResult<Selector> {
    Selector::parse(css).map_err(|e| StatError::Parse(format!("bad selector {css:?}: {e}")))
}

fn cell_texts(row: ElementRef<'_>, cells: &Selector) -> Vec<String> {
    row.select(cells)
        .map(|c| c.text().collect::<String>().trim().to_string())
        .collect()
}

/// Turn one scraped cell into a number.
///
/// All whitespace is removed first ("1 234" is 1234.0) and a blank cell
/// counts as zero.
pub fn clean_cell(text: &str) -> StatResult<f64> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Ok(0.0);
    }
    compact
        .parse::<f64>()
        .map_err(|_| StatError::Parse(format!("table cell {text:?} is not numeric")))
}

/// The results table as rendered: flows down, fuels across.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub fuels: Vec<String>,
    pub rows: Vec<(String, Vec<f64>)>,
}

impl WideTable {
    /// Pivot to one row per flow x fuel tagged with `country` and `year`.
    pub fn to_long(&self, country: &str, year: &str) -> StatResult<Table> {
        let mut table = Table::new(COLUMNS);
        for (flow, values) in &self.rows {
            for (fuel, value) in self.fuels.iter().zip(values) {
                table.push_row(vec![
                    Cell::text(country),
                    Cell::text(year),
                    Cell::text(flow.as_str()),
                    Cell::text(fuel.as_str()),
                    Cell::Float(*value),
                ])?;
            }
        }
        Ok(table)
    }
}

/// Parse the outer HTML of the results table.
///
/// The header row names the fuels (its first cell heads the flow column).
/// The first body row holds units rather than values and is dropped.
pub fn parse_table(html: &str) -> StatResult<WideTable> {
    let doc = Html::parse_fragment(html);
    let head_rows = selector("thead tr")?;
    let body_rows = selector("tbody tr")?;
    let cells = selector("th, td")?;

    let mut body: Vec<ElementRef<'_>> = doc.select(&body_rows).collect();
    let header = match doc.select(&head_rows).next() {
        Some(row) => row,
        None if !body.is_empty() => body.remove(0),
        None => return Err(StatError::shape("results table has no rows")),
    };

    let fuels: Vec<String> = cell_texts(header, &cells).into_iter().skip(1).collect();
    if fuels.is_empty() {
        return Err(StatError::shape("results table has no fuel columns"));
    }

    let mut rows = Vec::new();
    for row in body.into_iter().skip(1) {
        let texts = cell_texts(row, &cells);
        let Some((flow, values)) = texts.split_first() else {
            continue;
        };
        let mut numbers = Vec::with_capacity(fuels.len());
        for i in 0..fuels.len() {
            numbers.push(clean_cell(values.get(i).map(String::as_str).unwrap_or(""))?);
        }
        rows.push((flow.clone(), numbers));
    }

    Ok(WideTable { fuels, rows })
}
