//! One connector per upstream source.
//!
//! Each connector fetches, reshapes into a [`Table`](crate::table::Table)
//! and optionally persists. Connectors never call each other.

pub mod eurostat;
pub mod iea;
pub mod ilo;
pub mod world_bank;

use std::path::Path;

use crate::table::Table;
use crate::types::StatResult;

/// Write `table` to `path` as CSV without an index column.
pub(crate) fn persist(table: &Table, path: &Path) -> StatResult<()> {
    tracing::info!("writing CSV to {}", path.display());
    table.write_csv(path)
}
