//! Memoized lookup lists stored as one-column CSV files.
//!
//! A [`ListCache`] returns the cached list when its file exists; otherwise
//! it computes the list, persists it and returns it. There is no expiry:
//! delete the file (or pass `refresh`) to recompute.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::table::{Cell, Table};
use crate::types::{StatError, StatResult};

/// A single labeled column cached on disk.
#[derive(Debug, Clone)]
pub struct ListCache {
    path: PathBuf,
    column: String,
}

impl ListCache {
    pub fn new(path: impl Into<PathBuf>, column: &str) -> Self {
        Self {
            path: path.into(),
            column: column.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached list. A missing file is `Ok(None)`, not an error.
    pub fn load(&self) -> StatResult<Option<Vec<String>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut rdr = csv::Reader::from_path(&self.path)?;
        let idx = rdr
            .headers()?
            .iter()
            .position(|h| h == self.column)
            .ok_or_else(|| {
                StatError::Shape(format!(
                    "{} has no `{}` column",
                    self.path.display(),
                    self.column
                ))
            })?;

        let mut values = Vec::new();
        for record in rdr.records() {
            let record = record?;
            values.push(record.get(idx).unwrap_or_default().to_string());
        }
        Ok(Some(values))
    }

    /// Overwrite the cache file with `values`.
    pub fn store(&self, values: &[String]) -> StatResult<()> {
        let mut table = Table::new([self.column.as_str()]);
        for value in values {
            table.push_row(vec![Cell::text(value.as_str())])?;
        }
        table.write_csv(&self.path)
    }

    /// Return the cached list, or compute, persist and return it.
    ///
    /// With `refresh` set the file is ignored and rewritten.
    pub async fn get_or_insert_with<F, Fut>(
        &self,
        refresh: bool,
        compute: F,
    ) -> StatResult<Vec<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StatResult<Vec<String>>>,
    {
        if !refresh {
            if let Some(values) = self.load()? {
                tracing::debug!(
                    "loaded {} {} from {}",
                    values.len(),
                    self.column,
                    self.path.display()
                );
                return Ok(values);
            }
        }

        let values = compute().await?;
        self.store(&values)?;
        tracing::info!(
            "cached {} {} to {}",
            values.len(),
            self.column,
            self.path.display()
        );
        Ok(values)
    }
}
