//! In-memory columnar dataset exchanged at the tabular boundary.
//!
//! Cells are carried as `f64` with the column's original [`DType`] recorded alongside; the
//! dtype survives the round trip through the sidecar.

#[cfg(feature = "parquet")]
/// Parquet read/write through Arrow record batches.
pub mod parquet;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::foundation::core::DType;
use crate::foundation::error::{TabvidError, TabvidResult};

/// One named, typed column.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Column {
    /// Column identifier.
    pub name: String,
    /// Original element type.
    pub dtype: DType,
    /// Cell values in row order; NaN is written as JSON `null`.
    #[serde(with = "nan_as_null")]
    pub values: Vec<f64>,
}

impl Column {
    /// Create a column.
    pub fn new(name: impl Into<String>, dtype: DType, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }
}

/// Ordered collection of equally long columns with unique names.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "TableDef", into = "TableDef")]
pub struct Table {
    columns: Vec<Column>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct TableDef {
    columns: Vec<Column>,
}

impl TryFrom<TableDef> for Table {
    type Error = TabvidError;

    fn try_from(def: TableDef) -> Result<Self, Self::Error> {
        Table::new(def.columns)
    }
}

impl From<Table> for TableDef {
    fn from(t: Table) -> Self {
        Self { columns: t.columns }
    }
}

impl Table {
    /// Build a table, checking name uniqueness and equal column lengths.
    pub fn new(columns: Vec<Column>) -> TabvidResult<Self> {
        let mut seen = std::collections::BTreeSet::new();
        for c in &columns {
            if !seen.insert(c.name.as_str()) {
                return Err(TabvidError::validation(format!(
                    "duplicate column name '{}'",
                    c.name
                )));
            }
        }
        if let Some(first) = columns.first() {
            let rows = first.values.len();
            if let Some(bad) = columns.iter().find(|c| c.values.len() != rows) {
                return Err(TabvidError::validation(format!(
                    "column '{}' has {} rows, expected {rows}",
                    bad.name,
                    bad.values.len()
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Columns in declared order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column identifiers in declared order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Row count (0 for a table without columns).
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Cell access by column and row.
    pub fn cell(&self, name: &str, row: usize) -> Option<f64> {
        self.column(name).and_then(|c| c.values.get(row).copied())
    }

    /// Gather `names` into a row-major `(rows, names.len())` block.
    ///
    /// Returns the block together with the group's common dtype.
    pub fn select_rows(&self, names: &[String]) -> TabvidResult<(Vec<f64>, DType)> {
        let cols = names
            .iter()
            .map(|n| {
                self.column(n)
                    .ok_or_else(|| TabvidError::validation(format!("unknown column '{n}'")))
            })
            .collect::<TabvidResult<Vec<_>>>()?;
        let dtype = DType::common(cols.iter().map(|c| c.dtype))
            .ok_or_else(|| TabvidError::validation("column selection is empty"))?;

        let rows = self.rows();
        let mut out = Vec::with_capacity(rows * cols.len());
        for r in 0..rows {
            out.extend(cols.iter().map(|c| c.values[r]));
        }
        Ok((out, dtype))
    }

    /// Inverse of [`Table::select_rows`]: split a row-major block into named columns.
    pub fn from_rows(names: &[String], dtype: DType, block: &[f64]) -> TabvidResult<Self> {
        if names.is_empty() {
            return Err(TabvidError::validation("at least one column is required"));
        }
        if !block.len().is_multiple_of(names.len()) {
            return Err(TabvidError::shape_mismatch(format!(
                "{} values cannot be split into {} columns",
                block.len(),
                names.len()
            )));
        }
        let width = names.len();
        let columns = names
            .iter()
            .enumerate()
            .map(|(j, n)| {
                let values = block
                    .chunks_exact(width)
                    .map(|row| dtype.coerce(row[j]))
                    .collect();
                Column::new(n.clone(), dtype, values)
            })
            .collect();
        Self::new(columns)
    }

    /// Parse a table from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> TabvidResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| TabvidError::serde(format!("parse table JSON: {e}")))
    }

    /// Parse a table from a JSON file on disk.
    pub fn from_json_path(path: impl AsRef<Path>) -> TabvidResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            TabvidError::validation(format!("open table JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Write the table as JSON.
    pub fn to_json_path(&self, path: impl AsRef<Path>) -> TabvidResult<()> {
        use anyhow::Context as _;
        let path = path.as_ref();
        let f = File::create(path)
            .with_context(|| format!("create table JSON '{}'", path.display()))?;
        serde_json::to_writer(BufWriter::new(f), self)
            .map_err(|e| TabvidError::serde(format!("write table JSON: {e}")))
    }
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(values.iter().map(|v| (!v.is_nan()).then_some(*v)))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let raw = Vec::<Option<f64>>::deserialize(d)?;
        Ok(raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/table/table.rs"]
mod tests;
