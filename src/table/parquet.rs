//! Parquet read/write for [`Table`].
//!
//! Only numeric Arrow columns are accepted. Nulls read as NaN; NaN cells in integer columns are
//! written back as nulls.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use arrow::array::{
    Array, ArrayRef, AsArray, Float32Array, Float64Array, Int8Array, Int16Array, Int32Array,
    Int64Array, UInt8Array, UInt16Array, UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use super::{Column, Table};
use crate::foundation::core::DType;
use crate::foundation::error::{TabvidError, TabvidResult};

fn dtype_of(dt: &DataType) -> Option<DType> {
    Some(match dt {
        DataType::Float16 | DataType::Float32 => DType::Float32,
        DataType::Float64 => DType::Float64,
        DataType::Int8 => DType::Int8,
        DataType::Int16 => DType::Int16,
        DataType::Int32 => DType::Int32,
        DataType::Int64 => DType::Int64,
        DataType::UInt8 => DType::UInt8,
        DataType::UInt16 => DType::UInt16,
        DataType::UInt32 => DType::UInt32,
        DataType::UInt64 => DType::UInt64,
        _ => return None,
    })
}

fn arrow_type(dtype: DType) -> DataType {
    match dtype {
        DType::Float32 => DataType::Float32,
        DType::Float64 => DataType::Float64,
        DType::Int8 => DataType::Int8,
        DType::Int16 => DataType::Int16,
        DType::Int32 => DataType::Int32,
        DType::Int64 => DataType::Int64,
        DType::UInt8 => DataType::UInt8,
        DType::UInt16 => DataType::UInt16,
        DType::UInt32 => DataType::UInt32,
        DType::UInt64 => DataType::UInt64,
    }
}

/// Read a Parquet file into a [`Table`], keeping the file's column order.
pub fn read_parquet(path: &Path) -> TabvidResult<Table> {
    let file =
        File::open(path).with_context(|| format!("open parquet '{}'", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("read parquet metadata '{}'", path.display()))?;
    let schema = builder.schema().clone();

    let mut columns = schema
        .fields()
        .iter()
        .map(|f| {
            let dtype = dtype_of(f.data_type()).ok_or_else(|| {
                TabvidError::validation(format!(
                    "column '{}' has non-numeric type {}",
                    f.name(),
                    f.data_type()
                ))
            })?;
            Ok(Column::new(f.name().clone(), dtype, Vec::new()))
        })
        .collect::<TabvidResult<Vec<_>>>()?;

    let reader = builder.build().context("build parquet reader")?;
    for batch in reader {
        let batch = batch.context("read parquet record batch")?;
        for (col, array) in columns.iter_mut().zip(batch.columns()) {
            let as_f64 = arrow::compute::cast(array.as_ref(), &DataType::Float64)
                .with_context(|| format!("cast column '{}' to float64", col.name))?;
            let prim = as_f64.as_primitive::<Float64Type>();
            col.values.extend(prim.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
    }

    Table::new(columns)
}

fn to_arrow(col: &Column) -> ArrayRef {
    macro_rules! ints {
        ($arr:ty, $t:ty) => {
            Arc::new(<$arr>::from(
                col.values
                    .iter()
                    .map(|v| (!v.is_nan()).then(|| *v as $t))
                    .collect::<Vec<Option<$t>>>(),
            )) as ArrayRef
        };
    }

    match col.dtype {
        DType::Float64 => Arc::new(Float64Array::from(col.values.clone())),
        DType::Float32 => Arc::new(Float32Array::from(
            col.values.iter().map(|v| *v as f32).collect::<Vec<_>>(),
        )),
        DType::Int8 => ints!(Int8Array, i8),
        DType::Int16 => ints!(Int16Array, i16),
        DType::Int32 => ints!(Int32Array, i32),
        DType::Int64 => ints!(Int64Array, i64),
        DType::UInt8 => ints!(UInt8Array, u8),
        DType::UInt16 => ints!(UInt16Array, u16),
        DType::UInt32 => ints!(UInt32Array, u32),
        DType::UInt64 => ints!(UInt64Array, u64),
    }
}

/// Build a single Arrow [`RecordBatch`] from a [`Table`].
pub fn table_to_record_batch(table: &Table) -> TabvidResult<RecordBatch> {
    if table.columns().is_empty() {
        return Err(TabvidError::validation(
            "cannot write a table without columns",
        ));
    }
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|c| Field::new(c.name.clone(), arrow_type(c.dtype), true))
        .collect();
    let arrays: Vec<ArrayRef> = table.columns().iter().map(to_arrow).collect();
    debug_assert!(arrays.iter().all(|a| a.len() == table.rows()));

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| TabvidError::validation(format!("failed to build RecordBatch: {e}")))
}

/// Write a [`Table`] to a Parquet file (Snappy compression).
pub fn write_parquet(table: &Table, path: &Path) -> TabvidResult<()> {
    let batch = table_to_record_batch(table)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let file =
        File::create(path).with_context(|| format!("create parquet '{}'", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("create parquet writer")?;
    writer.write(&batch).context("write parquet batch")?;
    writer.close().context("close parquet writer")?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/table/parquet.rs"]
mod tests;
