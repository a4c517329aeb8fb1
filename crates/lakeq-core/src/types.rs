//! Result values: scalars, named columns, and row batches.
//!
//! Engines convert their native rows into these; writers and callers only see
//! `RowBatch`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{DataType, Field, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    /// Days since the Unix epoch.
    Date32(i32),
    /// Microseconds since the Unix epoch, UTC.
    TimestampMicros(i64),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Null => DataType::Null,
            Scalar::Bool(_) => DataType::Boolean,
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Bin(_) => DataType::Binary,
            Scalar::Date32(_) => DataType::Date32,
            Scalar::TimestampMicros(_) => DataType::TimestampMicros,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::I32(v) => Some(i64::from(*v)),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Scalar>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered named columns; rows are kept in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowBatch {
    pub columns: Vec<Column>,
}

impl RowBatch {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Zero-row batch that still carries the projection's column names.
    pub fn empty<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names
                .into_iter()
                .map(|n| Column::new(n, Vec::new()))
                .collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Schema inferred from the first non-null value of each column.
    pub fn schema(&self) -> Schema {
        let fields = self
            .columns
            .iter()
            .map(|c| Field {
                name: c.name.clone(),
                data_type: c
                    .values
                    .iter()
                    .find(|v| !matches!(v, Scalar::Null))
                    .map(Scalar::data_type)
                    .unwrap_or(DataType::Null),
                nullable: c.values.iter().any(|v| matches!(v, Scalar::Null)),
            })
            .collect();
        Schema { fields }
    }

    /// Append `other`'s rows below ours. Column names must line up.
    pub fn append(&mut self, other: RowBatch) -> Result<()> {
        if self.columns.is_empty() {
            self.columns = other.columns;
            return Ok(());
        }
        if other.columns.is_empty() {
            return Ok(());
        }
        if self.columns.len() != other.columns.len() {
            return Err(Error::Invariant(format!(
                "cannot append batch with {} columns to batch with {}",
                other.columns.len(),
                self.columns.len()
            )));
        }
        for (dst, src) in self.columns.iter_mut().zip(other.columns) {
            if dst.name != src.name {
                return Err(Error::Invariant(format!(
                    "column mismatch on append: '{}' vs '{}'",
                    dst.name, src.name
                )));
            }
            dst.values.extend(src.values);
        }
        Ok(())
    }

    /// Concatenate pages in arrival order into one batch.
    pub fn concat_pages(pages: Vec<RowBatch>) -> Result<RowBatch> {
        let total: usize = pages.iter().map(RowBatch::num_rows).sum();
        let mut pages = pages.into_iter();
        let Some(mut out) = pages.next() else {
            return Ok(RowBatch::default());
        };
        for col in &mut out.columns {
            col.values.reserve(total.saturating_sub(col.values.len()));
        }
        for page in pages {
            out.append(page)?;
        }
        Ok(out)
    }

    /// Rows `[offset, offset + len)` as a new batch (clamped to the batch).
    pub fn slice(&self, offset: usize, len: usize) -> RowBatch {
        let start = offset.min(self.num_rows());
        let end = start.saturating_add(len).min(self.num_rows());
        RowBatch {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.values[start..end].to_vec()))
                .collect(),
        }
    }

    /// Drop spare capacity held by the column buffers.
    pub fn shrink_to_fit(&mut self) {
        self.columns.shrink_to_fit();
        for col in &mut self.columns {
            col.values.shrink_to_fit();
        }
    }
}
