//! Streaming NDJSON writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value};

use super::{format_date32, format_timestamp_micros};
use crate::error::Result;
use lakeq_core::types::{RowBatch, Scalar};

pub struct JsonlWriter<W: Write> {
    writer: BufWriter<W>,
    rows_written: usize,
}

impl JsonlWriter<File> {
    pub fn to_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = File::create(path)?;
        Ok(Self::to_writer(f))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn to_writer(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            rows_written: 0,
        }
    }

    /// One JSON object per row, keys in column order.
    pub fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        for r in 0..batch.num_rows() {
            let mut obj = Map::with_capacity(batch.num_columns());
            for col in &batch.columns {
                obj.insert(col.name.clone(), scalar_to_json(&col.values[r]));
            }
            serde_json::to_writer(&mut self.writer, &Value::Object(obj))?;
            self.writer.write_all(b"\n")?;
            self.rows_written += 1;
        }
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }
}

fn scalar_to_json(v: &Scalar) -> Value {
    use Scalar::*;
    match v {
        Null => Value::Null,
        Bool(b) => Value::Bool(*b),
        I32(i) => Value::from(*i),
        I64(i) => Value::from(*i),
        F32(f) => Value::from(*f as f64),
        F64(f) => Value::from(*f),
        Str(s) => Value::String(s.clone()),
        Bin(b) => Value::String(format!("[binary {} bytes]", b.len())),
        Date32(d) => format_date32(*d).map(Value::String).unwrap_or(Value::from(*d)),
        TimestampMicros(t) => format_timestamp_micros(*t)
            .map(Value::String)
            .unwrap_or(Value::from(*t)),
    }
}
