//! CSV writer; header from the first batch's column names.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::scalar_text;
use crate::error::Result;
use lakeq_core::types::RowBatch;

pub struct CsvWriter<W: Write> {
    inner: ::csv::Writer<W>,
    header_written: bool,
    rows_written: usize,
}

impl CsvWriter<File> {
    pub fn to_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::to_writer(File::create(path)?))
    }
}

impl<W: Write> CsvWriter<W> {
    pub fn to_writer(writer: W) -> Self {
        Self {
            inner: ::csv::WriterBuilder::new().from_writer(writer),
            header_written: false,
            rows_written: 0,
        }
    }

    pub fn write_batch(&mut self, batch: &RowBatch) -> Result<()> {
        if !self.header_written && batch.num_columns() > 0 {
            self.inner.write_record(batch.columns.iter().map(|c| c.name.as_str()))?;
            self.header_written = true;
        }
        for r in 0..batch.num_rows() {
            self.inner
                .write_record(batch.columns.iter().map(|c| scalar_text(&c.values[r])))?;
            self.rows_written += 1;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.inner.flush()?;
        Ok(self.rows_written)
    }
}
