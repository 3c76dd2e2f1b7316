//! Tabular output for proxmap results.
//!
//! Every export goes through [`TableWriter`]: record tables are described by
//! a [`Schema`] of [`Column`]s, and summary tables implement [`TableRow`].

use std::io::{self, Write};

use crate::error::Result;
use crate::types::IntervalRecord;

/// Placeholder for a value the run did not compute.
pub const ABSENT: &str = ".";

/// One column of a record table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Chr,
    Len,
    Start,
    End,
    Tissue,
    Class,
    Dist,
    Inter,
    HitStart,
    HitEnd,
    HitId,
    Signal,
    Bin,
    /// Comma-joined per-base values of a vectorized record. Marks vectorized
    /// sets in the corpus column check; no built-in table exports it.
    Vector,
    /// The same value on every row, e.g. the annotation a table was mapped onto.
    Label { header: &'static str, value: String },
}

impl Column {
    pub fn header(&self) -> &'static str {
        match self {
            Column::Chr => "Chr",
            Column::Len => "Len",
            Column::Start => "Start",
            Column::End => "End",
            Column::Tissue => "Tissue",
            Column::Class => "Class",
            Column::Dist => "Dist",
            Column::Inter => "Inter",
            Column::HitStart => "Hit_Start",
            Column::HitEnd => "Hit_End",
            Column::HitId => "Hit_Id",
            Column::Signal => "Signal",
            Column::Bin => "Bin",
            Column::Vector => "Vector",
            Column::Label { header, .. } => *header,
        }
    }

    /// Render this column's value for one record.
    pub fn render(&self, record: &IntervalRecord) -> String {
        fn or_absent<T: ToString>(value: Option<T>) -> String {
            value.map_or_else(|| ABSENT.to_string(), |v| v.to_string())
        }

        match self {
            Column::Chr => record.chrom.clone(),
            Column::Len => record.length().to_string(),
            Column::Start => record.start.to_string(),
            Column::End => record.end.to_string(),
            Column::Tissue => record.tissue.clone(),
            Column::Class => record.class.to_string(),
            Column::Dist => or_absent(record.distance),
            Column::Inter => or_absent(record.bucket),
            Column::HitStart => or_absent(record.hit.as_ref().map(|h| h.start)),
            Column::HitEnd => or_absent(record.hit.as_ref().map(|h| h.end)),
            Column::HitId => or_absent(record.hit.as_ref().and_then(|h| h.name.as_deref())),
            Column::Signal => or_absent(record.signal),
            Column::Bin => or_absent(record.position_bin),
            Column::Vector => match &record.vector {
                Some(values) => values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
                None => ABSENT.to_string(),
            },
            Column::Label { value, .. } => value.clone(),
        }
    }
}

/// Ordered column list of a record table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Schema { columns }
    }

    /// Nearest-feature table, with the signal column when signals were resolved.
    pub fn proximity(with_signal: bool) -> Self {
        let mut columns = vec![
            Column::Chr,
            Column::Len,
            Column::Start,
            Column::End,
            Column::Tissue,
            Column::Class,
            Column::Dist,
            Column::Inter,
            Column::HitStart,
            Column::HitEnd,
            Column::HitId,
        ];
        if with_signal {
            columns.push(Column::Signal);
        }
        Schema { columns }
    }

    /// Length distribution table.
    pub fn lengths() -> Self {
        Schema::new(vec![Column::Len, Column::Class, Column::Tissue])
    }

    /// Positional binning table.
    pub fn positions() -> Self {
        Schema::new(vec![
            Column::Chr,
            Column::Len,
            Column::Start,
            Column::End,
            Column::Tissue,
            Column::Class,
            Column::Bin,
        ])
    }

    /// Append a constant column.
    pub fn with_label(mut self, header: &'static str, value: impl Into<String>) -> Self {
        self.columns.push(Column::Label {
            header,
            value: value.into(),
        });
        self
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.header()).collect()
    }
}

/// A row of a summary table with a fixed header.
pub trait TableRow {
    fn header() -> &'static [&'static str];
    fn fields(&self) -> Vec<String>;
}

/// Delimited writer shared by every export.
pub struct TableWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> TableWriter<W> {
    pub fn new(writer: W, delimiter: u8) -> Self {
        let inner = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_writer(writer);
        TableWriter { inner }
    }

    /// Write one raw row.
    pub fn write_row<I, T>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.inner.write_record(fields).map_err(io::Error::from)?;
        Ok(())
    }

    /// Write the header line of a record table.
    pub fn write_header(&mut self, schema: &Schema) -> Result<()> {
        self.write_row(schema.headers())
    }

    /// Write a header and one row per record.
    pub fn write_records<'r, I>(&mut self, schema: &Schema, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'r IntervalRecord>,
    {
        self.write_header(schema)?;
        self.write_rows(schema, records)
    }

    /// Write one row per record, without a header.
    pub fn write_rows<'r, I>(&mut self, schema: &Schema, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'r IntervalRecord>,
    {
        let mut count = 0;
        for record in records {
            self.write_row(schema.columns.iter().map(|c| c.render(record)))?;
            count += 1;
        }
        Ok(count)
    }

    /// Write a header and every row of a summary table.
    pub fn write_table<T: TableRow>(&mut self, rows: &[T]) -> Result<usize> {
        self.write_row(T::header())?;
        for row in rows {
            self.write_row(row.fields())?;
        }
        Ok(rows.len())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}
