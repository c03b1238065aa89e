// result_sink.rs - Batched, append-only CSV output
//
// Entity records accumulate in a small in-memory batch and are appended to the
// output file every `batch_size` records. Each flush writes, fsyncs, and then
// replaces the batch with a fresh Vec, so a crash loses at most the records of
// one unflushed batch and memory stays flat over long runs.

use anyhow::{Context, Result};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::entity::EntityRecord;

pub const DEFAULT_BATCH_SIZE: usize = 2;

pub const HEADER: [&str; 7] = [
    "Name",
    "DetailURL",
    "TotalClearances",
    "TotalShipments",
    "ServiceProviders",
    "TradeByCountry",
    "PortType",
];

/// A bare number written with thousands separators, e.g. `1,204`.
static GROUPED_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,3}(,[0-9]{3})+$").expect("static regex is valid"));

pub struct ResultSink {
    path: PathBuf,
    batch: Vec<EntityRecord>,
    batch_size: usize,
    header_written: bool,
    written: usize,
    batches_flushed: usize,
}

impl ResultSink {
    /// Start a fresh output file, truncating anything already there.
    pub fn create(path: &Path, batch_size: usize) -> Result<Self> {
        ensure_parent(path)?;
        File::create(path).with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Self::with_state(path, batch_size, false))
    }

    /// Continue an existing output file. The header is only written if the
    /// file is missing or empty.
    pub fn append_to(path: &Path, batch_size: usize) -> Result<Self> {
        ensure_parent(path)?;
        let has_content = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        Ok(Self::with_state(path, batch_size, has_content))
    }

    fn with_state(path: &Path, batch_size: usize, header_written: bool) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            path: path.to_path_buf(),
            batch: Vec::with_capacity(batch_size),
            batch_size,
            header_written,
            written: 0,
            batches_flushed: 0,
        }
    }

    /// Queue a record; flushes once the batch is full. Returns whether a flush happened.
    pub fn add(&mut self, record: EntityRecord) -> Result<bool> {
        self.batch.push(record);
        if self.batch.len() >= self.batch_size {
            self.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Append the pending batch to the output file. Returns the number of records written.
    pub fn flush(&mut self) -> Result<usize> {
        if self.batch.is_empty() && self.header_written {
            return Ok(0);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open output file: {}", self.path.display()))?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Always)
            .from_writer(file);

        if !self.header_written {
            writer.write_record(HEADER).context("Failed to write output header")?;
        }

        for record in &self.batch {
            writer
                .write_record(csv_fields(record))
                .with_context(|| format!("Failed to write record for {}", record.company_name))?;
        }

        let file = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush output file: {}", e.error()))?;
        file.sync_data().context("Failed to sync output file")?;

        // Only a synced batch is released; on error it stays queued.
        let flushed = std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size)).len();
        self.header_written = true;
        self.written += flushed;
        if flushed > 0 {
            self.batches_flushed += 1;
        }
        debug!("Flushed {} records to {}", flushed, self.path.display());
        Ok(flushed)
    }

    /// Flush whatever remains. Returns the total number of records written by this sink.
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.written)
    }

    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn batches_flushed(&self) -> usize {
        self.batches_flushed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read an output file back into records (header row skipped).
    pub fn read_records(path: &Path) -> Result<Vec<EntityRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open output file: {}", path.display()))?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.with_context(|| format!("Malformed row in {}", path.display()))?;
            let field = |i: usize| row.get(i).unwrap_or_default().to_string();
            records.push(EntityRecord {
                company_name: field(0),
                detail_url: field(1),
                total_clearances: field(2),
                total_shipments: field(3),
                top_service_providers: field(4),
                trade_by_country: field(5),
                trade_by_destination_type: field(6),
            });
        }
        Ok(records)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Trim a field and drop thousands separators from bare numbers.
fn clean_field(value: &str) -> String {
    let trimmed = value.trim();
    if GROUPED_NUMBER.is_match(trimmed) {
        trimmed.replace(',', "")
    } else {
        trimmed.to_string()
    }
}

fn csv_fields(record: &EntityRecord) -> [String; 7] {
    [
        clean_field(&record.company_name),
        clean_field(&record.detail_url),
        clean_field(&record.total_clearances),
        clean_field(&record.total_shipments),
        clean_field(&record.top_service_providers),
        clean_field(&record.trade_by_country),
        clean_field(&record.trade_by_destination_type),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str) -> EntityRecord {
        EntityRecord {
            company_name: name.to_string(),
            detail_url: format!("https://app.example.com/importers/{}", name.to_lowercase()),
            total_clearances: "1,204".to_string(),
            total_shipments: "87".to_string(),
            top_service_providers: "Maersk-4, MSC-2".to_string(),
            trade_by_country: "China-12, Vietnam-3".to_string(),
            trade_by_destination_type: "Port-10, Inland-5".to_string(),
        }
    }

    #[test]
    fn test_flushes_every_batch_size_records() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut sink = ResultSink::create(&path, 2).unwrap();

        assert!(!sink.add(record("Acme")).unwrap());
        assert_eq!(sink.pending(), 1);
        assert!(sink.add(record("Globex")).unwrap());
        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.batches_flushed(), 1);

        // Already on disk before finish
        assert_eq!(ResultSink::read_records(&path).unwrap().len(), 2);

        sink.add(record("Initech")).unwrap();
        assert_eq!(sink.finish().unwrap(), 3);
        assert_eq!(ResultSink::read_records(&path).unwrap().len(), 3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_flush_keeps_batch() {
        // Every write to /dev/full fails with ENOSPC
        let mut sink = ResultSink::append_to(Path::new("/dev/full"), 5).unwrap();
        sink.add(record("Acme")).unwrap();

        assert!(sink.flush().is_err());
        assert_eq!(sink.pending(), 1);
        assert_eq!(sink.batches_flushed(), 0);

        // Still queued for the next attempt
        assert!(sink.flush().is_err());
        assert_eq!(sink.pending(), 1);
    }

    #[test]
    fn test_header_written_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut sink = ResultSink::create(&path, 1).unwrap();
        sink.add(record("Acme")).unwrap();
        sink.add(record("Globex")).unwrap();
        sink.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("\"Name\"").count(), 1);
        assert!(content.starts_with(
            "\"Name\",\"DetailURL\",\"TotalClearances\",\"TotalShipments\",\"ServiceProviders\",\"TradeByCountry\",\"PortType\""
        ));
    }

    #[test]
    fn test_append_to_existing_skips_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut first = ResultSink::create(&path, 2).unwrap();
        first.add(record("Acme")).unwrap();
        first.finish().unwrap();

        let mut second = ResultSink::append_to(&path, 2).unwrap();
        second.add(record("Globex")).unwrap();
        second.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("\"Name\"").count(), 1);
        let names: Vec<String> = ResultSink::read_records(&path)
            .unwrap()
            .into_iter()
            .map(|r| r.company_name)
            .collect();
        assert_eq!(names, vec!["Acme", "Globex"]);
    }

    #[test]
    fn test_quotes_doubled_and_separators_stripped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let mut sink = ResultSink::create(&path, 1).unwrap();
        let mut r = EntityRecord {
            company_name: "The \"Best\" Co".to_string(),
            ..EntityRecord::default()
        };
        r.total_clearances = "12,345".to_string();
        sink.add(r).unwrap();
        sink.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"The \"\"Best\"\" Co\""));
        assert!(content.contains("\"12345\""));
        // Absent fields are empty, never missing columns
        assert!(content.contains("\"\",\"\",\"\",\"\""));
    }

    #[test]
    fn test_summary_strings_keep_commas() {
        assert_eq!(clean_field("China-12, Vietnam-3"), "China-12, Vietnam-3");
        assert_eq!(clean_field(" 3,310 "), "3310");
        assert_eq!(clean_field("1,2"), "1,2");
    }

    #[test]
    fn test_empty_run_still_writes_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("out.csv");
        let sink = ResultSink::create(&path, 2).unwrap();
        assert_eq!(sink.finish().unwrap(), 0);
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("\"Name\""));
    }
}
