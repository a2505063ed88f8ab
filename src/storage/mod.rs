//! Flat-file draw history: one CSV row per draw, newest first, no header.
//!
//! The file is read once into memory together with its raw bytes. The only
//! mutation is [`CsvStore::prepend`], reachable through the merge engine,
//! which writes the new row followed by the untouched original bytes.

pub mod merge;

use crate::models::{DrawRecord, GameRules};
use crate::scraper::cleaner::parse_date;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

pub use self::merge::{MergeEngine, MergeOutcome};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file {0:?} does not exist (run `toto-etl init` first)")]
    Missing(PathBuf),

    #[error("I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {reason}")]
    Corrupt { line: u64, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io { path: path.to_path_buf(), source }
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    rules: GameRules,
    date_format: String,
    raw: Vec<u8>,
    records: Vec<DrawRecord>,
}

impl CsvStore {
    /// Read and parse the whole file. Any malformed row fails the open.
    pub fn open(path: &Path, rules: GameRules, date_format: &str) -> Result<Self, StoreError> {
        let raw = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::Missing(path.to_path_buf())),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(raw.as_slice());

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let line = row.position().map(|p| p.line()).unwrap_or(0);
            records.push(parse_row(&row, line, &rules, date_format)?);
        }

        debug!("Loaded {} records from {:?}", records.len(), path);
        Ok(Self {
            path: path.to_path_buf(),
            rules,
            date_format: date_format.to_string(),
            raw,
            records,
        })
    }

    /// Create an empty store file (and its directory) unless one exists.
    /// Returns whether a file was created.
    pub fn create_empty(path: &Path) -> Result<bool, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => {
                info!("Created empty store {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Most recent record.
    pub fn head(&self) -> Option<&DrawRecord> {
        self.records.first()
    }

    pub fn records(&self) -> &[DrawRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.records.iter().any(|r| r.date == date)
    }

    /// Invariant violations in the loaded history, one message each.
    /// Nothing is repaired.
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();

        for (i, rec) in self.records.iter().enumerate() {
            let row = i + 1;
            if !seen.insert(rec.date) {
                problems.push(format!("row {}: duplicate date {}", row, rec.date));
            }
            if let Some(prev) = i.checked_sub(1).map(|j| &self.records[j]) {
                if rec.date >= prev.date {
                    problems.push(format!("row {}: {} is not older than {}", row, rec.date, prev.date));
                }
            }
            let mut primaries = HashSet::new();
            for &n in &rec.primary {
                if !primaries.insert(n) {
                    problems.push(format!("row {}: repeated primary {}", row, n));
                }
                if !self.rules.in_range(n) {
                    problems.push(format!("row {}: primary {} out of range", row, n));
                }
            }
            for &n in &rec.secondary {
                if !self.rules.secondary_in_range(n) {
                    problems.push(format!("row {}: secondary {} out of range", row, n));
                }
            }
        }
        problems
    }

    /// CSV line for `record`, terminated like the existing file.
    fn render(&self, record: &DrawRecord) -> Result<Vec<u8>, StoreError> {
        let terminator = if self.raw.windows(2).any(|w| w == b"\r\n") {
            csv::Terminator::CRLF
        } else {
            csv::Terminator::Any(b'\n')
        };

        let mut fields = Vec::with_capacity(1 + self.rules.run_len());
        fields.push(record.date.format(&self.date_format).to_string());
        fields.extend(record.primary.iter().map(|n| self.rules.render(*n)));
        fields.extend(record.secondary.iter().map(|n| self.rules.render(*n)));
        fields.resize(1 + self.rules.run_len(), String::new());

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(terminator)
            .from_writer(Vec::new());
        writer.write_record(&fields)?;
        writer.into_inner().map_err(|e| StoreError::io(&self.path, e.into_error()))
    }

    /// Insert `record` as the new first line and persist atomically.
    /// Every existing byte is written back unchanged after it.
    pub(crate) fn prepend(&mut self, record: DrawRecord) -> Result<(), StoreError> {
        let mut bytes = self.render(&record)?;
        bytes.extend_from_slice(&self.raw);

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
        tmp.write_all(&bytes).map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&self.path).map_err(|e| StoreError::io(&self.path, e.error))?;

        info!("Wrote {} to {:?}", record, self.path);
        self.raw = bytes;
        self.records.insert(0, record);
        Ok(())
    }
}

fn corrupt(line: u64, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt { line, reason: reason.into() }
}

fn parse_row(row: &csv::StringRecord, line: u64, rules: &GameRules, date_format: &str) -> Result<DrawRecord, StoreError> {
    let date_field = row.get(0).unwrap_or("");
    let date = NaiveDate::parse_from_str(date_field, date_format)
        .ok()
        .or_else(|| parse_date(date_field))
        .ok_or_else(|| corrupt(line, format!("unreadable date {:?}", date_field)))?;

    let number = |field: &str| {
        field
            .parse::<u32>()
            .map_err(|_| corrupt(line, format!("not a number: {:?}", field)))
    };

    if row.len() < 1 + rules.pick {
        return Err(corrupt(line, format!("expected {} numbers, found {}", rules.pick, row.len().saturating_sub(1))));
    }
    let primary = row.iter().skip(1).take(rules.pick).map(number).collect::<Result<Vec<_>, _>>()?;
    let secondary = row
        .iter()
        .skip(1 + rules.pick)
        .filter(|f| !f.is_empty())
        .map(number)
        .collect::<Result<Vec<_>, _>>()?;
    if secondary.len() > rules.secondary_count {
        return Err(corrupt(line, format!("{} secondary values, at most {}", secondary.len(), rules.secondary_count)));
    }

    Ok(DrawRecord { date, draw_number: None, primary, secondary })
}


#[cfg(test)]
mod tests {
    use super::testing::store_file;
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(date: NaiveDate, primary: Vec<u32>, secondary: Vec<u32>) -> DrawRecord {
        DrawRecord { date, draw_number: None, primary, secondary }
    }

    #[test]
    fn test_open_reads_rows_newest_first() {
        let (_dir, path) = store_file("2025-12-04,6,11,20,28,33,43,16\n2025-12-01,2,10,24,35,45,49,39\n");
        let store = CsvStore::open(&path, GameRules::toto(), "%Y-%m-%d").unwrap();
        assert_eq!(store.len(), 2);
        let head = store.head().unwrap();
        assert_eq!(head.date, ymd(2025, 12, 4));
        assert_eq!(head.primary, vec![6, 11, 20, 28, 33, 43]);
        assert_eq!(head.secondary, vec![16]);
        assert!(store.check().is_empty());
    }

    #[test]
    fn test_legacy_dates_and_missing_secondary() {
        let (_dir, path) = store_file("4-Sept-25,1,2,3,4,5,6,\n01/08/2025,7,8,9,10,11,12,13\n");
        let store = CsvStore::open(&path, GameRules::toto(), "%Y-%m-%d").unwrap();
        assert_eq!(store.records()[0].date, ymd(2025, 9, 4));
        assert!(store.records()[0].secondary.is_empty());
        assert_eq!(store.records()[1].date, ymd(2025, 8, 1));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvStore::open(&dir.path().join("nope.csv"), GameRules::toto(), "%Y-%m-%d").unwrap_err();
        assert!(matches!(err, StoreError::Missing(_)));
    }

    #[test]
    fn test_corrupt_rows_fail_open() {
        for bad in ["yesterday,1,2,3,4,5,6,7\n", "2025-12-01,1,2,x,4,5,6,7\n", "2025-12-01,1,2,3\n", "2025-12-01,1,2,3,4,5,6,7,8\n"] {
            let (_dir, path) = store_file(bad);
            let err = CsvStore::open(&path, GameRules::toto(), "%Y-%m-%d").unwrap_err();
            assert!(matches!(err, StoreError::Corrupt { line: 1, .. }), "{:?} -> {:?}", bad, err);
        }
    }

    #[test]
    fn test_prepend_keeps_existing_bytes() {
        let original = "2025-12-01,2,10,24,35,45,49,39\n28-Nov-25,5,9,18,27,36,45,1\n";
        let (_dir, path) = store_file(original);
        let mut store = CsvStore::open(&path, GameRules::toto(), "%Y-%m-%d").unwrap();
        store.prepend(record(ymd(2025, 12, 4), vec![6, 11, 20, 28, 33, 43], vec![16])).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, format!("2025-12-04,6,11,20,28,33,43,16\n{}", original));
        assert_eq!(store.len(), 3);

        let reopened = CsvStore::open(&path, GameRules::toto(), "%Y-%m-%d").unwrap();
        assert_eq!(reopened.records(), store.records());
    }

    #[test]
    fn test_prepend_pads_missing_secondary_and_follows_crlf() {
        let (_dir, path) = store_file("2025-12-01,2,10,24,35,45,49,39\r\n");
        let mut store = CsvStore::open(&path, GameRules::toto(), "%Y-%m-%d").unwrap();
        store.prepend(record(ymd(2025, 12, 4), vec![6, 11, 20, 28, 33, 43], vec![])).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("2025-12-04,6,11,20,28,33,43,\r\n2025-12-01"));
    }

    #[test]
    fn test_four_d_rows_are_zero_padded() {
        let (_dir, path) = store_file("");
        let mut store = CsvStore::open(&path, GameRules::four_d(), "%Y-%m-%d").unwrap();
        store.prepend(record(ymd(2025, 8, 23), vec![2250, 419, 7783], vec![1])).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("2025-08-23,2250,0419,7783,0001,"));
        let reopened = CsvStore::open(&path, GameRules::four_d(), "%Y-%m-%d").unwrap();
        assert_eq!(reopened.head().unwrap().primary, vec![2250, 419, 7783]);
    }

    #[test]
    fn test_check_reports_order_and_duplicates() {
        let (_dir, path) = store_file(
            "2025-12-01,2,10,24,35,45,49,39\n2025-12-04,6,11,20,28,33,43,16\n2025-12-04,1,1,3,4,5,6,\n",
        );
        let store = CsvStore::open(&path, GameRules::toto(), "%Y-%m-%d").unwrap();
        let problems = store.check();
        assert!(problems.iter().any(|p| p.contains("not older")));
        assert!(problems.iter().any(|p| p.contains("duplicate date")));
        assert!(problems.iter().any(|p| p.contains("repeated primary 1")));
    }

    #[test]
    fn test_create_empty_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("totoResult.csv");
        assert!(CsvStore::create_empty(&path).unwrap());
        assert!(!CsvStore::create_empty(&path).unwrap());
        assert!(CsvStore::open(&path, GameRules::toto(), "%Y-%m-%d").unwrap().is_empty());
    }
}
