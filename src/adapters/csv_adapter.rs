//! CSV directory data adapter.
//!
//! One file per instrument, `{CODE}.csv` with a
//! `date,open,high,low,close,volume` header, plus an optional `sectors.csv`
//! mapping `code,sector`.

use crate::domain::error::SwingtraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

pub const SECTORS_FILE: &str = "sectors.csv";

#[derive(Debug, Deserialize)]
struct BarRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: i64,
}

#[derive(Debug, Deserialize)]
struct SectorRow {
    code: String,
    sector: String,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

fn data_error(path: &std::path::Path, detail: impl std::fmt::Display) -> SwingtraderError {
    SwingtraderError::Data {
        reason: format!("{}: {}", path.display(), detail),
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, SwingtraderError> {
        let path = self.csv_path(code);
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| data_error(&path, e))?;

        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<BarRow>().enumerate() {
            let row = result.map_err(|e| data_error(&path, e))?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                data_error(&path, format!("row {}: invalid date '{}': {}", line + 1, row.date, e))
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            bars.push(OhlcvBar {
                code: code.to_string(),
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SwingtraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| data_error(&self.base_path, e))?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| data_error(&self.base_path, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name == SECTORS_FILE {
                continue;
            }
            if let Some(code) = name.strip_suffix(".csv") {
                symbols.push(code.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn sector_map(&self) -> Result<HashMap<String, String>, SwingtraderError> {
        let path = self.base_path.join(SECTORS_FILE);
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| data_error(&path, e))?;

        let mut sectors = HashMap::new();
        for result in rdr.deserialize::<SectorRow>() {
            let row = result.map_err(|e| data_error(&path, e))?;
            sectors.insert(row.code.to_uppercase(), row.sector);
        }
        Ok(sectors)
    }
}
