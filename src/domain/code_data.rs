//! Per-instrument bar history with its precomputed indicator cache.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, compute_indicators};
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::HashMap;

pub const UNKNOWN_SECTOR: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct CodeData {
    pub code: String,
    pub sector: String,
    pub ohlcv: Vec<OhlcvBar>,
    pub indicators: HashMap<IndicatorType, IndicatorSeries>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl CodeData {
    pub fn new(code: String, sector: String, ohlcv: Vec<OhlcvBar>) -> Self {
        let date_index = ohlcv
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            code,
            sector,
            ohlcv,
            indicators: HashMap::new(),
            date_index,
        }
    }

    /// Compute every requested indicator once, aligned with `ohlcv`.
    pub fn with_indicators(mut self, types: &[IndicatorType]) -> Self {
        self.indicators = compute_indicators(&self.ohlcv, types);
        self
    }

    pub fn bar_count(&self) -> usize {
        self.ohlcv.len()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.ohlcv[i])
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Valid indicator value at bar index `idx`.
    pub fn indicator(&self, indicator_type: IndicatorType, idx: usize) -> Option<f64> {
        self.indicators
            .get(&indicator_type)
            .and_then(|series| series.value_at(idx))
    }

    /// Close `lookback` bars before `idx`.
    pub fn close_back(&self, idx: usize, lookback: usize) -> Option<f64> {
        idx.checked_sub(lookback).map(|i| self.ohlcv[i].close)
    }
}
