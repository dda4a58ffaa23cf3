//! Pullback entry trigger, evaluated at the close of the signal day.
//!
//! All must hold on D:
//! 1. low <= EMA and close >= EMA
//! 2. short-window mean volume < baseline mean volume
//! 3. RSI within [rsi_lower, rsi_upper]
//! 4. ATR available for sizing
//!
//! The opening-gap check runs later, at fill time, against the fill-day open.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::domain::code_data::CodeData;
use crate::domain::config::EntryConfig;
use crate::domain::indicator::IndicatorType;
use crate::domain::momentum::WatchlistEntry;
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    EmaPullback,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerType::EmaPullback => write!(f, "ema_pullback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub code: String,
    pub sector: String,
    pub date: NaiveDate,
    pub trigger: TriggerType,
    pub rank: usize,
    pub signal_close: f64,
    pub atr: f64,
}

pub fn required_indicators(config: &EntryConfig, atr_period: usize) -> Vec<IndicatorType> {
    vec![
        IndicatorType::Ema(config.ema_period),
        IndicatorType::VolumeSma(config.volume_pullback_window),
        IndicatorType::VolumeSma(config.volume_baseline_window),
        IndicatorType::Rsi(config.rsi_period),
        IndicatorType::Atr(atr_period),
    ]
}

/// ATR at `idx` if every trigger condition holds, otherwise `None`.
pub fn check_entry(
    data: &CodeData,
    idx: usize,
    config: &EntryConfig,
    atr_period: usize,
) -> Option<f64> {
    let bar = data.ohlcv.get(idx)?;

    let ema = data.indicator(IndicatorType::Ema(config.ema_period), idx)?;
    if !(bar.low <= ema && bar.close >= ema) {
        return None;
    }

    let recent = data.indicator(IndicatorType::VolumeSma(config.volume_pullback_window), idx)?;
    let baseline = data.indicator(IndicatorType::VolumeSma(config.volume_baseline_window), idx)?;
    if !(recent < baseline) {
        return None;
    }

    let rsi = data.indicator(IndicatorType::Rsi(config.rsi_period), idx)?;
    if !(config.rsi_lower..=config.rsi_upper).contains(&rsi) {
        return None;
    }

    data.indicator(IndicatorType::Atr(atr_period), idx)
}

/// True when the fill bar opens within `max_gap_percent` of the signal close.
pub fn gap_within_limit(fill_bar: &OhlcvBar, signal_close: f64, max_gap_percent: f64) -> bool {
    fill_bar.gap_fraction(signal_close) <= max_gap_percent / 100.0
}

/// Evaluate the watchlist on `date` in rank order. `is_blocked` filters out
/// codes that are held, pending, closed this cycle or cooling down.
pub fn scan_watchlist<F>(
    watchlist: &[WatchlistEntry],
    instruments: &HashMap<&str, &CodeData>,
    date: NaiveDate,
    config: &EntryConfig,
    atr_period: usize,
    is_blocked: F,
) -> Vec<Signal>
where
    F: Fn(&str) -> bool,
{
    watchlist
        .iter()
        .filter(|entry| !is_blocked(&entry.code))
        .filter_map(|entry| {
            let data = instruments.get(entry.code.as_str())?;
            let idx = data.get_bar_index(date)?;
            let atr = check_entry(data, idx, config, atr_period)?;
            Some(Signal {
                code: entry.code.clone(),
                sector: entry.sector.clone(),
                date,
                trigger: TriggerType::EmaPullback,
                rank: entry.rank,
                signal_close: data.ohlcv[idx].close,
                atr,
            })
        })
        .collect()
}
