//! Market regime gate from the benchmark series.
//!
//! bullish(D) = close > SMA_long AND SMA_short > SMA_long, both windows
//! ending at D. Bearish until SMA_long has enough history.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::config::RegimeConfig;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeState {
    pub date: NaiveDate,
    pub close: f64,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub bullish: bool,
}

pub fn is_bullish(close: f64, sma_short: Option<f64>, sma_long: Option<f64>) -> bool {
    match (sma_short, sma_long) {
        (Some(short), Some(long)) => close > long && short > long,
        _ => false,
    }
}

pub fn compute_regime(benchmark: &[OhlcvBar], config: &RegimeConfig) -> Vec<RegimeState> {
    let short = calculate_sma(benchmark, config.sma_short);
    let long = calculate_sma(benchmark, config.sma_long);

    benchmark
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let sma_short = short.value_at(i);
            let sma_long = long.value_at(i);
            RegimeState {
                date: bar.date,
                close: bar.close,
                sma_short,
                sma_long,
                bullish: is_bullish(bar.close, sma_short, sma_long),
            }
        })
        .collect()
}
