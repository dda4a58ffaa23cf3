#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use swingtrader::domain::backtest::MarketData;
use swingtrader::domain::config::BacktestConfig;
use swingtrader::domain::error::SwingtraderError;
pub use swingtrader::domain::ohlcv::OhlcvBar;
use swingtrader::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    pub sectors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            sectors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn with_sector(mut self, code: &str, sector: &str) -> Self {
        self.sectors.insert(code.to_string(), sector.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, SwingtraderError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(SwingtraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SwingtraderError> {
        let mut codes: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        codes.sort();
        Ok(codes)
    }

    fn sector_map(&self) -> Result<HashMap<String, String>, SwingtraderError> {
        Ok(self.sectors.clone())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Session `i` of the synthetic calendar (consecutive days from 2024-01-01).
pub fn day(i: usize) -> NaiveDate {
    date(2024, 1, 1) + chrono::Duration::days(i as i64)
}

pub fn make_bar(code: &str, i: usize, open: f64, high: f64, low: f64, close: f64, volume: i64) -> OhlcvBar {
    OhlcvBar {
        code: code.to_string(),
        date: day(i),
        open,
        high,
        low,
        close,
        volume,
    }
}

/// Steady uptrend that dips to its short EMA on every session on shrinking
/// volume: close = start + slope * i, open half a point under the close,
/// high half a point over it, low three points under it.
pub fn pullback_trend(code: &str, n: usize, start: f64, slope: f64) -> Vec<OhlcvBar> {
    (0..n)
        .map(|i| {
            let close = start + slope * i as f64;
            make_bar(
                code,
                i,
                close - 0.5,
                close + 0.5,
                close - 3.0,
                close,
                1_000_000 - 1_000 * i as i64,
            )
        })
        .collect()
}

/// Benchmark rising one point a session; bullish from the second session.
pub fn rising_benchmark(n: usize) -> Vec<OhlcvBar> {
    (0..n)
        .map(|i| {
            let close = 100.0 + i as f64;
            make_bar("SPY", i, close, close, close, close, 5_000_000)
        })
        .collect()
}

/// Short windows so the synthetic trends produce signals from session 2:
/// EMA(2) pullback, volume 1 vs 3, RSI(2) unrestricted, ATR(2) = 3.5 on
/// `pullback_trend` bars, stops up to 100% allowed, no slippage.
pub fn fast_config() -> BacktestConfig {
    let mut config = BacktestConfig::default();
    config.regime.benchmark = "SPY".into();
    config.regime.sma_short = 1;
    config.regime.sma_long = 2;

    config.universe.min_price = 1.0;
    config.universe.min_avg_volume = 0.0;
    config.universe.volume_avg_period = 1;
    config.universe.trend_sma_period = 2;

    config.ranking.lookback_short = 1;
    config.ranking.lookback_medium = 1;
    config.ranking.lookback_long = 2;

    config.entry.ema_period = 2;
    config.entry.volume_pullback_window = 1;
    config.entry.volume_baseline_window = 3;
    config.entry.rsi_period = 2;
    config.entry.rsi_lower = 0.0;
    config.entry.rsi_upper = 100.0;
    config.entry.max_gap_percent = 5.0;

    config.risk.atr_period = 2;
    config.risk.max_stop_percent = 100.0;

    config.simulation.slippage_pct = 0.0;
    config.simulation.commission_per_trade = 0.0;
    config.simulation.commission_pct = 0.0;
    config
}

pub fn market(benchmark: Vec<OhlcvBar>, instruments: Vec<(&str, &str, Vec<OhlcvBar>)>) -> MarketData {
    let mut data = MarketData {
        benchmark,
        ..MarketData::default()
    };
    for (code, sector, bars) in instruments {
        data.instruments.insert(code.to_string(), bars);
        data.sectors.insert(code.to_string(), sector.to_string());
    }
    data
}
