//! Universe loading for multi-instrument backtests.
//!
//! Parses code lists from configuration and pulls the benchmark plus every
//! instrument series from a data port into one `MarketData`.

use crate::domain::backtest::MarketData;
use crate::domain::config::BacktestConfig;
use crate::domain::error::SwingtraderError;
use crate::ports::data_port::DataPort;
use log::{info, warn};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Instruments to load: the configured list, or everything the port knows
/// about except the benchmark.
fn universe_codes(
    data_port: &dyn DataPort,
    config: &BacktestConfig,
) -> Result<Vec<String>, SwingtraderError> {
    let benchmark = &config.regime.benchmark;
    let codes = if config.universe.codes.is_empty() {
        data_port.list_symbols()?
    } else {
        config.universe.codes.clone()
    };
    Ok(codes
        .into_iter()
        .filter(|code| !code.eq_ignore_ascii_case(benchmark))
        .collect())
}

/// Fetch the benchmark and all universe series over
/// [data_start, end_date].
///
/// A missing benchmark is fatal; a short one only keeps the regime bearish.
/// Instruments that fail to load or return no bars are skipped with a warning.
pub fn load_market_data(
    data_port: &dyn DataPort,
    config: &BacktestConfig,
) -> Result<MarketData, SwingtraderError> {
    let sim = &config.simulation;
    let benchmark_code = &config.regime.benchmark;

    let benchmark = data_port
        .fetch_ohlcv(benchmark_code, sim.data_start, sim.end_date)
        .map_err(|e| {
            warn!("benchmark {benchmark_code}: {e}");
            SwingtraderError::NoData {
                code: benchmark_code.clone(),
            }
        })?;
    if benchmark.is_empty() {
        return Err(SwingtraderError::NoData {
            code: benchmark_code.clone(),
        });
    }
    if benchmark.len() < config.regime.sma_long {
        warn!(
            "benchmark {benchmark_code} has {} bars, fewer than sma_long {}; regime stays bearish",
            benchmark.len(),
            config.regime.sma_long
        );
    }

    let codes = universe_codes(data_port, config)?;
    let mut instruments = BTreeMap::new();
    let mut skipped = 0usize;

    for code in &codes {
        match data_port.fetch_ohlcv(code, sim.data_start, sim.end_date) {
            Ok(bars) if bars.is_empty() => {
                warn!("skipping {code} (no data in range)");
                skipped += 1;
            }
            Ok(bars) => {
                instruments.insert(code.clone(), bars);
            }
            Err(e) => {
                warn!("skipping {code} ({e})");
                skipped += 1;
            }
        }
    }

    info!(
        "loaded {} bars for {}, {} of {} instruments ({} skipped)",
        benchmark.len(),
        benchmark_code,
        instruments.len(),
        codes.len(),
        skipped
    );

    Ok(MarketData {
        benchmark,
        instruments,
        sectors: data_port.sector_map()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct StubPort {
        series: HashMap<String, usize>,
    }

    impl StubPort {
        fn new(entries: &[(&str, usize)]) -> Self {
            StubPort {
                series: entries
                    .iter()
                    .map(|(c, n)| (c.to_string(), *n))
                    .collect(),
            }
        }
    }

    impl DataPort for StubPort {
        fn fetch_ohlcv(
            &self,
            code: &str,
            _start_date: NaiveDate,
            _end_date: NaiveDate,
        ) -> Result<Vec<OhlcvBar>, SwingtraderError> {
            let n = self.series.get(code).ok_or_else(|| SwingtraderError::Data {
                reason: format!("no file for {code}"),
            })?;
            let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            Ok((0..*n)
                .map(|i| OhlcvBar {
                    code: code.to_string(),
                    date: base + chrono::Duration::days(i as i64),
                    open: 10.0,
                    high: 10.0,
                    low: 10.0,
                    close: 10.0,
                    volume: 1000,
                })
                .collect())
        }

        fn list_symbols(&self) -> Result<Vec<String>, SwingtraderError> {
            let mut codes: Vec<String> = self.series.keys().cloned().collect();
            codes.sort();
            Ok(codes)
        }

        fn sector_map(&self) -> Result<HashMap<String, String>, SwingtraderError> {
            Ok(HashMap::from([("AAA".to_string(), "Energy".to_string())]))
        }
    }

    fn config_with(codes: &[&str]) -> BacktestConfig {
        let mut config = BacktestConfig::default();
        config.regime.benchmark = "SPY".into();
        config.regime.sma_short = 2;
        config.regime.sma_long = 5;
        config.universe.codes = codes.iter().map(|c| c.to_string()).collect();
        config
    }

    #[test]
    fn test_parse_codes_basic() {
        let result = parse_codes("CBA,BHP,WBC,NAB").unwrap();
        assert_eq!(result, vec!["CBA", "BHP", "WBC", "NAB"]);
    }

    #[test]
    fn test_parse_codes_trims_and_uppercases() {
        let result = parse_codes("  cba , BHP ,wbc").unwrap();
        assert_eq!(result, vec!["CBA", "BHP", "WBC"]);
    }

    #[test]
    fn test_parse_codes_empty_token() {
        let result = parse_codes("CBA,,BHP");
        assert!(matches!(result, Err(UniverseError::EmptyToken)));
    }

    #[test]
    fn test_parse_codes_duplicate() {
        let result = parse_codes("CBA,BHP,cba");
        assert!(matches!(result, Err(UniverseError::DuplicateCode(s)) if s == "CBA"));
    }

    #[test]
    fn loads_configured_codes_and_skips_failures() {
        let port = StubPort::new(&[("SPY", 10), ("AAA", 10), ("BBB", 0)]);
        let data = load_market_data(&port, &config_with(&["AAA", "BBB", "CCC"])).unwrap();

        assert_eq!(data.benchmark.len(), 10);
        assert_eq!(data.instruments.keys().collect::<Vec<_>>(), vec!["AAA"]);
        assert_eq!(data.sector_of("AAA"), "Energy");
        assert_eq!(data.sector_of("BBB"), "Unknown");
    }

    #[test]
    fn empty_code_list_uses_port_listing_without_benchmark() {
        let port = StubPort::new(&[("SPY", 10), ("AAA", 10), ("BBB", 6)]);
        let data = load_market_data(&port, &config_with(&[])).unwrap();
        assert_eq!(
            data.instruments.keys().collect::<Vec<_>>(),
            vec!["AAA", "BBB"]
        );
    }

    #[test]
    fn missing_benchmark_is_no_data() {
        let port = StubPort::new(&[("AAA", 10)]);
        let err = load_market_data(&port, &config_with(&["AAA"])).unwrap_err();
        assert!(matches!(err, SwingtraderError::NoData { code } if code == "SPY"));
    }

    #[test]
    fn short_benchmark_still_loads() {
        let port = StubPort::new(&[("SPY", 3), ("AAA", 10)]);
        let data = load_market_data(&port, &config_with(&["AAA"])).unwrap();
        assert_eq!(data.benchmark.len(), 3);
        assert!(data.instruments.contains_key("AAA"));
    }
}
