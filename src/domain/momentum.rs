//! Relative-strength ranking and the sector-capped watchlist.
//!
//! RS at lookback L = (close_now / close_now-L) / (bench_now / bench_now-L).
//! The composite is the weighted sum over the short, medium and long
//! lookbacks. Instruments without the longest lookback are not scored.

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::code_data::CodeData;
use crate::domain::config::RankingConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistEntry {
    pub date: NaiveDate,
    pub code: String,
    pub sector: String,
    pub score: f64,
    pub rs_short: f64,
    pub rs_medium: f64,
    pub rs_long: f64,
    /// 1-based.
    pub rank: usize,
}

fn trailing_return(data: &CodeData, idx: usize, lookback: usize) -> Option<f64> {
    let past = data.close_back(idx, lookback)?;
    if past <= 0.0 {
        return None;
    }
    Some(data.ohlcv[idx].close / past)
}

pub fn relative_strength(
    data: &CodeData,
    idx: usize,
    benchmark: &CodeData,
    bench_idx: usize,
    lookback: usize,
) -> Option<f64> {
    let own = trailing_return(data, idx, lookback)?;
    let bench = trailing_return(benchmark, bench_idx, lookback)?;
    if bench <= 0.0 {
        return None;
    }
    Some(own / bench)
}

/// Score `candidates` on `date` and return the capped watchlist.
pub fn rank_instruments(
    candidates: &[&CodeData],
    benchmark: &CodeData,
    date: NaiveDate,
    config: &RankingConfig,
) -> Vec<WatchlistEntry> {
    let Some(bench_idx) = benchmark.get_bar_index(date) else {
        return Vec::new();
    };

    let mut scored: Vec<WatchlistEntry> = candidates
        .iter()
        .filter_map(|data| {
            let idx = data.get_bar_index(date)?;
            if idx < config.longest_lookback() {
                return None;
            }
            let rs_short = relative_strength(data, idx, benchmark, bench_idx, config.lookback_short)?;
            let rs_medium =
                relative_strength(data, idx, benchmark, bench_idx, config.lookback_medium)?;
            let rs_long = relative_strength(data, idx, benchmark, bench_idx, config.lookback_long)?;
            let score = config.weight_short * rs_short
                + config.weight_medium * rs_medium
                + config.weight_long * rs_long;
            Some(WatchlistEntry {
                date,
                code: data.code.clone(),
                sector: data.sector.clone(),
                score,
                rs_short,
                rs_medium,
                rs_long,
                rank: 0,
            })
        })
        .collect();

    sort_by_score(&mut scored);
    apply_sector_cap(scored, config.watchlist_size, config.sector_cap)
}

/// Descending score; ties by code for determinism.
pub fn sort_by_score(entries: &mut [WatchlistEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.code.cmp(&b.code))
    });
}

/// Walk the sorted list once, admitting an entry only while its sector has
/// headroom. Skipped entries are never reconsidered.
pub fn apply_sector_cap(
    sorted: Vec<WatchlistEntry>,
    watchlist_size: usize,
    sector_cap: usize,
) -> Vec<WatchlistEntry> {
    let mut per_sector: HashMap<String, usize> = HashMap::new();
    let mut watchlist = Vec::with_capacity(watchlist_size.min(sorted.len()));

    for mut entry in sorted {
        if watchlist.len() >= watchlist_size {
            break;
        }
        let count = per_sector.entry(entry.sector.clone()).or_insert(0);
        if *count >= sector_cap {
            continue;
        }
        *count += 1;
        entry.rank = watchlist.len() + 1;
        watchlist.push(entry);
    }

    watchlist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use proptest::prelude::*;

    fn date(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    fn make_data(code: &str, sector: &str, closes: &[f64]) -> CodeData {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                code: code.into(),
                date: date(i),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1_000_000,
            })
            .collect();
        CodeData::new(code.into(), sector.into(), bars)
    }

    fn config() -> RankingConfig {
        RankingConfig {
            lookback_short: 1,
            lookback_medium: 2,
            lookback_long: 4,
            weight_short: 0.2,
            weight_medium: 0.5,
            weight_long: 0.3,
            watchlist_size: 25,
            sector_cap: 8,
        }
    }

    fn entry(code: &str, sector: &str, score: f64) -> WatchlistEntry {
        WatchlistEntry {
            date: date(0),
            code: code.into(),
            sector: sector.into(),
            score,
            rs_short: score,
            rs_medium: score,
            rs_long: score,
            rank: 0,
        }
    }

    #[test]
    fn relative_strength_against_benchmark() {
        let bench = make_data("SPY", "", &[100.0, 110.0]);
        let stock = make_data("AAA", "Tech", &[50.0, 60.0]);
        let rs = relative_strength(&stock, 1, &bench, 1, 1).unwrap();
        assert!((rs - 1.2 / 1.1).abs() < 1e-12);
    }

    #[test]
    fn missing_longest_lookback_excluded() {
        let bench = make_data("SPY", "", &[100.0; 5]);
        let full = make_data("AAA", "Tech", &[10.0, 11.0, 12.0, 13.0, 14.0]);
        let short = CodeData::new(
            "BBB".into(),
            "Tech".into(),
            full.ohlcv[2..]
                .iter()
                .map(|b| OhlcvBar {
                    code: "BBB".into(),
                    ..b.clone()
                })
                .collect(),
        );

        let list = rank_instruments(&[&full, &short], &bench, date(4), &config());
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].code, "AAA");
        assert_eq!(list[0].rank, 1);
    }

    #[test]
    fn composite_ordering_and_ranks() {
        let bench = make_data("SPY", "", &[100.0; 5]);
        let slow = make_data("SLOW", "Tech", &[10.0, 10.0, 10.0, 10.0, 11.0]);
        let fast = make_data("FAST", "Energy", &[10.0, 11.0, 12.0, 13.0, 14.0]);

        let list = rank_instruments(&[&slow, &fast], &bench, date(4), &config());
        assert_eq!(list[0].code, "FAST");
        assert_eq!(list[1].code, "SLOW");
        assert_eq!(list[1].rank, 2);
        let expected = 0.2 * 1.1 + 0.5 * 1.1 + 0.3 * 1.1;
        assert!((list[1].score - expected).abs() < 1e-12);
    }

    #[test]
    fn ties_broken_by_code() {
        let mut entries = vec![entry("MSFT", "Tech", 1.0), entry("AAPL", "Tech", 1.0)];
        sort_by_score(&mut entries);
        assert_eq!(entries[0].code, "AAPL");
    }

    #[test]
    fn sector_cap_skips_without_reconsideration() {
        let sorted = vec![
            entry("A1", "Tech", 5.0),
            entry("A2", "Tech", 4.0),
            entry("A3", "Tech", 3.0),
            entry("B1", "Energy", 2.0),
            entry("C1", "Health", 1.0),
        ];
        let list = apply_sector_cap(sorted, 3, 2);
        let codes: Vec<&str> = list.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["A1", "A2", "B1"]);
        assert_eq!(list.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_benchmark_bar_gives_empty_watchlist() {
        let bench = make_data("SPY", "", &[100.0; 3]);
        let stock = make_data("AAA", "Tech", &[10.0; 6]);
        assert!(rank_instruments(&[&stock], &bench, date(5), &config()).is_empty());
    }

    proptest! {
        #[test]
        fn watchlist_respects_caps(
            scores in prop::collection::vec((0.5f64..2.0, 0usize..5), 0..60),
            watchlist_size in 1usize..30,
            sector_cap in 1usize..10,
        ) {
            let mut entries: Vec<WatchlistEntry> = scores
                .iter()
                .enumerate()
                .map(|(i, (score, sector))| entry(&format!("C{i:03}"), &format!("S{sector}"), *score))
                .collect();
            sort_by_score(&mut entries);
            let list = apply_sector_cap(entries, watchlist_size, sector_cap);

            prop_assert!(list.len() <= watchlist_size);
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for e in &list {
                *counts.entry(e.sector.as_str()).or_insert(0) += 1;
            }
            prop_assert!(counts.values().all(|&c| c <= sector_cap));
            for pair in list.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
