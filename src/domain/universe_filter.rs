//! Daily tradeable-universe filter.
//!
//! Eligible when close > min_price, the rolling mean volume exceeds
//! min_avg_volume, and close is above its trend SMA. Missing bars or short
//! history fail closed.

use chrono::NaiveDate;

use crate::domain::code_data::CodeData;
use crate::domain::config::UniverseConfig;
use crate::domain::indicator::IndicatorType;

pub fn required_indicators(config: &UniverseConfig) -> Vec<IndicatorType> {
    vec![
        IndicatorType::Sma(config.trend_sma_period),
        IndicatorType::VolumeSma(config.volume_avg_period),
    ]
}

pub fn is_eligible(data: &CodeData, idx: usize, config: &UniverseConfig) -> bool {
    let Some(bar) = data.ohlcv.get(idx) else {
        return false;
    };
    if config.excluded_sectors.iter().any(|s| s == &data.sector) {
        return false;
    }
    if !(bar.close > config.min_price) {
        return false;
    }
    let Some(avg_volume) = data.indicator(IndicatorType::VolumeSma(config.volume_avg_period), idx)
    else {
        return false;
    };
    if !(avg_volume > config.min_avg_volume) {
        return false;
    }
    match data.indicator(IndicatorType::Sma(config.trend_sma_period), idx) {
        Some(trend) => bar.close > trend,
        None => false,
    }
}

/// Instruments eligible on `date`, in input order.
pub fn filter_universe<'a>(
    instruments: &'a [CodeData],
    date: NaiveDate,
    config: &UniverseConfig,
) -> Vec<&'a CodeData> {
    instruments
        .iter()
        .filter(|data| {
            data.get_bar_index(date)
                .is_some_and(|idx| is_eligible(data, idx, config))
        })
        .collect()
}
