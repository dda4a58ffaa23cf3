//! Simple Moving Average of close.
//!
//! SMA(n)[i] = sum(C[i-j] for j in 0..n) / n, maintained as a running sum.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values: rolling_mean(bars, period, |b| b.close),
    }
}

/// Rolling mean of an arbitrary bar field, shared with the volume average.
pub(crate) fn rolling_mean<F>(bars: &[OhlcvBar], period: usize, field: F) -> Vec<IndicatorPoint>
where
    F: Fn(&OhlcvBar) -> f64,
{
    let mut values = Vec::with_capacity(bars.len());
    if period == 0 {
        values.extend(bars.iter().map(|b| IndicatorPoint::invalid(b.date)));
        return values;
    }

    let mut sum = 0.0;
    for (i, bar) in bars.iter().enumerate() {
        sum += field(bar);
        if i >= period {
            sum -= field(&bars[i - period]);
        }
        if i + 1 >= period {
            values.push(IndicatorPoint::valid(bar.date, sum / period as f64));
        } else {
            values.push(IndicatorPoint::invalid(bar.date));
        }
    }
    values
}
