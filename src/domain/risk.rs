//! Position sizing and trailing-stop management.
//!
//! Stops and targets are ATR multiples away from the fill price; size is the
//! number of whole shares whose stop-out loses `risk_per_trade` of equity.

use std::fmt;

use crate::domain::config::{RiskConfig, TrailingAtrMode};
use crate::domain::position::Position;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradePlan {
    pub entry_price: f64,
    pub stop: f64,
    pub target: f64,
    pub shares: i64,
}

impl TradePlan {
    pub fn risk_per_share(&self) -> f64 {
        self.entry_price - self.stop
    }

    pub fn cost(&self) -> f64 {
        self.shares as f64 * self.entry_price
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingRejection {
    InvalidAtr(f64),
    StopTooWide { stop_pct: f64, max_pct: f64 },
    ZeroShares,
}

impl fmt::Display for SizingRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingRejection::InvalidAtr(atr) => write!(f, "invalid ATR {atr:.4}"),
            SizingRejection::StopTooWide { stop_pct, max_pct } => {
                write!(f, "stop distance {stop_pct:.2}% exceeds {max_pct:.2}%")
            }
            SizingRejection::ZeroShares => write!(f, "position size rounds to zero shares"),
        }
    }
}

pub fn plan_trade(
    fill_price: f64,
    atr: f64,
    equity: f64,
    risk: &RiskConfig,
) -> Result<TradePlan, SizingRejection> {
    if !(atr > 0.0 && atr.is_finite()) {
        return Err(SizingRejection::InvalidAtr(atr));
    }

    let stop = fill_price - risk.stop_atr_multiple * atr;
    let target = fill_price + risk.target_atr_multiple * atr;
    let risk_per_share = fill_price - stop;

    let stop_pct = risk_per_share / fill_price * 100.0;
    if !(fill_price > 0.0) || stop_pct > risk.max_stop_percent {
        return Err(SizingRejection::StopTooWide {
            stop_pct,
            max_pct: risk.max_stop_percent,
        });
    }

    let shares = (equity * risk.risk_per_trade / risk_per_share).floor();
    if !(shares >= 1.0) {
        return Err(SizingRejection::ZeroShares);
    }

    Ok(TradePlan {
        entry_price: fill_price,
        stop,
        target,
        shares: shares as i64,
    })
}

/// ATR that drives the trailing distance for this position.
pub fn trailing_atr(position: &Position, current_atr: Option<f64>, mode: TrailingAtrMode) -> f64 {
    match mode {
        TrailingAtrMode::Frozen => position.atr_at_entry,
        TrailingAtrMode::Current => current_atr
            .filter(|atr| *atr > 0.0)
            .unwrap_or(position.atr_at_entry),
    }
}

/// Ratchet the stop after a session's high. The stop never decreases.
pub fn update_trailing_stop(position: &mut Position, high: f64, atr: f64, risk: &RiskConfig) {
    position.high_water_mark = position.high_water_mark.max(high);

    if !position.trailing_armed
        && position.high_water_mark
            >= position.entry_price + risk.trailing_activation_atr * atr
    {
        position.trailing_armed = true;
        position.stop = position.stop.max(position.entry_price);
    }

    if position.trailing_armed {
        let trailed = position.high_water_mark - risk.trailing_atr_multiple * atr;
        position.stop = position.stop.max(trailed);
    }
}
