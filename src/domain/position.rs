//! Position lifecycle and closed-trade records.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StoppedOut,
    TargetHit,
    TimeStopped,
}

impl ExitReason {
    pub const ALL: [ExitReason; 3] = [
        ExitReason::StoppedOut,
        ExitReason::TargetHit,
        ExitReason::TimeStopped,
    ];
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StoppedOut => write!(f, "stopped_out"),
            ExitReason::TargetHit => write!(f, "target_hit"),
            ExitReason::TimeStopped => write!(f, "time_stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Open,
    Closed(ExitReason),
}

/// Exit resolved against a single bar; `price` is the market reference
/// before any slippage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitDecision {
    pub reason: ExitReason,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub code: String,
    pub sector: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: i64,
    pub initial_stop: f64,
    pub stop: f64,
    pub target: f64,
    pub atr_at_entry: f64,
    pub entry_commission: f64,
    pub trailing_armed: bool,
    pub high_water_mark: f64,
    /// Sessions elapsed since the entry session (0 on the entry day).
    pub sessions_held: usize,
    /// Most recent close, used to mark the position when a bar is missing.
    pub last_price: f64,
    pub state: PositionState,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.state == PositionState::Open
    }

    pub fn market_value(&self) -> f64 {
        self.shares as f64 * self.last_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.shares as f64 * (price - self.entry_price)
    }

    /// Resolve exits against one bar.
    ///
    /// Order: time stop (at the open), then stop (at the stop price), then
    /// target (at the target price). When both levels trade inside the same
    /// bar the stop wins.
    pub fn check_exit(&self, bar: &OhlcvBar, time_stop_days: usize) -> Option<ExitDecision> {
        if self.sessions_held >= time_stop_days {
            return Some(ExitDecision {
                reason: ExitReason::TimeStopped,
                price: bar.open,
            });
        }
        if bar.low <= self.stop {
            return Some(ExitDecision {
                reason: ExitReason::StoppedOut,
                price: self.stop,
            });
        }
        if bar.high >= self.target {
            return Some(ExitDecision {
                reason: ExitReason::TargetHit,
                price: self.target,
            });
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub code: String,
    pub sector: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: i64,
    pub initial_stop: f64,
    pub atr_at_entry: f64,
    /// Entry plus exit commission.
    pub commission: f64,
    pub pnl: f64,
    /// Sessions between entry and exit.
    pub holding_days: usize,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn return_pct(&self) -> f64 {
        let cost = self.entry_price * self.shares as f64;
        if cost > 0.0 {
            self.pnl / cost * 100.0
        } else {
            0.0
        }
    }

    /// P&L in units of initial risk (entry minus initial stop).
    pub fn r_multiple(&self) -> Option<f64> {
        let risk = (self.entry_price - self.initial_stop) * self.shares as f64;
        (risk > 0.0).then(|| self.pnl / risk)
    }
}
