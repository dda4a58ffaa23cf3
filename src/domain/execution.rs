//! Fill simulation for long entries and exits.
//!
//! Market fills at the open pay slippage; stop and target exits fill at the
//! level itself. Commission is a flat fee plus a percentage of trade value.

use chrono::NaiveDate;
use std::fmt;

use super::config::{RiskConfig, SimulationConfig};
use super::entry_trigger::gap_within_limit;
use super::ohlcv::OhlcvBar;
use super::portfolio::{PendingEntry, Portfolio};
use super::position::{ExitDecision, ExitReason, Position, PositionState, Trade};
use super::risk::{SizingRejection, plan_trade};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

impl From<&SimulationConfig> for ExecutionConfig {
    fn from(sim: &SimulationConfig) -> Self {
        ExecutionConfig {
            commission_per_trade: sim.commission_per_trade,
            commission_pct: sim.commission_pct,
            slippage_pct: sim.slippage_pct,
        }
    }
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Buy: pay slightly more than the market price.
pub fn apply_slippage_long_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Sell: receive slightly less than the market price.
pub fn apply_slippage_long_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryFill {
    pub shares: i64,
    pub execution_price: f64,
    pub cost: f64,
    pub commission: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryRejection {
    GapTooLarge { gap_pct: f64 },
    Sizing(SizingRejection),
    InsufficientCash { required: f64, available: f64 },
}

impl fmt::Display for EntryRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryRejection::GapTooLarge { gap_pct } => write!(f, "opening gap {gap_pct:.2}%"),
            EntryRejection::Sizing(reason) => write!(f, "{reason}"),
            EntryRejection::InsufficientCash {
                required,
                available,
            } => write!(f, "needs {required:.2} cash, {available:.2} available"),
        }
    }
}

/// Fill a pending entry at `bar.open`.
///
/// 1. Gap check: fill-day open against signal-day close
/// 2. Apply entry slippage
/// 3. Size from `sizing_equity` and the signal ATR
/// 4. Require cost + commission within available cash
/// 5. Deduct cash and open the position
pub fn enter_long(
    portfolio: &mut Portfolio,
    entry: &PendingEntry,
    bar: &OhlcvBar,
    sizing_equity: f64,
    max_gap_percent: f64,
    risk: &RiskConfig,
    config: &ExecutionConfig,
) -> Result<EntryFill, EntryRejection> {
    if !gap_within_limit(bar, entry.signal_close, max_gap_percent) {
        return Err(EntryRejection::GapTooLarge {
            gap_pct: bar.gap_fraction(entry.signal_close) * 100.0,
        });
    }

    let execution_price = apply_slippage_long_entry(bar.open, config.slippage_pct);
    let plan = plan_trade(execution_price, entry.atr, sizing_equity, risk)
        .map_err(EntryRejection::Sizing)?;

    let cost = plan.cost();
    let commission = calculate_commission(cost, config);
    if cost + commission > portfolio.cash {
        return Err(EntryRejection::InsufficientCash {
            required: cost + commission,
            available: portfolio.cash,
        });
    }

    portfolio.cash -= cost + commission;
    portfolio.add_position(Position {
        code: entry.code.clone(),
        sector: entry.sector.clone(),
        entry_date: bar.date,
        entry_price: execution_price,
        shares: plan.shares,
        initial_stop: plan.stop,
        stop: plan.stop,
        target: plan.target,
        atr_at_entry: entry.atr,
        entry_commission: commission,
        trailing_armed: false,
        high_water_mark: execution_price,
        sessions_held: 0,
        last_price: execution_price,
        state: PositionState::Open,
    });

    Ok(EntryFill {
        shares: plan.shares,
        execution_price,
        cost,
        commission,
    })
}

/// Close the position at `index` and record its trade.
///
/// Time-stop exits are market orders at the open and pay slippage; stop and
/// target exits fill at the level.
pub fn exit_position(
    portfolio: &mut Portfolio,
    index: usize,
    decision: ExitDecision,
    exit_date: NaiveDate,
    config: &ExecutionConfig,
) -> Option<Trade> {
    let mut position = portfolio.remove_position(index)?;
    position.state = PositionState::Closed(decision.reason);

    let exit_price = match decision.reason {
        ExitReason::TimeStopped => apply_slippage_long_exit(decision.price, config.slippage_pct),
        ExitReason::StoppedOut | ExitReason::TargetHit => decision.price,
    };

    let exit_value = position.shares as f64 * exit_price;
    let exit_commission = calculate_commission(exit_value, config);
    let commission = position.entry_commission + exit_commission;
    let pnl = position.shares as f64 * (exit_price - position.entry_price) - commission;

    portfolio.cash += exit_value - exit_commission;

    let trade = Trade {
        code: position.code,
        sector: position.sector,
        entry_date: position.entry_date,
        exit_date,
        entry_price: position.entry_price,
        exit_price,
        shares: position.shares,
        initial_stop: position.initial_stop,
        atr_at_entry: position.atr_at_entry,
        commission,
        pnl,
        holding_days: position.sessions_held,
        exit_reason: decision.reason,
    };
    portfolio.record_trade(trade.clone());
    Some(trade)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn bar(day: u32, open: f64) -> OhlcvBar {
        OhlcvBar {
            code: "NVDA".into(),
            date: date(day),
            open,
            high: open + 1.0,
            low: open - 1.0,
            close: open,
            volume: 2_000_000,
        }
    }

    fn pending(signal_close: f64, atr: f64) -> PendingEntry {
        PendingEntry {
            code: "NVDA".into(),
            sector: "Technology".into(),
            signal_date: date(3),
            signal_close,
            atr,
            rank: 1,
        }
    }

    fn make_config() -> ExecutionConfig {
        ExecutionConfig {
            commission_per_trade: 10.0,
            commission_pct: 0.1,
            slippage_pct: 0.0,
        }
    }

    #[test]
    fn commission_flat_plus_pct() {
        let commission = calculate_commission(10_000.0, &make_config());
        assert!((commission - 20.0).abs() < 1e-9);
    }

    #[test]
    fn slippage_direction() {
        assert!((apply_slippage_long_entry(100.0, 0.5) - 100.5).abs() < 1e-9);
        assert!((apply_slippage_long_exit(100.0, 0.5) - 99.5).abs() < 1e-9);
    }

    #[test]
    fn execution_config_from_simulation() {
        let sim = SimulationConfig::default();
        let exec = ExecutionConfig::from(&sim);
        assert_eq!(exec.slippage_pct, 0.05);
        assert_eq!(exec.commission_per_trade, 0.0);
    }

    #[test]
    fn enter_long_sizes_and_deducts_cash() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = ExecutionConfig::default();
        let fill = enter_long(
            &mut portfolio,
            &pending(50.0, 2.0),
            &bar(4, 50.0),
            100_000.0,
            2.0,
            &RiskConfig::default(),
            &config,
        )
        .unwrap();

        assert_eq!(fill.shares, 250);
        assert!((portfolio.cash - 87_500.0).abs() < 1e-9);
        let pos = &portfolio.positions[0];
        assert_eq!(pos.stop, 46.0);
        assert_eq!(pos.target, 56.0);
        assert_eq!(pos.entry_date, date(4));
        assert_eq!(pos.sessions_held, 0);
    }

    #[test]
    fn enter_long_rejects_gap() {
        let mut portfolio = Portfolio::new(100_000.0);
        let result = enter_long(
            &mut portfolio,
            &pending(50.0, 2.0),
            &bar(4, 51.5),
            100_000.0,
            2.0,
            &RiskConfig::default(),
            &ExecutionConfig::default(),
        );
        assert!(matches!(result, Err(EntryRejection::GapTooLarge { .. })));
        assert!(portfolio.positions.is_empty());
        assert_eq!(portfolio.cash, 100_000.0);
    }

    #[test]
    fn enter_long_rejects_insufficient_cash() {
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.cash = 1_000.0;
        let result = enter_long(
            &mut portfolio,
            &pending(50.0, 2.0),
            &bar(4, 50.0),
            100_000.0,
            2.0,
            &RiskConfig::default(),
            &ExecutionConfig::default(),
        );
        assert!(matches!(result, Err(EntryRejection::InsufficientCash { .. })));
        assert!(portfolio.positions.is_empty());
    }

    #[test]
    fn enter_long_rejects_wide_stop() {
        let mut portfolio = Portfolio::new(100_000.0);
        let result = enter_long(
            &mut portfolio,
            &pending(50.0, 5.0),
            &bar(4, 50.0),
            100_000.0,
            2.0,
            &RiskConfig::default(),
            &ExecutionConfig::default(),
        );
        assert!(matches!(
            result,
            Err(EntryRejection::Sizing(SizingRejection::StopTooWide { .. }))
        ));
    }

    #[test]
    fn stop_exit_fills_at_level_without_slippage() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = ExecutionConfig {
            slippage_pct: 0.5,
            ..ExecutionConfig::default()
        };
        enter_long(
            &mut portfolio,
            &pending(50.0, 2.0),
            &bar(4, 50.0),
            100_000.0,
            2.0,
            &RiskConfig::default(),
            &ExecutionConfig::default(),
        )
        .unwrap();

        let stop = portfolio.positions[0].stop;
        let trade = exit_position(
            &mut portfolio,
            0,
            ExitDecision {
                reason: ExitReason::StoppedOut,
                price: stop,
            },
            date(5),
            &config,
        )
        .unwrap();

        assert_eq!(trade.exit_price, 46.0);
        assert!((trade.pnl - (-1000.0)).abs() < 1e-9);
        assert!(portfolio.positions.is_empty());
        assert_eq!(portfolio.closed_trades.len(), 1);
        assert!((portfolio.cash - 99_000.0).abs() < 1e-9);
    }

    #[test]
    fn time_stop_exit_pays_slippage_and_commission() {
        let mut portfolio = Portfolio::new(100_000.0);
        let config = ExecutionConfig {
            commission_per_trade: 5.0,
            commission_pct: 0.0,
            slippage_pct: 1.0,
        };
        enter_long(
            &mut portfolio,
            &pending(50.0, 2.0),
            &bar(4, 50.0),
            100_000.0,
            2.0,
            &RiskConfig::default(),
            &ExecutionConfig {
                commission_per_trade: 5.0,
                ..ExecutionConfig::default()
            },
        )
        .unwrap();
        portfolio.positions[0].sessions_held = 10;

        let trade = exit_position(
            &mut portfolio,
            0,
            ExitDecision {
                reason: ExitReason::TimeStopped,
                price: 52.0,
            },
            date(18),
            &config,
        )
        .unwrap();

        assert!((trade.exit_price - 51.48).abs() < 1e-9);
        assert!((trade.commission - 10.0).abs() < 1e-9);
        assert!((trade.pnl - (250.0 * 1.48 - 10.0)).abs() < 1e-6);
        assert_eq!(trade.holding_days, 10);
    }
}
