//! Portfolio state and equity tracking.

use chrono::NaiveDate;
use serde::Serialize;

use super::position::{Position, Trade};

/// End-of-day snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    pub cash: f64,
    pub positions_value: f64,
    pub open_positions: usize,
    pub bullish: bool,
}

/// A signal accepted at the close, waiting for the next session's open.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub code: String,
    pub sector: String,
    pub signal_date: NaiveDate,
    pub signal_close: f64,
    pub atr: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    /// Open positions in insertion order.
    pub positions: Vec<Position>,
    pub pending: Vec<PendingEntry>,
    pub closed_trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: Vec::new(),
            pending: Vec::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.push(position);
    }

    pub fn get_position(&self, code: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.code == code)
    }

    pub fn has_position(&self, code: &str) -> bool {
        self.positions.iter().any(|p| p.code == code)
    }

    pub fn has_pending(&self, code: &str) -> bool {
        self.pending.iter().any(|p| p.code == code)
    }

    pub fn remove_position(&mut self, index: usize) -> Option<Position> {
        (index < self.positions.len()).then(|| self.positions.remove(index))
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn sector_position_count(&self, sector: &str) -> usize {
        self.positions.iter().filter(|p| p.sector == sector).count()
    }

    /// Open positions plus entries awaiting a fill.
    pub fn committed_count(&self) -> usize {
        self.positions.len() + self.pending.len()
    }

    pub fn committed_sector_count(&self, sector: &str) -> usize {
        self.sector_position_count(sector)
            + self.pending.iter().filter(|p| p.sector == sector).count()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.closed_trades.push(trade);
    }

    pub fn positions_value(&self) -> f64 {
        self.positions.iter().map(Position::market_value).sum()
    }

    /// Cash plus every open position marked at its last known price.
    pub fn total_equity(&self) -> f64 {
        self.cash + self.positions_value()
    }

    pub fn record_snapshot(&mut self, date: NaiveDate, bullish: bool) {
        let positions_value = self.positions_value();
        self.equity_curve.push(EquityPoint {
            date,
            equity: self.cash + positions_value,
            cash: self.cash,
            positions_value,
            open_positions: self.positions.len(),
            bullish,
        });
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_capital)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::PositionState;

    fn sample_position(code: &str, sector: &str, shares: i64, last_price: f64) -> Position {
        Position {
            code: code.to_string(),
            sector: sector.to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            entry_price: 100.0,
            shares,
            initial_stop: 95.0,
            stop: 95.0,
            target: 110.0,
            atr_at_entry: 2.5,
            entry_commission: 0.0,
            trailing_armed: false,
            high_water_mark: 100.0,
            sessions_held: 0,
            last_price,
            state: PositionState::Open,
        }
    }

    fn sample_pending(code: &str, sector: &str) -> PendingEntry {
        PendingEntry {
            code: code.to_string(),
            sector: sector.to_string(),
            signal_date: NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
            signal_close: 50.0,
            atr: 1.0,
            rank: 1,
        }
    }

    #[test]
    fn new_portfolio() {
        let portfolio = Portfolio::new(100000.0);
        assert!((portfolio.cash - 100000.0).abs() < f64::EPSILON);
        assert!(portfolio.positions.is_empty());
        assert!(portfolio.pending.is_empty());
        assert!(portfolio.closed_trades.is_empty());
        assert!((portfolio.final_equity() - 100000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn positions_keep_insertion_order() {
        let mut portfolio = Portfolio::new(100000.0);
        portfolio.add_position(sample_position("ZZZ", "Energy", 10, 100.0));
        portfolio.add_position(sample_position("AAA", "Energy", 10, 100.0));

        assert_eq!(portfolio.positions[0].code, "ZZZ");
        assert!(portfolio.has_position("AAA"));
        let removed = portfolio.remove_position(0).unwrap();
        assert_eq!(removed.code, "ZZZ");
        assert!(portfolio.remove_position(5).is_none());
    }

    #[test]
    fn committed_counts_include_pending() {
        let mut portfolio = Portfolio::new(100000.0);
        portfolio.add_position(sample_position("XOM", "Energy", 10, 100.0));
        portfolio.pending.push(sample_pending("CVX", "Energy"));
        portfolio.pending.push(sample_pending("JPM", "Financials"));

        assert_eq!(portfolio.position_count(), 1);
        assert_eq!(portfolio.committed_count(), 3);
        assert_eq!(portfolio.sector_position_count("Energy"), 1);
        assert_eq!(portfolio.committed_sector_count("Energy"), 2);
        assert!(portfolio.has_pending("JPM"));
    }

    #[test]
    fn snapshot_marks_positions() {
        let mut portfolio = Portfolio::new(100000.0);
        portfolio.cash = 80000.0;
        portfolio.add_position(sample_position("XOM", "Energy", 100, 110.0));
        portfolio.add_position(sample_position("JPM", "Financials", 50, 200.0));

        let date = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
        portfolio.record_snapshot(date, true);

        let point = &portfolio.equity_curve[0];
        assert!((point.positions_value - 21000.0).abs() < 1e-9);
        assert!((point.equity - 101000.0).abs() < 1e-9);
        assert_eq!(point.open_positions, 2);
        assert!(point.bullish);
        assert!((portfolio.final_equity() - 101000.0).abs() < 1e-9);
    }
}
