//! Performance metrics and statistics.

use serde::Serialize;

use super::backtest::BacktestResult;
use super::portfolio::{EquityPoint, Portfolio};
use super::position::ExitReason;
use super::regime::RegimeState;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExitBreakdown {
    pub stopped_out: usize,
    pub target_hit: usize,
    pub time_stopped: usize,
}

impl ExitBreakdown {
    pub fn count(&self, reason: ExitReason) -> usize {
        match reason {
            ExitReason::StoppedOut => self.stopped_out,
            ExitReason::TargetHit => self.target_hit,
            ExitReason::TimeStopped => self.time_stopped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of sessions below a prior equity peak.
    pub max_drawdown_duration: i64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Mean P&L per trade.
    pub expectancy: f64,
    /// Mean sessions held.
    pub avg_holding_days: f64,
    /// Fraction of sessions with at least one open position.
    pub exposure: f64,
    pub exit_reasons: ExitBreakdown,
    /// Buy-and-hold return of the benchmark over the same sessions.
    pub benchmark_return: Option<f64>,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio, risk_free_rate: f64) -> Self {
        let equity_curve = &portfolio.equity_curve;
        let trades = &portfolio.closed_trades;
        let initial_capital = portfolio.initial_capital;

        let final_equity = portfolio.final_equity();
        let total_return = if initial_capital > 0.0 {
            (final_equity - initial_capital) / initial_capital
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) =
            drawdown_stats(equity_curve.iter().map(|p| p.equity));

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, daily_rf);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_sessions = 0usize;
        let mut exit_reasons = ExitBreakdown::default();

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_sessions += trade.holding_days;
            match trade.exit_reason {
                ExitReason::StoppedOut => exit_reasons.stopped_out += 1,
                ExitReason::TargetHit => exit_reasons.target_hit += 1,
                ExitReason::TimeStopped => exit_reasons.time_stopped += 1,
            }
        }

        let total_trades = trades.len();
        let per_trade = |total: f64, n: usize| if n > 0 { total / n as f64 } else { 0.0 };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let exposed = equity_curve.iter().filter(|p| p.open_positions > 0).count();

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate: per_trade(trades_won as f64, total_trades),
            profit_factor,
            avg_win: per_trade(total_wins, trades_won),
            avg_loss: per_trade(total_losses, trades_lost),
            largest_win,
            largest_loss,
            expectancy: per_trade(total_wins - total_losses, total_trades),
            avg_holding_days: per_trade(total_sessions as f64, total_trades),
            exposure: per_trade(exposed as f64, equity_curve.len()),
            exit_reasons,
            benchmark_return: None,
        }
    }

    pub fn from_result(result: &BacktestResult, risk_free_rate: f64) -> Self {
        Metrics {
            benchmark_return: benchmark_return(&result.regime),
            ..Metrics::compute(&result.portfolio, risk_free_rate)
        }
    }
}

pub fn benchmark_return(regime: &[RegimeState]) -> Option<f64> {
    let first = regime.first()?.close;
    let last = regime.last()?.close;
    (first > 0.0).then(|| (last - first) / first)
}

/// Max drawdown fraction and longest below-peak run over an equity path.
pub(crate) fn drawdown_stats<I>(equity: I) -> (f64, i64)
where
    I: IntoIterator<Item = f64>,
{
    let mut iter = equity.into_iter();
    let Some(mut peak) = iter.next() else {
        return (0.0, 0);
    };

    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for equity in iter {
        if equity > peak {
            peak = equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
            if equity < peak {
                current_dd_duration += 1;
                max_dd_duration = max_dd_duration.max(current_dd_duration);
            }
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 {
                (curr - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;

    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess_return = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside_sum: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sum / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
