//! Monte Carlo trade-sequence shuffling.
//!
//! Each iteration permutes the realised trade P&Ls (without replacement),
//! replays them from the starting capital, and records the final value and
//! max drawdown. Iteration `i` seeds its own RNG with `seed + i`, so results
//! do not depend on scheduling.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::domain::config::MonteCarloConfig;
use crate::domain::metrics::drawdown_stats;
use crate::domain::position::Trade;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Replay {
    pub final_value: f64,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloSummary {
    pub iterations: usize,
    pub trade_count: usize,
    pub initial_capital: f64,
    pub median_final_value: f64,
    pub p5_final_value: f64,
    pub p95_final_value: f64,
    pub median_max_drawdown: f64,
    pub p95_max_drawdown: f64,
    pub worst_max_drawdown: f64,
    pub drawdown_threshold: f64,
    pub prob_drawdown_exceeds: f64,
    pub prob_loss: f64,
}

/// Trade P&Ls in exit-date order.
pub fn trade_pnls(trades: &[Trade]) -> Vec<f64> {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.exit_date);
    ordered.iter().map(|t| t.pnl).collect()
}

pub fn permute_pnls(pnls: &[f64], seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut shuffled = pnls.to_vec();
    shuffled.shuffle(&mut rng);
    shuffled
}

/// Apply P&Ls in sequence starting from `initial_capital`.
pub fn replay(pnls: &[f64], initial_capital: f64) -> Replay {
    let path = std::iter::once(initial_capital).chain(pnls.iter().scan(
        initial_capital,
        |equity, pnl| {
            *equity += pnl;
            Some(*equity)
        },
    ));
    let (max_drawdown, _) = drawdown_stats(path);
    Replay {
        final_value: initial_capital + pnls.iter().sum::<f64>(),
        max_drawdown,
    }
}

fn run_iteration(pnls: &[f64], initial_capital: f64, seed: u64, i: usize) -> Replay {
    replay(&permute_pnls(pnls, seed.wrapping_add(i as u64)), initial_capital)
}

pub fn run_monte_carlo(
    trades: &[Trade],
    initial_capital: f64,
    config: &MonteCarloConfig,
) -> Option<MonteCarloSummary> {
    if trades.is_empty() || config.iterations == 0 {
        return None;
    }
    let pnls = trade_pnls(trades);

    #[cfg(feature = "parallel")]
    let replays: Vec<Replay> = (0..config.iterations)
        .into_par_iter()
        .map(|i| run_iteration(&pnls, initial_capital, config.seed, i))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let replays: Vec<Replay> = (0..config.iterations)
        .map(|i| run_iteration(&pnls, initial_capital, config.seed, i))
        .collect();

    Some(summarize(&replays, pnls.len(), initial_capital, config))
}

fn summarize(
    replays: &[Replay],
    trade_count: usize,
    initial_capital: f64,
    config: &MonteCarloConfig,
) -> MonteCarloSummary {
    let mut finals: Vec<f64> = replays.iter().map(|r| r.final_value).collect();
    let mut drawdowns: Vec<f64> = replays.iter().map(|r| r.max_drawdown).collect();
    finals.sort_by(f64::total_cmp);
    drawdowns.sort_by(f64::total_cmp);

    let n = replays.len() as f64;
    let exceeded = drawdowns
        .iter()
        .filter(|&&dd| dd > config.drawdown_threshold)
        .count();
    let losses = finals.iter().filter(|&&v| v < initial_capital).count();

    MonteCarloSummary {
        iterations: replays.len(),
        trade_count,
        initial_capital,
        median_final_value: percentile_sorted(&finals, 50.0),
        p5_final_value: percentile_sorted(&finals, 5.0),
        p95_final_value: percentile_sorted(&finals, 95.0),
        median_max_drawdown: percentile_sorted(&drawdowns, 50.0),
        p95_max_drawdown: percentile_sorted(&drawdowns, 95.0),
        worst_max_drawdown: drawdowns.last().copied().unwrap_or(0.0),
        drawdown_threshold: config.drawdown_threshold,
        prob_drawdown_exceeds: exceeded as f64 / n,
        prob_loss: losses as f64 / n,
    }
}

/// Linear interpolation between closest ranks; `p` in [0, 100].
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
