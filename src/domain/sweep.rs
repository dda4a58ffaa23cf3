//! Parameter grid sweep over repeated backtest runs.
//!
//! Every combination of the Cartesian product is substituted into a clone of
//! the base configuration and run independently. Rows come back in grid
//! order whether the runs execute sequentially or through rayon.

use log::{debug, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::domain::backtest::{MarketData, run_backtest};
use crate::domain::config::{BacktestConfig, NUMERIC_PARAMS};
use crate::domain::config_validation::validate_config;
use crate::domain::error::SwingtraderError;
use crate::domain::metrics::Metrics;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    axes: Vec<(String, Vec<f64>)>,
}

impl SweepGrid {
    pub fn new() -> Self {
        SweepGrid { axes: Vec::new() }
    }

    /// Add an axis. Unknown parameter names are rejected here rather than
    /// per combination.
    pub fn with_axis(mut self, param: &str, values: Vec<f64>) -> Result<Self, SwingtraderError> {
        let (section, key) = param.split_once('.').unwrap_or(("sweep", param));
        if !NUMERIC_PARAMS.contains(&param) {
            return Err(SwingtraderError::invalid(section, key, "unknown sweep parameter"));
        }
        if values.is_empty() {
            return Err(SwingtraderError::invalid(section, key, "no candidate values"));
        }
        self.axes.push((param.to_string(), values));
        Ok(self)
    }

    /// Read `[sweep]` entries such as `risk.stop_atr_multiple = 1.5, 2.0, 2.5`.
    pub fn from_port(port: &dyn ConfigPort) -> Result<Self, SwingtraderError> {
        let mut grid = SweepGrid::new();
        for &param in NUMERIC_PARAMS {
            if let Some(raw) = port.get_string("sweep", param) {
                grid = grid.with_axis(param, parse_values(param, &raw)?)?;
            }
        }
        Ok(grid)
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn len(&self) -> usize {
        if self.axes.is_empty() {
            0
        } else {
            self.axes.iter().map(|(_, v)| v.len()).product()
        }
    }

    /// Cartesian product; the first axis varies slowest.
    pub fn combinations(&self) -> Vec<Vec<(String, f64)>> {
        if self.axes.is_empty() {
            return Vec::new();
        }
        self.axes.iter().fold(vec![Vec::new()], |acc, (param, values)| {
            acc.into_iter()
                .flat_map(|prefix| {
                    values.iter().map(move |&v| {
                        let mut combo = prefix.clone();
                        combo.push((param.clone(), v));
                        combo
                    })
                })
                .collect()
        })
    }
}

impl Default for SweepGrid {
    fn default() -> Self {
        SweepGrid::new()
    }
}

fn parse_values(param: &str, raw: &str) -> Result<Vec<f64>, SwingtraderError> {
    let (section, key) = param.split_once('.').unwrap_or(("sweep", param));
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>().map_err(|_| {
                SwingtraderError::invalid(section, key, format!("'{s}' is not a number"))
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub profit_factor: f64,
    pub total_trades: usize,
    pub total_return: f64,
    pub win_rate: f64,
}

impl From<&Metrics> for RunSummary {
    fn from(m: &Metrics) -> Self {
        RunSummary {
            sharpe_ratio: m.sharpe_ratio,
            max_drawdown: m.max_drawdown,
            profit_factor: m.profit_factor,
            total_trades: m.total_trades,
            total_return: m.total_return,
            win_rate: m.win_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepRow {
    pub params: Vec<(String, f64)>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepOutcome {
    pub rows: Vec<SweepRow>,
    /// Combinations rejected by config validation.
    pub invalid: usize,
    /// Combinations never started because the time budget ran out.
    pub unscheduled: usize,
}

enum ComboResult {
    Row(SweepRow),
    Invalid,
    Unscheduled,
}

fn apply_combination(
    base: &BacktestConfig,
    combo: &[(String, f64)],
) -> Result<BacktestConfig, SwingtraderError> {
    let mut config = base.clone();
    for (param, value) in combo {
        config.set_param(param, *value)?;
    }
    validate_config(&config)?;
    Ok(config)
}

fn run_combination(
    data: &MarketData,
    base: &BacktestConfig,
    combo: &[(String, f64)],
    deadline: Option<Instant>,
) -> Result<ComboResult, SwingtraderError> {
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Ok(ComboResult::Unscheduled);
    }

    let config = match apply_combination(base, combo) {
        Ok(config) => config,
        Err(e) => {
            warn!("skipping {}: {}", describe(combo), e);
            return Ok(ComboResult::Invalid);
        }
    };

    let result = run_backtest(data, &config)?;
    let metrics = Metrics::from_result(&result, config.simulation.risk_free_rate);
    debug!(
        "{}: sharpe {:.3}, {} trades",
        describe(combo),
        metrics.sharpe_ratio,
        metrics.total_trades
    );

    Ok(ComboResult::Row(SweepRow {
        params: combo.to_vec(),
        summary: RunSummary::from(&metrics),
    }))
}

pub fn describe(combo: &[(String, f64)]) -> String {
    combo
        .iter()
        .map(|(p, v)| format!("{p}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn run_sweep(
    data: &MarketData,
    base: &BacktestConfig,
    grid: &SweepGrid,
    time_budget: Option<Duration>,
) -> Result<SweepOutcome, SwingtraderError> {
    let combos = grid.combinations();
    let deadline = time_budget.map(|budget| Instant::now() + budget);
    info!("sweeping {} combinations", combos.len());

    #[cfg(feature = "parallel")]
    let results: Vec<ComboResult> = combos
        .par_iter()
        .map(|combo| run_combination(data, base, combo, deadline))
        .collect::<Result<Vec<_>, _>>()?;

    #[cfg(not(feature = "parallel"))]
    let results: Vec<ComboResult> = combos
        .iter()
        .map(|combo| run_combination(data, base, combo, deadline))
        .collect::<Result<Vec<_>, _>>()?;

    let mut outcome = SweepOutcome::default();
    for result in results {
        match result {
            ComboResult::Row(row) => outcome.rows.push(row),
            ComboResult::Invalid => outcome.invalid += 1,
            ComboResult::Unscheduled => outcome.unscheduled += 1,
        }
    }
    if outcome.unscheduled > 0 {
        warn!(
            "time budget exhausted, {} combinations not run",
            outcome.unscheduled
        );
    }
    Ok(outcome)
}
