//! Report output port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SwingtraderError;
use crate::domain::metrics::Metrics;
use crate::domain::monte_carlo::MonteCarloSummary;
use crate::domain::sweep::SweepOutcome;
use std::path::Path;

/// Port for persisting run outputs under a directory.
pub trait ReportPort {
    fn write_backtest(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), SwingtraderError>;

    fn write_sweep(&self, outcome: &SweepOutcome, output_dir: &Path)
    -> Result<(), SwingtraderError>;

    fn write_monte_carlo(
        &self,
        summary: &MonteCarloSummary,
        output_dir: &Path,
    ) -> Result<(), SwingtraderError>;
}
