//! CSV report adapter implementing ReportPort.
//!
//! Writes one file per table into the output directory:
//! `trades.csv`, `equity.csv`, `signals.csv`, `summary.csv` for a backtest,
//! `sweep.csv` for a grid sweep and `monte_carlo.csv` for a shuffle run.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use log::info;
use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::SwingtraderError;
use crate::domain::metrics::Metrics;
use crate::domain::monte_carlo::MonteCarloSummary;
use crate::domain::position::ExitReason;
use crate::domain::sweep::SweepOutcome;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter {
    signal_log: bool,
}

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self { signal_log: true }
    }

    /// Skip `signals.csv`, which grows with watchlist size times sessions.
    pub fn without_signal_log(mut self) -> Self {
        self.signal_log = false;
        self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum LogEvent {
    Watchlist,
    Signal,
    Rejection,
}

/// One row of the per-day audit log. Columns that do not apply to an event
/// are left empty.
#[derive(Debug, Serialize)]
struct SignalLogRow<'a> {
    date: NaiveDate,
    bullish: bool,
    event: LogEvent,
    code: &'a str,
    sector: Option<&'a str>,
    rank: Option<usize>,
    score: Option<f64>,
    signal_close: Option<f64>,
    atr: Option<f64>,
    detail: String,
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, SwingtraderError> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut count = 0;
    for row in rows {
        wtr.serialize(row)?;
        count += 1;
    }
    wtr.flush()?;
    Ok(count)
}

fn write_signal_log(result: &BacktestResult, path: &Path) -> Result<usize, SwingtraderError> {
    let rows = result.daily_log.iter().flat_map(|day| {
        let watchlist = day.watchlist.iter().map(move |w| SignalLogRow {
            date: day.date,
            bullish: day.bullish,
            event: LogEvent::Watchlist,
            code: &w.code,
            sector: Some(w.sector.as_str()),
            rank: Some(w.rank),
            score: Some(w.score),
            signal_close: None,
            atr: None,
            detail: String::new(),
        });
        let signals = day.signals.iter().map(move |s| SignalLogRow {
            date: day.date,
            bullish: day.bullish,
            event: LogEvent::Signal,
            code: &s.code,
            sector: Some(s.sector.as_str()),
            rank: Some(s.rank),
            score: None,
            signal_close: Some(s.signal_close),
            atr: Some(s.atr),
            detail: s.trigger.to_string(),
        });
        let rejections = day.rejections.iter().map(move |r| SignalLogRow {
            date: day.date,
            bullish: day.bullish,
            event: LogEvent::Rejection,
            code: &r.code,
            sector: None,
            rank: None,
            score: None,
            signal_close: None,
            atr: None,
            detail: format!("{}: {}", r.kind, r.detail),
        });
        watchlist.chain(signals).chain(rejections)
    });
    write_rows(path, rows)
}

fn summary_rows(metrics: &Metrics) -> Vec<(String, String)> {
    let mut rows: Vec<(String, String)> = vec![
        ("total_return".into(), metrics.total_return.to_string()),
        ("annualized_return".into(), metrics.annualized_return.to_string()),
        ("sharpe_ratio".into(), metrics.sharpe_ratio.to_string()),
        ("sortino_ratio".into(), metrics.sortino_ratio.to_string()),
        ("max_drawdown".into(), metrics.max_drawdown.to_string()),
        (
            "max_drawdown_duration".into(),
            metrics.max_drawdown_duration.to_string(),
        ),
        ("total_trades".into(), metrics.total_trades.to_string()),
        ("trades_won".into(), metrics.trades_won.to_string()),
        ("trades_lost".into(), metrics.trades_lost.to_string()),
        ("trades_breakeven".into(), metrics.trades_breakeven.to_string()),
        ("win_rate".into(), metrics.win_rate.to_string()),
        ("profit_factor".into(), metrics.profit_factor.to_string()),
        ("avg_win".into(), metrics.avg_win.to_string()),
        ("avg_loss".into(), metrics.avg_loss.to_string()),
        ("largest_win".into(), metrics.largest_win.to_string()),
        ("largest_loss".into(), metrics.largest_loss.to_string()),
        ("expectancy".into(), metrics.expectancy.to_string()),
        ("avg_holding_days".into(), metrics.avg_holding_days.to_string()),
        ("exposure".into(), metrics.exposure.to_string()),
    ];
    for reason in ExitReason::ALL {
        rows.push((
            format!("exits_{reason}"),
            metrics.exit_reasons.count(reason).to_string(),
        ));
    }
    if let Some(bench) = metrics.benchmark_return {
        rows.push(("benchmark_return".into(), bench.to_string()));
    }
    rows
}

impl ReportPort for CsvReportAdapter {
    fn write_backtest(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), SwingtraderError> {
        fs::create_dir_all(output_dir)?;

        let trades = write_rows(
            &output_dir.join("trades.csv"),
            &result.portfolio.closed_trades,
        )?;
        let days = write_rows(
            &output_dir.join("equity.csv"),
            &result.portfolio.equity_curve,
        )?;

        let mut wtr = csv::Writer::from_path(output_dir.join("summary.csv"))?;
        wtr.write_record(["metric", "value"])?;
        for (name, value) in summary_rows(metrics) {
            wtr.write_record([name, value])?;
        }
        wtr.flush()?;

        if self.signal_log {
            let events = write_signal_log(result, &output_dir.join("signals.csv"))?;
            info!("wrote {events} signal log rows");
        }

        info!(
            "wrote {trades} trades and {days} equity points to {}",
            output_dir.display()
        );
        Ok(())
    }

    fn write_sweep(
        &self,
        outcome: &SweepOutcome,
        output_dir: &Path,
    ) -> Result<(), SwingtraderError> {
        fs::create_dir_all(output_dir)?;
        let mut wtr = csv::Writer::from_path(output_dir.join("sweep.csv"))?;

        if let Some(first) = outcome.rows.first() {
            let mut header: Vec<&str> = first.params.iter().map(|(p, _)| p.as_str()).collect();
            header.extend([
                "sharpe_ratio",
                "max_drawdown",
                "profit_factor",
                "total_trades",
                "total_return",
                "win_rate",
            ]);
            wtr.write_record(&header)?;
        }

        for row in &outcome.rows {
            let s = &row.summary;
            let mut record: Vec<String> = row.params.iter().map(|(_, v)| v.to_string()).collect();
            record.extend([
                s.sharpe_ratio.to_string(),
                s.max_drawdown.to_string(),
                s.profit_factor.to_string(),
                s.total_trades.to_string(),
                s.total_return.to_string(),
                s.win_rate.to_string(),
            ]);
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_monte_carlo(
        &self,
        summary: &MonteCarloSummary,
        output_dir: &Path,
    ) -> Result<(), SwingtraderError> {
        fs::create_dir_all(output_dir)?;
        write_rows(&output_dir.join("monte_carlo.csv"), [summary])?;
        Ok(())
    }
}
