//! Backtest engine and daily event loop.
//!
//! One run is a pure function of market data and configuration. Each day:
//! 1. fill entries queued at the previous close, at today's open
//! 2. resolve exits on open positions in insertion order
//! 3. ratchet trailing stops on the survivors
//! 4. if the regime is bullish: filter, rank, trigger, admit up to capacity
//! 5. record the end-of-day snapshot

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::code_data::{CodeData, UNKNOWN_SECTOR};
use crate::domain::config::BacktestConfig;
use crate::domain::config_validation::validate_config;
use crate::domain::entry_trigger::{self, Signal, scan_watchlist};
use crate::domain::error::SwingtraderError;
use crate::domain::execution::{EntryRejection, ExecutionConfig, enter_long, exit_position};
use crate::domain::indicator::IndicatorType;
use crate::domain::momentum::{WatchlistEntry, rank_instruments};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::portfolio::{PendingEntry, Portfolio};
use crate::domain::regime::{RegimeState, compute_regime};
use crate::domain::risk::{trailing_atr, update_trailing_stop};
use crate::domain::universe_filter::{self, filter_universe};

/// Immutable inputs shared by every run.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    pub benchmark: Vec<OhlcvBar>,
    pub instruments: BTreeMap<String, Vec<OhlcvBar>>,
    pub sectors: HashMap<String, String>,
}

impl MarketData {
    pub fn sector_of(&self, code: &str) -> &str {
        self.sectors
            .get(code)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_SECTOR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    MissingBar,
    Gap,
    Sizing,
    InsufficientCash,
    PositionLimit,
    SectorLimit,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionKind::MissingBar => "missing_bar",
            RejectionKind::Gap => "gap",
            RejectionKind::Sizing => "sizing",
            RejectionKind::InsufficientCash => "insufficient_cash",
            RejectionKind::PositionLimit => "position_limit",
            RejectionKind::SectorLimit => "sector_limit",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub date: NaiveDate,
    pub code: String,
    pub kind: RejectionKind,
    pub detail: String,
}

/// Audit trail for one simulated day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayLog {
    pub date: NaiveDate,
    pub bullish: bool,
    pub watchlist: Vec<WatchlistEntry>,
    /// Signals admitted for a fill at the next open.
    pub signals: Vec<Signal>,
    pub rejections: Vec<Rejection>,
}

impl DayLog {
    fn new(date: NaiveDate, bullish: bool) -> Self {
        DayLog {
            date,
            bullish,
            watchlist: Vec::new(),
            signals: Vec::new(),
            rejections: Vec::new(),
        }
    }

    fn reject(&mut self, code: &str, kind: RejectionKind, detail: String) {
        debug!("{} {}: rejected ({}: {})", self.date, code, kind, detail);
        self.rejections.push(Rejection {
            date: self.date,
            code: code.to_string(),
            kind,
            detail,
        });
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    pub daily_log: Vec<DayLog>,
    pub regime: Vec<RegimeState>,
    /// False when the run was cancelled before the last day.
    pub completed: bool,
}

/// Indicators each instrument needs for one configuration.
pub fn required_indicators(config: &BacktestConfig) -> Vec<IndicatorType> {
    let mut types = universe_filter::required_indicators(&config.universe);
    types.extend(entry_trigger::required_indicators(
        &config.entry,
        config.risk.atr_period,
    ));
    types
}

pub fn run_backtest(
    data: &MarketData,
    config: &BacktestConfig,
) -> Result<BacktestResult, SwingtraderError> {
    run_backtest_with_cancel(data, config, None)
}

/// Run the simulation, checking `cancel` between days.
pub fn run_backtest_with_cancel(
    data: &MarketData,
    config: &BacktestConfig,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestResult, SwingtraderError> {
    validate_config(config)?;
    let sim = &config.simulation;

    let regime: Vec<RegimeState> = compute_regime(&data.benchmark, &config.regime)
        .into_iter()
        .filter(|r| r.date >= sim.start_date && r.date <= sim.end_date)
        .collect();
    if regime.is_empty() {
        return Err(SwingtraderError::NoTradingDays {
            start: sim.start_date,
            end: sim.end_date,
        });
    }

    let benchmark = CodeData::new(
        config.regime.benchmark.clone(),
        String::new(),
        data.benchmark.clone(),
    );
    let types = required_indicators(config);
    let instruments: Vec<CodeData> = data
        .instruments
        .iter()
        .map(|(code, bars)| {
            CodeData::new(code.clone(), data.sector_of(code).to_string(), bars.clone())
                .with_indicators(&types)
        })
        .collect();

    let mut engine = Engine {
        config,
        exec: ExecutionConfig::from(sim),
        benchmark: &benchmark,
        instruments: &instruments,
        lookup: instruments.iter().map(|cd| (cd.code.as_str(), cd)).collect(),
        portfolio: Portfolio::new(sim.initial_capital),
        last_entry_day: HashMap::new(),
    };

    let mut daily_log = Vec::with_capacity(regime.len());
    let mut completed = true;

    for (day, state) in regime.iter().enumerate() {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            warn!("backtest cancelled at {}", state.date);
            completed = false;
            break;
        }
        daily_log.push(engine.step(day, state));
    }

    let mut portfolio = engine.portfolio;
    if !portfolio.pending.is_empty() {
        debug!(
            "discarding {} entries queued on the last day",
            portfolio.pending.len()
        );
        portfolio.pending.clear();
    }

    info!(
        "backtest complete: {} days, {} trades, {} open, final equity {:.2}",
        daily_log.len(),
        portfolio.closed_trades.len(),
        portfolio.position_count(),
        portfolio.final_equity()
    );

    Ok(BacktestResult {
        portfolio,
        daily_log,
        regime,
        completed,
    })
}

struct Engine<'a> {
    config: &'a BacktestConfig,
    exec: ExecutionConfig,
    benchmark: &'a CodeData,
    instruments: &'a [CodeData],
    lookup: HashMap<&'a str, &'a CodeData>,
    portfolio: Portfolio,
    last_entry_day: HashMap<String, usize>,
}

impl<'a> Engine<'a> {
    fn step(&mut self, day: usize, state: &RegimeState) -> DayLog {
        let date = state.date;
        let mut log = DayLog::new(date, state.bullish);

        self.fill_pending(day, date, &mut log);
        let closed_today = self.process_exits(date);
        self.update_trailing(date);
        if state.bullish {
            self.scan_for_entries(day, date, &closed_today, &mut log);
        }
        self.portfolio.record_snapshot(date, state.bullish);

        log
    }

    fn fill_pending(&mut self, day: usize, date: NaiveDate, log: &mut DayLog) {
        let pending = std::mem::take(&mut self.portfolio.pending);

        for entry in pending {
            let Some(bar) = self.lookup.get(entry.code.as_str()).and_then(|d| d.get_bar(date))
            else {
                log.reject(&entry.code, RejectionKind::MissingBar, "no bar at fill".into());
                continue;
            };

            let sizing_equity = self.portfolio.total_equity();
            match enter_long(
                &mut self.portfolio,
                &entry,
                bar,
                sizing_equity,
                self.config.entry.max_gap_percent,
                &self.config.risk,
                &self.exec,
            ) {
                Ok(fill) => {
                    debug!(
                        "{} {}: filled {} @ {:.2}",
                        date, entry.code, fill.shares, fill.execution_price
                    );
                    self.last_entry_day.insert(entry.code.clone(), day);
                }
                Err(rejection) => {
                    let kind = match rejection {
                        EntryRejection::GapTooLarge { .. } => RejectionKind::Gap,
                        EntryRejection::Sizing(_) => RejectionKind::Sizing,
                        EntryRejection::InsufficientCash { .. } => RejectionKind::InsufficientCash,
                    };
                    log.reject(&entry.code, kind, rejection.to_string());
                }
            }
        }
    }

    fn process_exits(&mut self, date: NaiveDate) -> HashSet<String> {
        let time_stop_days = self.config.risk.time_stop_days;
        let mut closed = HashSet::new();
        let mut i = 0;

        while i < self.portfolio.positions.len() {
            let position = &mut self.portfolio.positions[i];
            let Some(bar) = self
                .lookup
                .get(position.code.as_str())
                .and_then(|d| d.get_bar(date))
            else {
                i += 1;
                continue;
            };

            if position.entry_date < date {
                position.sessions_held += 1;
            }

            match position.check_exit(bar, time_stop_days) {
                Some(decision) => {
                    if let Some(trade) =
                        exit_position(&mut self.portfolio, i, decision, date, &self.exec)
                    {
                        debug!(
                            "{} {}: {} @ {:.2}, pnl {:.2}",
                            date, trade.code, trade.exit_reason, trade.exit_price, trade.pnl
                        );
                        closed.insert(trade.code);
                    }
                }
                None => i += 1,
            }
        }

        closed
    }

    fn update_trailing(&mut self, date: NaiveDate) {
        let risk = &self.config.risk;
        for position in &mut self.portfolio.positions {
            let Some(data) = self.lookup.get(position.code.as_str()) else {
                continue;
            };
            let Some(idx) = data.get_bar_index(date) else {
                continue;
            };
            let bar = &data.ohlcv[idx];
            let current_atr = data.indicator(IndicatorType::Atr(risk.atr_period), idx);
            let atr = trailing_atr(position, current_atr, risk.trailing_atr_mode);
            update_trailing_stop(position, bar.high, atr, risk);
            position.last_price = bar.close;
        }
    }

    fn is_blocked(&self, code: &str, day: usize, closed_today: &HashSet<String>) -> bool {
        if self.portfolio.has_position(code)
            || self.portfolio.has_pending(code)
            || closed_today.contains(code)
        {
            return true;
        }
        let cooldown = self.config.entry.reentry_cooldown_days;
        self.last_entry_day
            .get(code)
            .is_some_and(|&entered| day - entered < cooldown)
    }

    fn scan_for_entries(
        &mut self,
        day: usize,
        date: NaiveDate,
        closed_today: &HashSet<String>,
        log: &mut DayLog,
    ) {
        let eligible = filter_universe(self.instruments, date, &self.config.universe);
        let watchlist = rank_instruments(&eligible, self.benchmark, date, &self.config.ranking);

        let signals = scan_watchlist(
            &watchlist,
            &self.lookup,
            date,
            &self.config.entry,
            self.config.risk.atr_period,
            |code| self.is_blocked(code, day, closed_today),
        );

        let max_positions = self.config.risk.max_positions;
        let max_sector = self.config.risk.max_sector_positions;

        for signal in signals {
            if self.portfolio.committed_count() >= max_positions {
                log.reject(
                    &signal.code,
                    RejectionKind::PositionLimit,
                    format!("{max_positions} positions committed"),
                );
                continue;
            }
            if self.portfolio.committed_sector_count(&signal.sector) >= max_sector {
                log.reject(
                    &signal.code,
                    RejectionKind::SectorLimit,
                    format!("{max_sector} positions committed in {}", signal.sector),
                );
                continue;
            }

            self.portfolio.pending.push(PendingEntry {
                code: signal.code.clone(),
                sector: signal.sector.clone(),
                signal_date: date,
                signal_close: signal.signal_close,
                atr: signal.atr,
                rank: signal.rank,
            });
            log.signals.push(signal);
        }

        log.watchlist = watchlist;
    }
}
