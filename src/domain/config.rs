//! Strategy and simulation configuration.
//!
//! Every threshold used by the pipeline lives here as a named field with a
//! default. A `BacktestConfig` is an immutable value handed to each run; the
//! sweep clones it and substitutes parameters through [`BacktestConfig::set_param`].

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::SwingtraderError;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegimeConfig {
    pub benchmark: String,
    pub sma_short: usize,
    pub sma_long: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            benchmark: "SPY".to_string(),
            sma_short: 50,
            sma_long: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniverseConfig {
    /// Explicit code list; empty means every symbol the data source lists.
    pub codes: Vec<String>,
    pub min_price: f64,
    pub min_avg_volume: f64,
    pub volume_avg_period: usize,
    pub trend_sma_period: usize,
    pub excluded_sectors: Vec<String>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        UniverseConfig {
            codes: Vec::new(),
            min_price: 10.0,
            min_avg_volume: 500_000.0,
            volume_avg_period: 20,
            trend_sma_period: 200,
            excluded_sectors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingConfig {
    pub lookback_short: usize,
    pub lookback_medium: usize,
    pub lookback_long: usize,
    pub weight_short: f64,
    pub weight_medium: f64,
    pub weight_long: f64,
    pub watchlist_size: usize,
    pub sector_cap: usize,
}

impl RankingConfig {
    pub fn longest_lookback(&self) -> usize {
        self.lookback_short
            .max(self.lookback_medium)
            .max(self.lookback_long)
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        RankingConfig {
            lookback_short: 21,
            lookback_medium: 63,
            lookback_long: 126,
            weight_short: 0.20,
            weight_medium: 0.50,
            weight_long: 0.30,
            watchlist_size: 25,
            sector_cap: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryConfig {
    pub ema_period: usize,
    pub volume_pullback_window: usize,
    pub volume_baseline_window: usize,
    pub rsi_period: usize,
    pub rsi_lower: f64,
    pub rsi_upper: f64,
    pub max_gap_percent: f64,
    /// Sessions after an entry before the same code may signal again; 0 disables.
    pub reentry_cooldown_days: usize,
}

impl Default for EntryConfig {
    fn default() -> Self {
        EntryConfig {
            ema_period: 20,
            volume_pullback_window: 3,
            volume_baseline_window: 20,
            rsi_period: 14,
            rsi_lower: 40.0,
            rsi_upper: 70.0,
            max_gap_percent: 2.0,
            reentry_cooldown_days: 5,
        }
    }
}

/// Which ATR value drives the trailing-stop distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrailingAtrMode {
    /// ATR captured at the signal date, fixed for the life of the position.
    Frozen,
    /// ATR as of the current session; falls back to the entry ATR when unavailable.
    Current,
}

impl FromStr for TrailingAtrMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "frozen" => Ok(TrailingAtrMode::Frozen),
            "current" => Ok(TrailingAtrMode::Current),
            other => Err(format!("expected 'frozen' or 'current', got '{other}'")),
        }
    }
}

impl fmt::Display for TrailingAtrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrailingAtrMode::Frozen => write!(f, "frozen"),
            TrailingAtrMode::Current => write!(f, "current"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskConfig {
    pub atr_period: usize,
    pub stop_atr_multiple: f64,
    pub target_atr_multiple: f64,
    pub trailing_activation_atr: f64,
    pub trailing_atr_multiple: f64,
    pub trailing_atr_mode: TrailingAtrMode,
    pub max_stop_percent: f64,
    pub risk_per_trade: f64,
    pub max_positions: usize,
    pub max_sector_positions: usize,
    pub time_stop_days: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            atr_period: 14,
            stop_atr_multiple: 2.0,
            target_atr_multiple: 3.0,
            trailing_activation_atr: 1.5,
            trailing_atr_multiple: 2.0,
            trailing_atr_mode: TrailingAtrMode::Frozen,
            max_stop_percent: 8.0,
            risk_per_trade: 0.01,
            max_positions: 5,
            max_sector_positions: 2,
            time_stop_days: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationConfig {
    /// First date fetched from the data provider, for indicator warmup.
    pub data_start: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub slippage_pct: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub risk_free_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            data_start: NaiveDate::MIN,
            start_date: NaiveDate::MIN,
            end_date: NaiveDate::MAX,
            initial_capital: 100_000.0,
            slippage_pct: 0.05,
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            risk_free_rate: 0.045,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloConfig {
    pub iterations: usize,
    pub seed: u64,
    /// Max-drawdown fraction whose exceedance probability is reported.
    pub drawdown_threshold: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        MonteCarloConfig {
            iterations: 1000,
            seed: 42,
            drawdown_threshold: 0.20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestConfig {
    pub regime: RegimeConfig,
    pub universe: UniverseConfig,
    pub ranking: RankingConfig,
    pub entry: EntryConfig,
    pub risk: RiskConfig,
    pub simulation: SimulationConfig,
    pub monte_carlo: MonteCarloConfig,
}

/// Numeric parameters addressable as `section.key`, both in INI files and sweep grids.
pub const NUMERIC_PARAMS: &[&str] = &[
    "regime.sma_short",
    "regime.sma_long",
    "universe.min_price",
    "universe.min_avg_volume",
    "universe.volume_avg_period",
    "universe.trend_sma_period",
    "ranking.lookback_short",
    "ranking.lookback_medium",
    "ranking.lookback_long",
    "ranking.weight_short",
    "ranking.weight_medium",
    "ranking.weight_long",
    "ranking.watchlist_size",
    "ranking.sector_cap",
    "entry.ema_period",
    "entry.volume_pullback_window",
    "entry.volume_baseline_window",
    "entry.rsi_period",
    "entry.rsi_lower",
    "entry.rsi_upper",
    "entry.max_gap_percent",
    "entry.reentry_cooldown_days",
    "risk.atr_period",
    "risk.stop_atr_multiple",
    "risk.target_atr_multiple",
    "risk.trailing_activation_atr",
    "risk.trailing_atr_multiple",
    "risk.max_stop_percent",
    "risk.risk_per_trade",
    "risk.max_positions",
    "risk.max_sector_positions",
    "risk.time_stop_days",
    "backtest.initial_capital",
    "backtest.slippage_pct",
    "backtest.commission_per_trade",
    "backtest.commission_pct",
    "backtest.risk_free_rate",
    "monte_carlo.iterations",
    "monte_carlo.seed",
    "monte_carlo.drawdown_threshold",
];

const WARMUP_HOLIDAY_DAYS: usize = 14;

fn split_param(param: &str) -> (&str, &str) {
    param.split_once('.').unwrap_or(("", param))
}

fn as_count(param: &str, value: f64) -> Result<usize, SwingtraderError> {
    if value < 0.0 || value.fract() != 0.0 || !value.is_finite() {
        let (section, key) = split_param(param);
        return Err(SwingtraderError::invalid(
            section,
            key,
            format!("expected a non-negative integer, got {value}"),
        ));
    }
    Ok(value as usize)
}

impl BacktestConfig {
    /// Longest window, in sessions, any indicator or ranking lookback needs.
    pub fn warmup_sessions(&self) -> usize {
        [
            self.regime.sma_long,
            self.regime.sma_short,
            self.universe.trend_sma_period,
            self.universe.volume_avg_period,
            self.ranking.longest_lookback() + 1,
            self.entry.ema_period,
            self.entry.volume_baseline_window + self.entry.volume_pullback_window,
            self.entry.rsi_period + 1,
            self.risk.atr_period + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    /// Calendar date early enough to cover `warmup_sessions` trading days
    /// before `start_date`, allowing for weekends and holidays.
    pub fn default_data_start(&self) -> NaiveDate {
        let start = self.simulation.start_date;
        if start == NaiveDate::MIN {
            return start;
        }
        let days = (self.warmup_sessions() * 7 / 5 + WARMUP_HOLIDAY_DAYS) as i64;
        start
            .checked_sub_signed(chrono::Duration::days(days))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Substitute one numeric parameter by its `section.key` name.
    pub fn set_param(&mut self, param: &str, value: f64) -> Result<(), SwingtraderError> {
        match param {
            "regime.sma_short" => self.regime.sma_short = as_count(param, value)?,
            "regime.sma_long" => self.regime.sma_long = as_count(param, value)?,
            "universe.min_price" => self.universe.min_price = value,
            "universe.min_avg_volume" => self.universe.min_avg_volume = value,
            "universe.volume_avg_period" => {
                self.universe.volume_avg_period = as_count(param, value)?
            }
            "universe.trend_sma_period" => {
                self.universe.trend_sma_period = as_count(param, value)?
            }
            "ranking.lookback_short" => self.ranking.lookback_short = as_count(param, value)?,
            "ranking.lookback_medium" => self.ranking.lookback_medium = as_count(param, value)?,
            "ranking.lookback_long" => self.ranking.lookback_long = as_count(param, value)?,
            "ranking.weight_short" => self.ranking.weight_short = value,
            "ranking.weight_medium" => self.ranking.weight_medium = value,
            "ranking.weight_long" => self.ranking.weight_long = value,
            "ranking.watchlist_size" => self.ranking.watchlist_size = as_count(param, value)?,
            "ranking.sector_cap" => self.ranking.sector_cap = as_count(param, value)?,
            "entry.ema_period" => self.entry.ema_period = as_count(param, value)?,
            "entry.volume_pullback_window" => {
                self.entry.volume_pullback_window = as_count(param, value)?
            }
            "entry.volume_baseline_window" => {
                self.entry.volume_baseline_window = as_count(param, value)?
            }
            "entry.rsi_period" => self.entry.rsi_period = as_count(param, value)?,
            "entry.rsi_lower" => self.entry.rsi_lower = value,
            "entry.rsi_upper" => self.entry.rsi_upper = value,
            "entry.max_gap_percent" => self.entry.max_gap_percent = value,
            "entry.reentry_cooldown_days" => {
                self.entry.reentry_cooldown_days = as_count(param, value)?
            }
            "risk.atr_period" => self.risk.atr_period = as_count(param, value)?,
            "risk.stop_atr_multiple" => self.risk.stop_atr_multiple = value,
            "risk.target_atr_multiple" => self.risk.target_atr_multiple = value,
            "risk.trailing_activation_atr" => self.risk.trailing_activation_atr = value,
            "risk.trailing_atr_multiple" => self.risk.trailing_atr_multiple = value,
            "risk.max_stop_percent" => self.risk.max_stop_percent = value,
            "risk.risk_per_trade" => self.risk.risk_per_trade = value,
            "risk.max_positions" => self.risk.max_positions = as_count(param, value)?,
            "risk.max_sector_positions" => {
                self.risk.max_sector_positions = as_count(param, value)?
            }
            "risk.time_stop_days" => self.risk.time_stop_days = as_count(param, value)?,
            "backtest.initial_capital" => self.simulation.initial_capital = value,
            "backtest.slippage_pct" => self.simulation.slippage_pct = value,
            "backtest.commission_per_trade" => self.simulation.commission_per_trade = value,
            "backtest.commission_pct" => self.simulation.commission_pct = value,
            "backtest.risk_free_rate" => self.simulation.risk_free_rate = value,
            "monte_carlo.iterations" => self.monte_carlo.iterations = as_count(param, value)?,
            "monte_carlo.seed" => self.monte_carlo.seed = as_count(param, value)? as u64,
            "monte_carlo.drawdown_threshold" => self.monte_carlo.drawdown_threshold = value,
            _ => {
                let (section, key) = split_param(param);
                return Err(SwingtraderError::invalid(section, key, "unknown parameter"));
            }
        }
        Ok(())
    }

    /// Build a config from an INI source; absent keys keep their defaults.
    pub fn from_port(port: &dyn ConfigPort) -> Result<Self, SwingtraderError> {
        let mut config = BacktestConfig::default();

        for &param in NUMERIC_PARAMS {
            let (section, key) = split_param(param);
            let Some(raw) = port.get_string(section, key) else {
                continue;
            };
            let value: f64 = raw.trim().parse().map_err(|_| {
                SwingtraderError::invalid(section, key, format!("'{}' is not a number", raw.trim()))
            })?;
            config.set_param(param, value)?;
        }

        if let Some(benchmark) = port.get_string("regime", "benchmark") {
            config.regime.benchmark = benchmark.trim().to_uppercase();
        }

        if let Some(codes) = port.get_string("universe", "codes") {
            config.universe.codes = parse_codes(&codes)
                .map_err(|e| SwingtraderError::invalid("universe", "codes", e.to_string()))?;
        }

        if let Some(sectors) = port.get_string("universe", "excluded_sectors") {
            config.universe.excluded_sectors = sectors
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(mode) = port.get_string("risk", "trailing_atr_mode") {
            config.risk.trailing_atr_mode = mode
                .parse()
                .map_err(|reason: String| SwingtraderError::invalid("risk", "trailing_atr_mode", reason))?;
        }

        if let Some(date) = parse_date(port, "start_date")? {
            config.simulation.start_date = date;
        }
        if let Some(date) = parse_date(port, "end_date")? {
            config.simulation.end_date = date;
        }
        config.simulation.data_start = match parse_date(port, "data_start")? {
            Some(date) => date,
            None => config.default_data_start(),
        };

        Ok(config)
    }
}

fn parse_date(port: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, SwingtraderError> {
    match port.get_string("backtest", key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                SwingtraderError::invalid(
                    "backtest",
                    key,
                    format!("invalid {} format, expected YYYY-MM-DD", key),
                )
            }),
    }
}
