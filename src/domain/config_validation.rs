//! Configuration validation.
//!
//! Rejects invalid values before any simulation day runs.

use crate::domain::config::{
    BacktestConfig, EntryConfig, MonteCarloConfig, RankingConfig, RegimeConfig, RiskConfig,
    SimulationConfig, UniverseConfig,
};
use crate::domain::error::SwingtraderError;

pub fn validate_config(config: &BacktestConfig) -> Result<(), SwingtraderError> {
    validate_regime(&config.regime)?;
    validate_universe(&config.universe)?;
    validate_ranking(&config.ranking)?;
    validate_entry(&config.entry)?;
    validate_risk(&config.risk)?;
    validate_simulation(&config.simulation)?;
    validate_monte_carlo(&config.monte_carlo)?;
    Ok(())
}

fn require_window(section: &str, key: &str, value: usize) -> Result<(), SwingtraderError> {
    if value == 0 {
        return Err(SwingtraderError::invalid(
            section,
            key,
            format!("{key} must be at least 1"),
        ));
    }
    Ok(())
}

fn require_positive(section: &str, key: &str, value: f64) -> Result<(), SwingtraderError> {
    if !(value > 0.0 && value.is_finite()) {
        return Err(SwingtraderError::invalid(
            section,
            key,
            format!("{key} must be positive"),
        ));
    }
    Ok(())
}

fn require_non_negative(section: &str, key: &str, value: f64) -> Result<(), SwingtraderError> {
    if !(value >= 0.0 && value.is_finite()) {
        return Err(SwingtraderError::invalid(
            section,
            key,
            format!("{key} must be non-negative"),
        ));
    }
    Ok(())
}

fn validate_regime(regime: &RegimeConfig) -> Result<(), SwingtraderError> {
    if regime.benchmark.trim().is_empty() {
        return Err(SwingtraderError::ConfigMissing {
            section: "regime".to_string(),
            key: "benchmark".to_string(),
        });
    }
    require_window("regime", "sma_short", regime.sma_short)?;
    require_window("regime", "sma_long", regime.sma_long)?;
    if regime.sma_short >= regime.sma_long {
        return Err(SwingtraderError::invalid(
            "regime",
            "sma_short",
            "sma_short must be shorter than sma_long",
        ));
    }
    Ok(())
}

fn validate_universe(universe: &UniverseConfig) -> Result<(), SwingtraderError> {
    require_non_negative("universe", "min_price", universe.min_price)?;
    require_non_negative("universe", "min_avg_volume", universe.min_avg_volume)?;
    require_window("universe", "volume_avg_period", universe.volume_avg_period)?;
    require_window("universe", "trend_sma_period", universe.trend_sma_period)?;
    Ok(())
}

fn validate_ranking(ranking: &RankingConfig) -> Result<(), SwingtraderError> {
    require_window("ranking", "lookback_short", ranking.lookback_short)?;
    require_window("ranking", "lookback_medium", ranking.lookback_medium)?;
    require_window("ranking", "lookback_long", ranking.lookback_long)?;
    require_non_negative("ranking", "weight_short", ranking.weight_short)?;
    require_non_negative("ranking", "weight_medium", ranking.weight_medium)?;
    require_non_negative("ranking", "weight_long", ranking.weight_long)?;
    if ranking.weight_short + ranking.weight_medium + ranking.weight_long <= 0.0 {
        return Err(SwingtraderError::invalid(
            "ranking",
            "weight_short",
            "at least one relative strength weight must be positive",
        ));
    }
    require_window("ranking", "watchlist_size", ranking.watchlist_size)?;
    require_window("ranking", "sector_cap", ranking.sector_cap)?;
    Ok(())
}

fn validate_entry(entry: &EntryConfig) -> Result<(), SwingtraderError> {
    require_window("entry", "ema_period", entry.ema_period)?;
    require_window("entry", "volume_pullback_window", entry.volume_pullback_window)?;
    require_window("entry", "volume_baseline_window", entry.volume_baseline_window)?;
    require_window("entry", "rsi_period", entry.rsi_period)?;
    if !(0.0..=100.0).contains(&entry.rsi_lower) || !(0.0..=100.0).contains(&entry.rsi_upper) {
        return Err(SwingtraderError::invalid(
            "entry",
            "rsi_lower",
            "RSI bounds must be within 0 and 100",
        ));
    }
    if entry.rsi_lower > entry.rsi_upper {
        return Err(SwingtraderError::invalid(
            "entry",
            "rsi_lower",
            "rsi_lower must not exceed rsi_upper",
        ));
    }
    require_non_negative("entry", "max_gap_percent", entry.max_gap_percent)?;
    Ok(())
}

fn validate_risk(risk: &RiskConfig) -> Result<(), SwingtraderError> {
    require_window("risk", "atr_period", risk.atr_period)?;
    require_positive("risk", "stop_atr_multiple", risk.stop_atr_multiple)?;
    require_positive("risk", "target_atr_multiple", risk.target_atr_multiple)?;
    require_positive("risk", "trailing_activation_atr", risk.trailing_activation_atr)?;
    require_positive("risk", "trailing_atr_multiple", risk.trailing_atr_multiple)?;
    if !(risk.max_stop_percent > 0.0 && risk.max_stop_percent <= 100.0) {
        return Err(SwingtraderError::invalid(
            "risk",
            "max_stop_percent",
            "max_stop_percent must be between 0 and 100",
        ));
    }
    if !(risk.risk_per_trade > 0.0 && risk.risk_per_trade <= 1.0) {
        return Err(SwingtraderError::invalid(
            "risk",
            "risk_per_trade",
            "risk_per_trade must be between 0 and 1",
        ));
    }
    require_window("risk", "max_positions", risk.max_positions)?;
    require_window("risk", "max_sector_positions", risk.max_sector_positions)?;
    require_window("risk", "time_stop_days", risk.time_stop_days)?;
    Ok(())
}

fn validate_simulation(sim: &SimulationConfig) -> Result<(), SwingtraderError> {
    require_positive("backtest", "initial_capital", sim.initial_capital)?;
    require_non_negative("backtest", "slippage_pct", sim.slippage_pct)?;
    require_non_negative("backtest", "commission_per_trade", sim.commission_per_trade)?;
    require_non_negative("backtest", "commission_pct", sim.commission_pct)?;
    if !(0.0..1.0).contains(&sim.risk_free_rate) {
        return Err(SwingtraderError::invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    if sim.start_date > sim.end_date {
        return Err(SwingtraderError::invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    if sim.data_start > sim.start_date {
        return Err(SwingtraderError::invalid(
            "backtest",
            "data_start",
            "data_start must not be after start_date",
        ));
    }
    Ok(())
}

fn validate_monte_carlo(mc: &MonteCarloConfig) -> Result<(), SwingtraderError> {
    require_window("monte_carlo", "iterations", mc.iterations)?;
    if !(mc.drawdown_threshold > 0.0 && mc.drawdown_threshold <= 1.0) {
        return Err(SwingtraderError::invalid(
            "monte_carlo",
            "drawdown_threshold",
            "drawdown_threshold must be between 0 and 1",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn assert_invalid(config: &BacktestConfig, section: &str, key: &str) {
        match validate_config(config) {
            Err(SwingtraderError::ConfigInvalid {
                section: s, key: k, ..
            }) => {
                assert_eq!(s, section);
                assert_eq!(k, key);
            }
            other => panic!("expected ConfigInvalid [{section}] {key}, got {other:?}"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&BacktestConfig::default()).is_ok());
    }

    #[test]
    fn zero_max_positions_rejected() {
        let mut config = BacktestConfig::default();
        config.risk.max_positions = 0;
        assert_invalid(&config, "risk", "max_positions");
    }

    #[test]
    fn non_positive_atr_multiple_rejected() {
        let mut config = BacktestConfig::default();
        config.risk.stop_atr_multiple = 0.0;
        assert_invalid(&config, "risk", "stop_atr_multiple");

        let mut config = BacktestConfig::default();
        config.risk.target_atr_multiple = -1.0;
        assert_invalid(&config, "risk", "target_atr_multiple");
    }

    #[test]
    fn risk_per_trade_out_of_range_rejected() {
        let mut config = BacktestConfig::default();
        config.risk.risk_per_trade = 1.5;
        assert_invalid(&config, "risk", "risk_per_trade");
    }

    #[test]
    fn regime_windows_must_be_ordered() {
        let mut config = BacktestConfig::default();
        config.regime.sma_short = 200;
        assert_invalid(&config, "regime", "sma_short");
    }

    #[test]
    fn empty_benchmark_is_missing() {
        let mut config = BacktestConfig::default();
        config.regime.benchmark = "  ".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(SwingtraderError::ConfigMissing { key, .. }) if key == "benchmark"
        ));
    }

    #[test]
    fn rsi_bounds_out_of_order_rejected() {
        let mut config = BacktestConfig::default();
        config.entry.rsi_lower = 75.0;
        assert_invalid(&config, "entry", "rsi_lower");
    }

    #[test]
    fn negative_weight_rejected() {
        let mut config = BacktestConfig::default();
        config.ranking.weight_medium = -0.5;
        assert_invalid(&config, "ranking", "weight_medium");
    }

    #[test]
    fn all_zero_weights_rejected() {
        let mut config = BacktestConfig::default();
        config.ranking.weight_short = 0.0;
        config.ranking.weight_medium = 0.0;
        config.ranking.weight_long = 0.0;
        assert_invalid(&config, "ranking", "weight_short");
    }

    #[test]
    fn reversed_dates_rejected() {
        let mut config = BacktestConfig::default();
        config.simulation.data_start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        config.simulation.start_date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        config.simulation.end_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_invalid(&config, "backtest", "start_date");
    }

    #[test]
    fn data_start_after_start_rejected() {
        let mut config = BacktestConfig::default();
        config.simulation.start_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        config.simulation.data_start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_invalid(&config, "backtest", "data_start");
    }

    #[test]
    fn negative_commission_rejected() {
        let mut config = BacktestConfig::default();
        config.simulation.commission_pct = -0.1;
        assert_invalid(&config, "backtest", "commission_pct");
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let mut config = BacktestConfig::default();
        config.simulation.initial_capital = 0.0;
        assert_invalid(&config, "backtest", "initial_capital");
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = BacktestConfig::default();
        config.monte_carlo.iterations = 0;
        assert_invalid(&config, "monte_carlo", "iterations");
    }
}
