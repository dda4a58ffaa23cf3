//! Core domain types and logic.

pub mod backtest;
pub mod code_data;
pub mod config;
pub mod config_validation;
pub mod entry_trigger;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod metrics;
pub mod momentum;
pub mod monte_carlo;
pub mod ohlcv;
pub mod portfolio;
pub mod position;
pub mod regime;
pub mod risk;
pub mod sweep;
pub mod universe;
pub mod universe_filter;
