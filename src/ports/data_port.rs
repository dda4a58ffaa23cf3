//! Data access port trait.

use crate::domain::error::SwingtraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::HashMap;

pub trait DataPort {
    /// Bars for `code` within [start_date, end_date], ordered by date.
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, SwingtraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, SwingtraderError>;

    /// Code to sector name. Codes without an entry are treated as unknown.
    fn sector_map(&self) -> Result<HashMap<String, String>, SwingtraderError>;
}
