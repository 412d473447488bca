//! Core datafeed data model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::market_data::intervals::Resolution;

/// Price precision used when an exchange does not publish a tick size.
pub const DEFAULT_PRICE_PRECISION: u32 = 4;

/// Largest precision representable as a `u64` power of ten; anything an
/// exchange publishes beyond this is clamped.
pub const MAX_PRICE_PRECISION: u32 = 18;

/// Display scale for a price precision, `10^p`, clamped so hostile
/// metadata can never overflow.
pub fn price_scale(precision: u32) -> u64 {
    10u64.pow(precision.min(MAX_PRICE_PRECISION))
}

/// The exchanges this crate can serve charts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Binance,
    Okx,
}

impl Exchange {
    /// Name shown to users, matching each exchange's own branding.
    pub fn display_name(self) -> &'static str {
        match self {
            Exchange::Binance => "Binance",
            Exchange::Okx => "OKX",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One OHLCV candlestick. `time` is the bar open in milliseconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Instrument facts cached from an exchange's listing endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentMetadata {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub price_precision: u32,
    pub trading: bool,
}

/// Whether live data is flowing for an instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStatus {
    Streaming,
    EndOfDay,
    Delayed,
}

/// Fully resolved symbol description handed back to the charting front end.
#[derive(Clone, Debug)]
pub struct SymbolDescriptor {
    pub symbol: String,
    pub description: String,
    pub exchange: Exchange,
    /// Price display scale, `10^precision`. A scale of 100 means two
    /// decimal places.
    pub price_scale: u64,
    pub volume_precision: u32,
    pub session: &'static str,
    pub timezone: &'static str,
    pub min_movement: u32,
    pub has_intraday: bool,
    pub data_status: DataStatus,
    pub supported_resolutions: &'static [Resolution],
}

/// Requested history window. `from` and `to` are seconds since epoch and
/// the window is half-open: bars with `from <= open_time < to`.
#[derive(Clone, Copy, Debug)]
pub struct PeriodParams {
    pub from: i64,
    pub to: i64,
    pub first_request: bool,
}

/// One page of history. `no_data` tells the chart the window is empty and
/// it should stop paging further back.
#[derive(Clone, Debug, Default)]
pub struct HistoryPage {
    pub bars: Vec<Bar>,
    pub no_data: bool,
}

/// One hit from a symbol search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SymbolSearchResult {
    pub symbol: String,
    pub full_name: String,
    pub description: String,
    pub exchange: Exchange,
}

/// Capabilities reported to the chart before any other call.
#[derive(Clone, Copy, Debug)]
pub struct DatafeedConfiguration {
    pub supported_resolutions: &'static [Resolution],
    pub supports_search: bool,
    pub supports_time: bool,
    pub exchange_name: &'static str,
}

/// Number of fractional digits implied by an exchange tick size string,
/// e.g. `"0.01000000"` -> 2.
pub fn tick_size_precision(tick_size: &str) -> u32 {
    match tick_size.split_once('.') {
        Some((_, frac)) => frac.trim_end_matches('0').len() as u32,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_size_precision_trims_trailing_zeros() {
        assert_eq!(tick_size_precision("0.01000000"), 2);
        assert_eq!(tick_size_precision("0.00010000"), 4);
        assert_eq!(tick_size_precision("1.00000000"), 0);
        assert_eq!(tick_size_precision("1"), 0);
        assert_eq!(tick_size_precision("0.1"), 1);
    }

    #[test]
    fn price_scale_clamps_absurd_precision() {
        assert_eq!(price_scale(2), 100);
        assert_eq!(price_scale(18), 1_000_000_000_000_000_000);
        assert_eq!(price_scale(22), 1_000_000_000_000_000_000);
    }

    #[test]
    fn exchange_display_names() {
        assert_eq!(Exchange::Binance.to_string(), "Binance");
        assert_eq!(Exchange::Okx.to_string(), "OKX");
    }
}
