//! Exchange datafeed adapters for candlestick charting
//!
//! This crate speaks the datafeed contract a charting front end expects
//! (ready, search, resolve, history, live subscriptions) on top of two
//! spot exchanges, Binance and OKX. Each exchange gets an adapter that
//! normalizes symbols and intervals into one canonical vocabulary, pages
//! REST history into ascending deduplicated bars, and streams live klines
//! over WebSockets with automatic reconnect and cache reset signalling.

pub mod datafeed;
pub mod exchanges;
pub mod market_data;

pub use datafeed::{
    datafeed_for, Bar, BarSink, CacheResetSignal, DataStatus, Datafeed, DatafeedConfiguration,
    Exchange, FeedError, FeedResult, HistoryPage, InstrumentMetadata, PeriodParams,
    SymbolDescriptor, SymbolSearchResult, SEARCH_RESULT_LIMIT,
};
pub use exchanges::{BinanceConfig, BinanceDatafeed, OkxConfig, OkxDatafeed};
pub use market_data::{
    normalize_symbol, Resolution, BINANCE_RESOLUTIONS, OKX_RESOLUTIONS,
};
