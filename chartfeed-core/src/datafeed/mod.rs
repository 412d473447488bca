//! The datafeed contract between exchange adapters and the charting host
//!
//! An adapter implements [`Datafeed`] for one exchange. The chart drives the
//! same six-call lifecycle regardless of exchange: `on_ready`, then symbol
//! search and resolution, then history pages, then live bar subscriptions.
//! Live data flows back over channels instead of callbacks so subscribers
//! can sit on any task.

pub mod error;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use error::{FeedError, FeedResult};
pub use types::{
    price_scale, tick_size_precision, Bar, DataStatus, DatafeedConfiguration, Exchange,
    HistoryPage, InstrumentMetadata, PeriodParams, SymbolDescriptor, SymbolSearchResult,
    DEFAULT_PRICE_PRECISION, MAX_PRICE_PRECISION,
};

use crate::exchanges::{BinanceDatafeed, OkxDatafeed};
use crate::market_data::intervals::Resolution;

/// Most hits a symbol search will return.
pub const SEARCH_RESULT_LIMIT: usize = 30;

/// Receives live bars for one subscription.
pub type BarSink = mpsc::UnboundedSender<Bar>;

/// Fired after a stream reconnects, before any post-reconnect bar, so the
/// chart drops cached history that may have gone stale during the outage.
pub type CacheResetSignal = mpsc::UnboundedSender<()>;

/// One exchange's view of the charting datafeed contract.
#[async_trait]
pub trait Datafeed: Send + Sync {
    /// Reports capabilities. Completes asynchronously even when the answer
    /// is immediate, matching the contract the charting front end expects.
    async fn on_ready(&self) -> DatafeedConfiguration;

    /// Case-insensitive substring search over listed instruments, capped at
    /// [`SEARCH_RESULT_LIMIT`] hits.
    async fn search_symbols(&self, query: &str) -> Vec<SymbolSearchResult>;

    /// Resolves a possibly decorated symbol name to a full descriptor.
    async fn resolve_symbol(&self, name: &str) -> FeedResult<SymbolDescriptor>;

    /// Fetches historical bars for the half-open window in `range`,
    /// ascending by open time with duplicates removed.
    async fn get_bars(
        &self,
        symbol: &SymbolDescriptor,
        resolution: Resolution,
        range: PeriodParams,
    ) -> FeedResult<HistoryPage>;

    /// Starts streaming live bars to `on_tick`. A later subscribe with the
    /// same `listener_id` replaces the earlier one.
    async fn subscribe_bars(
        &self,
        symbol: &SymbolDescriptor,
        resolution: Resolution,
        listener_id: &str,
        on_tick: BarSink,
        on_reset: CacheResetSignal,
    );

    /// Stops the subscription registered under `listener_id`. Unknown ids
    /// are ignored.
    async fn unsubscribe_bars(&self, listener_id: &str);

    /// Which exchange this adapter serves.
    fn exchange(&self) -> Exchange;
}

/// Builds the adapter for an exchange with its default endpoints. Must be
/// called inside a Tokio runtime; the OKX adapter spawns its connection
/// task up front.
pub fn datafeed_for(exchange: Exchange) -> Arc<dyn Datafeed> {
    match exchange {
        Exchange::Binance => Arc::new(BinanceDatafeed::default()),
        Exchange::Okx => Arc::new(OkxDatafeed::default()),
    }
}
