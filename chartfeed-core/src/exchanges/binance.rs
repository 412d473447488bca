//! Binance spot datafeed adapter
//!
//! History comes from the `/klines` REST endpoint and live bars from one
//! WebSocket stream per subscription (see [`BinanceStreaming`]). Instrument
//! metadata is loaded from `/exchangeInfo` and cached for the adapter's
//! lifetime, refreshed once on a resolve miss.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::datafeed::{
    price_scale, tick_size_precision, BarSink, CacheResetSignal, Datafeed,
    DatafeedConfiguration, Exchange, FeedError, FeedResult, HistoryPage, InstrumentMetadata,
    PeriodParams, SymbolDescriptor, SymbolSearchResult, DataStatus, DEFAULT_PRICE_PRECISION,
    SEARCH_RESULT_LIMIT,
};
use crate::exchanges::binance_streaming::BinanceStreaming;
use crate::market_data::codec::{bar_from_binance_rest, normalize_millis, BinanceKlineRow};
use crate::market_data::intervals::{Resolution, BINANCE_RESOLUTIONS};
use crate::market_data::symbols::normalize_symbol;

/// Binance endpoints and tuning knobs.
#[derive(Clone, Debug)]
pub struct BinanceConfig {
    pub rest_base: String,
    pub ws_base: String,
    /// Rows per `/klines` request, 1000 is the exchange maximum.
    pub history_limit: usize,
    pub reconnect_delay: Duration,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            rest_base: "https://api.binance.com/api/v3".to_string(),
            ws_base: "wss://stream.binance.com:9443/ws".to_string(),
            history_limit: 1000,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<BinanceSymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbolInfo {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
    #[serde(default)]
    filters: Vec<BinanceFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceFilter {
    filter_type: String,
    #[serde(default)]
    tick_size: Option<String>,
}

struct BinanceInner {
    config: BinanceConfig,
    http: reqwest::Client,
    instruments: RwLock<HashMap<String, InstrumentMetadata>>,
}

impl BinanceInner {
    /// Loads `/exchangeInfo`, keeping USDT-quoted instruments that are
    /// actively trading, and replaces the cache wholesale.
    async fn load_exchange_info(&self) -> FeedResult<()> {
        let url = format!("{}/exchangeInfo", self.config.rest_base);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(FeedError::metadata)?;
        if !response.status().is_success() {
            return Err(FeedError::MetadataLoadFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let info: ExchangeInfoResponse = response.json().await.map_err(FeedError::metadata)?;

        let mut loaded = HashMap::new();
        for entry in info.symbols {
            if entry.status != "TRADING" || entry.quote_asset != "USDT" {
                continue;
            }
            let price_precision = entry
                .filters
                .iter()
                .find(|f| f.filter_type == "PRICE_FILTER")
                .and_then(|f| f.tick_size.as_deref())
                .map(tick_size_precision)
                .unwrap_or(DEFAULT_PRICE_PRECISION);
            loaded.insert(
                entry.symbol.clone(),
                InstrumentMetadata {
                    symbol: entry.symbol,
                    base_asset: entry.base_asset,
                    quote_asset: entry.quote_asset,
                    price_precision,
                    trading: true,
                },
            );
        }
        info!(count = loaded.len(), "loaded Binance instrument metadata");
        *self.instruments.write() = loaded;
        Ok(())
    }

    fn descriptor(&self, meta: &InstrumentMetadata) -> SymbolDescriptor {
        SymbolDescriptor {
            symbol: meta.symbol.clone(),
            description: format!("{}/{}", meta.base_asset, meta.quote_asset),
            exchange: Exchange::Binance,
            price_scale: price_scale(meta.price_precision),
            volume_precision: 8,
            session: "24x7",
            timezone: "Etc/UTC",
            min_movement: 1,
            has_intraday: true,
            data_status: DataStatus::Streaming,
            supported_resolutions: BINANCE_RESOLUTIONS,
        }
    }

    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> FeedResult<Vec<BinanceKlineRow>> {
        let url = format!("{}/klines", self.config.rest_base);
        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol), ("interval", interval)])
            .query(&[("startTime", start_ms), ("endTime", end_ms)])
            .query(&[("limit", self.config.history_limit)])
            .send()
            .await
            .map_err(FeedError::history)?;
        if !response.status().is_success() {
            return Err(FeedError::HistoryFetchFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }
        response.json().await.map_err(FeedError::history)
    }
}

/// Binance implementation of the charting [`Datafeed`] contract.
pub struct BinanceDatafeed {
    inner: Arc<BinanceInner>,
    streaming: BinanceStreaming,
}

impl BinanceDatafeed {
    pub fn new(config: BinanceConfig) -> Self {
        let streaming = BinanceStreaming::new(config.ws_base.clone(), config.reconnect_delay);
        Self {
            inner: Arc::new(BinanceInner {
                config,
                http: reqwest::Client::new(),
                instruments: RwLock::new(HashMap::new()),
            }),
            streaming,
        }
    }

    /// Live subscriptions currently held by this adapter.
    pub fn subscription_count(&self) -> usize {
        self.streaming.subscription_count()
    }
}

impl Default for BinanceDatafeed {
    fn default() -> Self {
        Self::new(BinanceConfig::default())
    }
}

#[async_trait]
impl Datafeed for BinanceDatafeed {
    async fn on_ready(&self) -> DatafeedConfiguration {
        // Warm the metadata cache in the background so the first resolve
        // usually hits it. on_ready itself never blocks on the network.
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(err) = inner.load_exchange_info().await {
                warn!(%err, "Binance metadata preload failed");
            }
        });
        tokio::task::yield_now().await;
        DatafeedConfiguration {
            supported_resolutions: BINANCE_RESOLUTIONS,
            supports_search: true,
            supports_time: false,
            exchange_name: Exchange::Binance.display_name(),
        }
    }

    async fn search_symbols(&self, query: &str) -> Vec<SymbolSearchResult> {
        // Searches only what is cached; a pending metadata load is never
        // awaited here.
        let needle: String = query
            .to_ascii_uppercase()
            .chars()
            .filter(|c| *c != '-')
            .collect();
        let instruments = self.inner.instruments.read();
        let mut hits: Vec<SymbolSearchResult> = instruments
            .values()
            .filter(|meta| {
                needle.is_empty()
                    || meta.symbol.contains(&needle)
                    || meta.base_asset.contains(&needle)
            })
            .map(|meta| SymbolSearchResult {
                symbol: meta.symbol.clone(),
                full_name: format!("{}:{}", Exchange::Binance.display_name(), meta.symbol),
                description: format!("{}/{}", meta.base_asset, meta.quote_asset),
                exchange: Exchange::Binance,
            })
            .collect();
        hits.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        hits.truncate(SEARCH_RESULT_LIMIT);
        hits
    }

    async fn resolve_symbol(&self, name: &str) -> FeedResult<SymbolDescriptor> {
        let symbol = normalize_symbol(name);
        if let Some(meta) = self.inner.instruments.read().get(&symbol) {
            return Ok(self.inner.descriptor(meta));
        }
        // Miss: the cache may be cold or stale, refresh once and retry.
        self.inner.load_exchange_info().await?;
        match self.inner.instruments.read().get(&symbol) {
            Some(meta) => Ok(self.inner.descriptor(meta)),
            None => Err(FeedError::SymbolNotFound(symbol)),
        }
    }

    async fn get_bars(
        &self,
        symbol: &SymbolDescriptor,
        resolution: Resolution,
        range: PeriodParams,
    ) -> FeedResult<HistoryPage> {
        let from_ms = normalize_millis(range.from);
        let to_ms = normalize_millis(range.to);
        let interval = resolution.binance_interval();

        let mut bars = Vec::new();
        let mut cursor = from_ms;
        // endTime is inclusive on the exchange side, the window here is not.
        while cursor < to_ms {
            let rows = self
                .inner
                .fetch_klines(&symbol.symbol, interval, cursor, to_ms - 1)
                .await?;
            let page_len = rows.len();
            for row in &rows {
                bars.push(bar_from_binance_rest(row)?);
            }
            if page_len < self.inner.config.history_limit {
                break;
            }
            match bars.last() {
                Some(last) => cursor = last.time + 1,
                None => break,
            }
        }

        bars.sort_by_key(|bar| bar.time);
        bars.dedup_by_key(|bar| bar.time);
        bars.retain(|bar| bar.time >= from_ms && bar.time < to_ms);
        debug!(
            symbol = %symbol.symbol,
            %resolution,
            count = bars.len(),
            "fetched Binance history"
        );
        let no_data = bars.is_empty();
        Ok(HistoryPage { bars, no_data })
    }

    async fn subscribe_bars(
        &self,
        symbol: &SymbolDescriptor,
        resolution: Resolution,
        listener_id: &str,
        on_tick: BarSink,
        on_reset: CacheResetSignal,
    ) {
        self.streaming
            .subscribe(&symbol.symbol, resolution, listener_id, on_tick, on_reset)
            .await;
    }

    async fn unsubscribe_bars(&self, listener_id: &str) {
        self.streaming.unsubscribe(listener_id).await;
    }

    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }
}
