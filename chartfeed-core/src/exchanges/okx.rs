//! OKX spot datafeed adapter
//!
//! History comes from `/market/history-candles`, which pages newest-first
//! inside a `{code, msg, data}` envelope. Live bars arrive over one shared
//! WebSocket connection multiplexing every subscription (see
//! [`OkxStreaming`]).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::datafeed::{
    price_scale, tick_size_precision, BarSink, CacheResetSignal, Datafeed,
    DatafeedConfiguration, Exchange, FeedError, FeedResult, HistoryPage, InstrumentMetadata,
    PeriodParams, SymbolDescriptor, SymbolSearchResult, DataStatus, DEFAULT_PRICE_PRECISION,
    SEARCH_RESULT_LIMIT,
};
use crate::exchanges::okx_streaming::{OkxStreaming, OkxSubscription};
use crate::market_data::codec::{bar_from_okx_row, normalize_millis};
use crate::market_data::intervals::{Resolution, OKX_RESOLUTIONS};
use crate::market_data::symbols::{canonical_from_okx, normalize_symbol, okx_inst_id};

/// OKX endpoints and tuning knobs.
#[derive(Clone, Debug)]
pub struct OkxConfig {
    pub rest_base: String,
    pub ws_url: String,
    /// Rows per history request, 300 is the exchange maximum.
    pub history_limit: usize,
    pub reconnect_delay: Duration,
    /// OKX drops idle connections after 30 seconds of silence; a text
    /// `ping` on this interval keeps the socket alive.
    pub ping_interval: Duration,
}

impl Default for OkxConfig {
    fn default() -> Self {
        Self {
            rest_base: "https://www.okx.com/api/v5".to_string(),
            ws_url: "wss://ws.okx.com:8443/ws/v5/business".to_string(),
            history_limit: 300,
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(25),
        }
    }
}

/// Envelope wrapping every OKX REST payload. `code` is `"0"` on success.
#[derive(Debug, Deserialize)]
struct OkxResponse<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxInstrument {
    inst_id: String,
    base_ccy: String,
    quote_ccy: String,
    state: String,
    #[serde(default)]
    tick_sz: Option<String>,
}

struct OkxInner {
    config: OkxConfig,
    http: reqwest::Client,
    /// Keyed by canonical symbol, not the dashed instrument id.
    instruments: RwLock<HashMap<String, InstrumentMetadata>>,
}

impl OkxInner {
    async fn load_instruments(&self) -> FeedResult<()> {
        let url = format!("{}/public/instruments", self.config.rest_base);
        let response = self
            .http
            .get(&url)
            .query(&[("instType", "SPOT")])
            .send()
            .await
            .map_err(FeedError::metadata)?;
        if !response.status().is_success() {
            return Err(FeedError::MetadataLoadFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: OkxResponse<OkxInstrument> =
            response.json().await.map_err(FeedError::metadata)?;
        if body.code != "0" {
            return Err(FeedError::MetadataLoadFailed(format!(
                "OKX error {}: {}",
                body.code, body.msg
            )));
        }

        let mut loaded = HashMap::new();
        for entry in body.data {
            if entry.state != "live" || entry.quote_ccy != "USDT" {
                continue;
            }
            let price_precision = entry
                .tick_sz
                .as_deref()
                .map(tick_size_precision)
                .unwrap_or(DEFAULT_PRICE_PRECISION);
            loaded.insert(
                canonical_from_okx(&entry.inst_id),
                InstrumentMetadata {
                    symbol: canonical_from_okx(&entry.inst_id),
                    base_asset: entry.base_ccy,
                    quote_asset: entry.quote_ccy,
                    price_precision,
                    trading: true,
                },
            );
        }
        info!(count = loaded.len(), "loaded OKX instrument metadata");
        *self.instruments.write() = loaded;
        Ok(())
    }

    fn descriptor(&self, meta: &InstrumentMetadata) -> SymbolDescriptor {
        SymbolDescriptor {
            symbol: meta.symbol.clone(),
            description: format!("{}/{}", meta.base_asset, meta.quote_asset),
            exchange: Exchange::Okx,
            price_scale: price_scale(meta.price_precision),
            volume_precision: 8,
            session: "24x7",
            timezone: "Etc/UTC",
            min_movement: 1,
            has_intraday: true,
            data_status: DataStatus::Streaming,
            supported_resolutions: OKX_RESOLUTIONS,
        }
    }

    /// One history page, rows newest-first. `after` and `before` are both
    /// exclusive on the exchange side.
    async fn fetch_candles(
        &self,
        inst_id: &str,
        bar: &str,
        after_ms: i64,
        before_ms: i64,
    ) -> FeedResult<Vec<Vec<String>>> {
        let url = format!("{}/market/history-candles", self.config.rest_base);
        let response = self
            .http
            .get(&url)
            .query(&[("instId", inst_id), ("bar", bar)])
            .query(&[
                ("after", after_ms.to_string()),
                ("before", before_ms.to_string()),
                ("limit", self.config.history_limit.to_string()),
            ])
            .send()
            .await
            .map_err(FeedError::history)?;
        if !response.status().is_success() {
            return Err(FeedError::HistoryFetchFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: OkxResponse<Vec<String>> =
            response.json().await.map_err(FeedError::history)?;
        if body.code != "0" {
            return Err(FeedError::HistoryFetchFailed(format!(
                "OKX error {}: {}",
                body.code, body.msg
            )));
        }
        Ok(body.data)
    }
}

/// OKX implementation of the charting [`Datafeed`] contract.
///
/// Construct inside a Tokio runtime; the shared streaming connection task
/// is spawned up front.
pub struct OkxDatafeed {
    inner: Arc<OkxInner>,
    streaming: OkxStreaming,
}

impl OkxDatafeed {
    pub fn new(config: OkxConfig) -> Self {
        let streaming = OkxStreaming::new(
            config.ws_url.clone(),
            config.reconnect_delay,
            config.ping_interval,
        );
        Self {
            inner: Arc::new(OkxInner {
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

impl Default for OkxDatafeed {
    fn default() -> Self {
        Self::new(OkxConfig::default())
    }
}

#[async_trait]
impl Datafeed for OkxDatafeed {
    async fn on_ready(&self) -> DatafeedConfiguration {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(err) = inner.load_instruments().await {
                warn!(%err, "OKX metadata preload failed");
            }
        });
        tokio::task::yield_now().await;
        DatafeedConfiguration {
            supported_resolutions: OKX_RESOLUTIONS,
            supports_search: true,
            supports_time: false,
            exchange_name: Exchange::Okx.display_name(),
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
                full_name: format!("{}:{}", Exchange::Okx.display_name(), meta.symbol),
                description: format!("{}/{}", meta.base_asset, meta.quote_asset),
                exchange: Exchange::Okx,
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
        self.inner.load_instruments().await?;
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
        let inst_id = okx_inst_id(&symbol.symbol)?;
        let from_ms = normalize_millis(range.from);
        let to_ms = normalize_millis(range.to);
        let bar_code = resolution.okx_bar();

        let mut bars = Vec::new();
        // Rows come newest-first; walk the `after` cursor backwards until
        // the page underfills or crosses the start of the window.
        let mut cursor = to_ms;
        loop {
            let rows = self
                .inner
                .fetch_candles(&inst_id, bar_code, cursor, from_ms - 1)
                .await?;
            let page_len = rows.len();
            for row in &rows {
                bars.push(bar_from_okx_row(row)?);
            }
            if page_len < self.inner.config.history_limit {
                break;
            }
            match bars.last() {
                Some(oldest) if oldest.time > from_ms => cursor = oldest.time,
                _ => break,
            }
        }

        bars.sort_by_key(|bar| bar.time);
        bars.dedup_by_key(|bar| bar.time);
        bars.retain(|bar| bar.time >= from_ms && bar.time < to_ms);
        debug!(
            symbol = %symbol.symbol,
            %resolution,
            count = bars.len(),
            "fetched OKX history"
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
        let inst_id = match okx_inst_id(&symbol.symbol) {
            Ok(inst_id) => inst_id,
            Err(err) => {
                error!(%listener_id, symbol = %symbol.symbol, %err, "cannot stream symbol");
                return;
            }
        };
        self.streaming
            .subscribe(OkxSubscription {
                listener_id: listener_id.to_string(),
                inst_id,
                channel: resolution.okx_channel(),
                on_tick,
                on_reset,
            })
            .await;
    }

    async fn unsubscribe_bars(&self, listener_id: &str) {
        self.streaming.unsubscribe(listener_id).await;
    }

    fn exchange(&self) -> Exchange {
        Exchange::Okx
    }
}
