//! Chart-side host state
//!
//! [`ChartHost`] owns what the charting widget needs from the application:
//! the active exchange's datafeed adapter, the selected symbol and
//! resolution, and change notifications for the surrounding UI. Switching
//! exchange swaps the whole adapter; dropping the old one tears down its
//! live subscriptions.

use std::sync::Arc;

use nanoid::nanoid;
use tracing::info;

use chartfeed_core::{datafeed_for, normalize_symbol, Datafeed, Exchange, Resolution};

pub struct ChartHost {
    exchange: Exchange,
    datafeed: Arc<dyn Datafeed>,
    symbol: String,
    resolution: Resolution,
    on_symbol_change: Option<Box<dyn Fn(&str) + Send + Sync>>,
    on_interval_change: Option<Box<dyn Fn(Resolution) + Send + Sync>>,
}

impl ChartHost {
    /// Builds a host for `exchange` with its default endpoints. Must be
    /// called inside a Tokio runtime.
    pub fn new(exchange: Exchange, symbol: &str, resolution: Resolution) -> Self {
        Self {
            exchange,
            datafeed: datafeed_for(exchange),
            symbol: normalize_symbol(symbol),
            resolution,
            on_symbol_change: None,
            on_interval_change: None,
        }
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    pub fn datafeed(&self) -> Arc<dyn Datafeed> {
        Arc::clone(&self.datafeed)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Swaps the active exchange. The previous adapter is dropped, which
    /// closes its streams once the last chart reference goes away.
    pub fn select_exchange(&mut self, exchange: Exchange) {
        if exchange == self.exchange {
            return;
        }
        info!(from = %self.exchange, to = %exchange, "switching exchange");
        self.exchange = exchange;
        self.datafeed = datafeed_for(exchange);
    }

    /// Updates the selected symbol, normalizing whatever decorated name
    /// the widget reports back.
    pub fn set_symbol(&mut self, name: &str) {
        let symbol = normalize_symbol(name);
        if symbol == self.symbol {
            return;
        }
        self.symbol = symbol;
        if let Some(listener) = &self.on_symbol_change {
            listener(&self.symbol);
        }
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        if resolution == self.resolution {
            return;
        }
        self.resolution = resolution;
        if let Some(listener) = &self.on_interval_change {
            listener(self.resolution);
        }
    }

    pub fn on_symbol_change(&mut self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.on_symbol_change = Some(Box::new(listener));
    }

    pub fn on_interval_change(&mut self, listener: impl Fn(Resolution) + Send + Sync + 'static) {
        self.on_interval_change = Some(Box::new(listener));
    }

    /// Fresh id for one chart subscription.
    pub fn new_listener_id(&self) -> String {
        format!("{}-{}-{}", self.symbol, self.resolution, nanoid!(10))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn builds_an_adapter_per_exchange() {
        let host = ChartHost::new(Exchange::Binance, "BTCUSDT", Resolution::Min60);
        assert_eq!(host.datafeed().exchange(), Exchange::Binance);

        let host = ChartHost::new(Exchange::Okx, "BTCUSDT", Resolution::Min60);
        assert_eq!(host.datafeed().exchange(), Exchange::Okx);
    }

    #[tokio::test]
    async fn select_exchange_swaps_the_adapter() {
        let mut host = ChartHost::new(Exchange::Binance, "BTCUSDT", Resolution::Min60);
        host.select_exchange(Exchange::Okx);
        assert_eq!(host.exchange(), Exchange::Okx);
        assert_eq!(host.datafeed().exchange(), Exchange::Okx);
    }

    #[tokio::test]
    async fn set_symbol_normalizes_and_notifies() {
        let mut host = ChartHost::new(Exchange::Binance, "BTCUSDT", Resolution::Min60);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        host.on_symbol_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        host.set_symbol("OKX:ETH-USDT");
        assert_eq!(host.symbol(), "ETHUSDT");
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Same canonical symbol again does not fire the listener.
        host.set_symbol("ETHUSDT#0");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn listener_ids_are_unique() {
        let host = ChartHost::new(Exchange::Binance, "BTCUSDT", Resolution::Min1);
        let a = host.new_listener_id();
        let b = host.new_listener_id();
        assert_ne!(a, b);
        assert!(a.starts_with("BTCUSDT-1-"));
    }
}
