//! Per-exchange datafeed adapters and their streaming backends.

pub mod binance;
pub mod binance_streaming;
pub mod okx;
pub mod okx_streaming;

pub use binance::{BinanceConfig, BinanceDatafeed};
pub use binance_streaming::BinanceStreaming;
pub use okx::{OkxConfig, OkxDatafeed};
pub use okx_streaming::{OkxStreaming, OkxSubscription};
