//! Decoding exchange kline records into canonical bars
//!
//! Both exchanges string-encode prices and volumes. Binance REST rows are
//! 12-element heterogeneous tuples and its WebSocket wraps the kline in a
//! JSON object; OKX uses an all-string tuple for both transports.

use serde::Deserialize;

use crate::datafeed::error::{FeedError, FeedResult};
use crate::datafeed::types::Bar;

/// Timestamps at or above this value are already milliseconds; anything
/// smaller is taken as seconds and scaled up.
const MS_THRESHOLD: i64 = 10_000_000_000;

/// Normalizes an exchange timestamp to milliseconds since epoch.
pub fn normalize_millis(ts: i64) -> i64 {
    if ts < MS_THRESHOLD {
        ts * 1_000
    } else {
        ts
    }
}

fn parse_field(field: &'static str, value: &str) -> FeedResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| FeedError::Decode(format!("bad {}: {:?}", field, value)))
}

/// Binance REST kline row:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
///   trades, takerBaseVolume, takerQuoteVolume, ignore]`.
pub type BinanceKlineRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    u64,
    String,
    String,
    String,
);

/// Decodes one Binance REST kline row.
pub fn bar_from_binance_rest(row: &BinanceKlineRow) -> FeedResult<Bar> {
    Ok(Bar {
        time: normalize_millis(row.0),
        open: parse_field("open", &row.1)?,
        high: parse_field("high", &row.2)?,
        low: parse_field("low", &row.3)?,
        close: parse_field("close", &row.4)?,
        volume: parse_field("volume", &row.5)?,
    })
}

/// Binance live kline envelope, `{e:"kline", k:{...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceWsKlineMessage {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E", default)]
    pub event_time: i64,
    #[serde(rename = "s", default)]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: BinanceWsKline,
}

/// Nested kline payload of a Binance WebSocket message.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceWsKline {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "T", default)]
    pub close_time: i64,
    #[serde(rename = "i", default)]
    pub interval: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "x", default)]
    pub closed: bool,
}

/// Decodes the nested kline of a Binance WebSocket message.
pub fn bar_from_binance_ws(kline: &BinanceWsKline) -> FeedResult<Bar> {
    Ok(Bar {
        time: normalize_millis(kline.open_time),
        open: parse_field("open", &kline.open)?,
        high: parse_field("high", &kline.high)?,
        low: parse_field("low", &kline.low)?,
        close: parse_field("close", &kline.close)?,
        volume: parse_field("volume", &kline.volume)?,
    })
}

/// Decodes one OKX candle row, `[ts, o, h, l, c, vol, ...]`. The same shape
/// arrives over REST and inside WebSocket `data` envelopes.
pub fn bar_from_okx_row(row: &[String]) -> FeedResult<Bar> {
    if row.len() < 6 {
        return Err(FeedError::Decode(format!(
            "OKX candle row has {} fields, expected at least 6",
            row.len()
        )));
    }
    let ts = row[0]
        .parse::<i64>()
        .map_err(|_| FeedError::Decode(format!("bad timestamp: {:?}", row[0])))?;
    Ok(Bar {
        time: normalize_millis(ts),
        open: parse_field("open", &row[1])?,
        high: parse_field("high", &row[2])?,
        low: parse_field("low", &row[3])?,
        close: parse_field("close", &row[4])?,
        volume: parse_field("volume", &row[5])?,
    })
}
