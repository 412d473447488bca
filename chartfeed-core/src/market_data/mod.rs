//! Exchange-neutral market data vocabulary: resolutions, symbols and
//! kline codecs shared by the per-exchange adapters.

pub mod codec;
pub mod intervals;
pub mod symbols;

pub use codec::{
    bar_from_binance_rest, bar_from_binance_ws, bar_from_okx_row, normalize_millis,
    BinanceKlineRow, BinanceWsKline, BinanceWsKlineMessage,
};
pub use intervals::{
    resolution_from_binance_interval, resolution_from_okx_bar, Resolution, BINANCE_RESOLUTIONS,
    OKX_RESOLUTIONS,
};
pub use symbols::{canonical_from_okx, normalize_symbol, okx_inst_id, split_canonical};
