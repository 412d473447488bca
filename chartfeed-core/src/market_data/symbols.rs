//! Canonical symbol form and per-exchange translation
//!
//! The canonical form is uppercase with no separators (`BTCUSDT`). Binance
//! uses it verbatim; OKX instrument ids carry a dash (`BTC-USDT`) which is
//! re-inserted in front of a known quote asset.

use crate::datafeed::error::{FeedError, FeedResult};

/// Quote assets recognized when splitting a canonical symbol. Order matters:
/// longer, more common quotes are tried first so `BTCUSDT` splits at `USDT`
/// rather than `BTC`.
pub const QUOTE_ASSETS: [&str; 6] = ["USDT", "USDC", "BUSD", "BTC", "ETH", "BNB"];

/// Normalizes whatever the charting host hands us into a canonical symbol.
///
/// The host library decorates symbol names in several ways: an exchange
/// prefix (`OKX:BTCUSDT`), study-series suffixes (`BTCUSDT#0`, `BTCUSDT:1`,
/// `BTCUSDT.P`), dashes from instrument ids, and a trailing resolution when
/// it names indicator inputs (`SOLUSDT60`). All of them are stripped here.
pub fn normalize_symbol(name: &str) -> String {
    let mut symbol = name.trim().to_ascii_uppercase();

    if let Some(idx) = symbol.find(':') {
        if symbol[..idx].chars().all(|c| c.is_ascii_alphabetic()) {
            symbol.drain(..=idx);
        }
    }
    if let Some(idx) = symbol.find(['#', ':', '.']) {
        symbol.truncate(idx);
    }
    symbol.retain(|c| c != '-');

    for quote in QUOTE_ASSETS {
        if let Some(idx) = symbol.find(quote) {
            if idx > 0 {
                symbol.truncate(idx + quote.len());
                return symbol;
            }
        }
    }
    // no recognized quote asset: at least drop a trailing resolution number
    while symbol.ends_with(|c: char| c.is_ascii_digit()) {
        symbol.pop();
    }
    symbol
}

/// Splits a canonical symbol into base and quote assets.
pub fn split_canonical(symbol: &str) -> Option<(&str, &str)> {
    for quote in QUOTE_ASSETS {
        if symbol.len() > quote.len() && symbol.ends_with(quote) {
            let base = &symbol[..symbol.len() - quote.len()];
            return Some((base, quote));
        }
    }
    None
}

/// Canonical symbol to OKX instrument id: `BTCUSDT` -> `BTC-USDT`.
pub fn okx_inst_id(symbol: &str) -> FeedResult<String> {
    match split_canonical(symbol) {
        Some((base, quote)) => Ok(format!("{}-{}", base, quote)),
        None => Err(FeedError::UnsupportedSymbol(symbol.to_string())),
    }
}

/// OKX instrument id to canonical symbol: `BTC-USDT` -> `BTCUSDT`.
pub fn canonical_from_okx(inst_id: &str) -> String {
    inst_id.replace('-', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_exchange_prefix() {
        assert_eq!(normalize_symbol("BINANCE:BTCUSDT"), "BTCUSDT");
        assert_eq!(normalize_symbol("OKX:ETHUSDT"), "ETHUSDT");
    }

    #[test]
    fn normalize_strips_host_suffixes() {
        assert_eq!(normalize_symbol("BTCUSDT#0"), "BTCUSDT");
        assert_eq!(normalize_symbol("BTCUSDT.P"), "BTCUSDT");
        assert_eq!(normalize_symbol("OKX:BTCUSDT:1"), "BTCUSDT");
    }

    #[test]
    fn normalize_strips_dashes_and_resolution_digits() {
        assert_eq!(normalize_symbol("BTC-USDT"), "BTCUSDT");
        assert_eq!(normalize_symbol("SOLUSDT1"), "SOLUSDT");
        assert_eq!(normalize_symbol("BTCUSDT60"), "BTCUSDT");
    }

    #[test]
    fn normalize_is_idempotent() {
        for name in ["BTCUSDT", "OKX:SOL-USDT60", "ethbtc", "DOGEUSDT#0"] {
            let once = normalize_symbol(name);
            assert_eq!(normalize_symbol(&once), once);
        }
    }

    #[test]
    fn split_prefers_longer_quotes() {
        assert_eq!(split_canonical("BTCUSDT"), Some(("BTC", "USDT")));
        assert_eq!(split_canonical("ETHBTC"), Some(("ETH", "BTC")));
        assert_eq!(split_canonical("SHIBUSDC"), Some(("SHIB", "USDC")));
    }

    #[test]
    fn split_rejects_bare_quote() {
        assert_eq!(split_canonical("USDT"), None);
        assert_eq!(split_canonical("XYZ"), None);
    }

    #[test]
    fn okx_round_trip_is_idempotent() {
        for symbol in ["BTCUSDT", "ETHUSDT", "DOGEUSDT", "ETHBTC"] {
            let inst_id = okx_inst_id(symbol).unwrap();
            let canonical = canonical_from_okx(&inst_id);
            assert_eq!(canonical, symbol);
            assert_eq!(okx_inst_id(&canonical).unwrap(), inst_id);
        }
    }

    #[test]
    fn okx_inst_id_rejects_unknown_quote() {
        assert!(matches!(
            okx_inst_id("BTCXYZ"),
            Err(FeedError::UnsupportedSymbol(_))
        ));
    }
}
