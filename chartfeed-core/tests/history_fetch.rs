//! REST-side adapter behavior against local mock exchange endpoints.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;
use warp::http::StatusCode;
use warp::Filter;

use chartfeed_core::{
    BinanceConfig, BinanceDatafeed, DataStatus, Datafeed, Exchange, FeedError, OkxConfig,
    OkxDatafeed, PeriodParams, Resolution, SymbolDescriptor, BINANCE_RESOLUTIONS, OKX_RESOLUTIONS,
};

const BASE_MS: i64 = 1_700_000_000_000;

async fn serve<F>(routes: F) -> String
where
    F: Filter<Error = warp::Rejection> + Clone + Send + Sync + 'static,
    F::Extract: warp::Reply,
{
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    format!("http://{}", addr)
}

fn okx_feed(rest_base: String) -> OkxDatafeed {
    OkxDatafeed::new(OkxConfig {
        rest_base,
        ws_url: "ws://127.0.0.1:9".to_string(),
        reconnect_delay: Duration::from_millis(50),
        ..OkxConfig::default()
    })
}

fn binance_feed(rest_base: String, history_limit: usize) -> BinanceDatafeed {
    BinanceDatafeed::new(BinanceConfig {
        rest_base,
        ws_base: "ws://127.0.0.1:9".to_string(),
        history_limit,
        reconnect_delay: Duration::from_millis(50),
    })
}

fn descriptor(exchange: Exchange, symbol: &str) -> SymbolDescriptor {
    SymbolDescriptor {
        symbol: symbol.to_string(),
        description: symbol.to_string(),
        exchange,
        price_scale: 100,
        volume_precision: 8,
        session: "24x7",
        timezone: "Etc/UTC",
        min_movement: 1,
        has_intraday: true,
        data_status: DataStatus::Streaming,
        supported_resolutions: match exchange {
            Exchange::Binance => BINANCE_RESOLUTIONS,
            Exchange::Okx => OKX_RESOLUTIONS,
        },
    }
}

fn okx_row(ts: i64, close: f64) -> serde_json::Value {
    json!([
        ts.to_string(),
        "1.0",
        "2.0",
        "0.5",
        close.to_string(),
        "10.0",
        "15.0",
        "15.0",
        "1"
    ])
}

fn minute_window(count: i64) -> PeriodParams {
    PeriodParams {
        from: BASE_MS / 1000,
        to: BASE_MS / 1000 + count * 60,
        first_request: true,
    }
}

#[tokio::test]
async fn okx_history_arrives_ascending_and_deduplicated() {
    // The exchange serves rows newest-first; 60 one-minute candles.
    let rows: Vec<serde_json::Value> = (0..60)
        .rev()
        .map(|i| okx_row(BASE_MS + i * 60_000, 1.0 + i as f64))
        .collect();
    let body = json!({ "code": "0", "msg": "", "data": rows });
    let route = warp::path!("market" / "history-candles").map(move || warp::reply::json(&body));
    let base = serve(route).await;

    let feed = okx_feed(base);
    let page = feed
        .get_bars(
            &descriptor(Exchange::Okx, "BTCUSDT"),
            Resolution::Min1,
            minute_window(60),
        )
        .await
        .unwrap();

    assert!(!page.no_data);
    assert_eq!(page.bars.len(), 60);
    assert!(page.bars.windows(2).all(|w| w[0].time < w[1].time));
    assert_eq!(page.bars[0].time, BASE_MS);
    assert_eq!(page.bars[0].close, 1.0);
    assert_eq!(page.bars[59].close, 60.0);
}

#[tokio::test]
async fn okx_empty_window_reports_no_data() {
    let body = json!({ "code": "0", "msg": "", "data": [] });
    let route = warp::path!("market" / "history-candles").map(move || warp::reply::json(&body));
    let base = serve(route).await;

    let feed = okx_feed(base);
    let page = feed
        .get_bars(
            &descriptor(Exchange::Okx, "BTCUSDT"),
            Resolution::Min1,
            minute_window(60),
        )
        .await
        .unwrap();

    assert!(page.no_data);
    assert!(page.bars.is_empty());
}

#[tokio::test]
async fn okx_error_envelope_fails_the_fetch() {
    let body = json!({ "code": "51001", "msg": "Instrument ID does not exist", "data": [] });
    let route = warp::path!("market" / "history-candles").map(move || warp::reply::json(&body));
    let base = serve(route).await;

    let feed = okx_feed(base);
    let err = feed
        .get_bars(
            &descriptor(Exchange::Okx, "BTCUSDT"),
            Resolution::Min1,
            minute_window(60),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::HistoryFetchFailed(_)));
}

#[tokio::test]
async fn okx_unknown_symbol_resolves_to_not_found() {
    let body = json!({
        "code": "0",
        "msg": "",
        "data": [{
            "instId": "BTC-USDT",
            "baseCcy": "BTC",
            "quoteCcy": "USDT",
            "state": "live",
            "tickSz": "0.1"
        }]
    });
    let route = warp::path!("public" / "instruments").map(move || warp::reply::json(&body));
    let base = serve(route).await;

    let feed = okx_feed(base);
    let err = feed.resolve_symbol("FAKEUSDT").await.unwrap_err();
    assert!(matches!(err, FeedError::SymbolNotFound(_)));

    let ok = feed.resolve_symbol("OKX:BTC-USDT").await.unwrap();
    assert_eq!(ok.symbol, "BTCUSDT");
    assert_eq!(ok.exchange, Exchange::Okx);
    assert_eq!(ok.price_scale, 10);
}

#[tokio::test]
async fn metadata_endpoint_failure_surfaces_as_load_error() {
    let route = warp::path!("public" / "instruments")
        .map(|| warp::reply::with_status("boom", StatusCode::INTERNAL_SERVER_ERROR));
    let base = serve(route).await;

    let feed = okx_feed(base);
    let err = feed.resolve_symbol("BTCUSDT").await.unwrap_err();
    assert!(matches!(err, FeedError::MetadataLoadFailed(_)));
}

#[tokio::test]
async fn binance_tick_size_sets_price_scale() {
    let body = json!({
        "symbols": [
            {
                "symbol": "BTCUSDT",
                "status": "TRADING",
                "baseAsset": "BTC",
                "quoteAsset": "USDT",
                "filters": [
                    { "filterType": "PRICE_FILTER", "tickSize": "0.01000000" },
                    { "filterType": "LOT_SIZE", "stepSize": "0.00001000" }
                ]
            },
            {
                "symbol": "AAAUSDT",
                "status": "TRADING",
                "baseAsset": "AAA",
                "quoteAsset": "USDT",
                "filters": [
                    { "filterType": "PRICE_FILTER", "tickSize": "0.0000000000000000000001" }
                ]
            },
            {
                "symbol": "ETHBTC",
                "status": "TRADING",
                "baseAsset": "ETH",
                "quoteAsset": "BTC",
                "filters": []
            },
            {
                "symbol": "XRPUSDT",
                "status": "BREAK",
                "baseAsset": "XRP",
                "quoteAsset": "USDT",
                "filters": []
            }
        ]
    });
    let route = warp::path!("exchangeInfo").map(move || warp::reply::json(&body));
    let base = serve(route).await;

    let feed = binance_feed(base, 1000);
    let ok = feed.resolve_symbol("BINANCE:BTCUSDT").await.unwrap();
    assert_eq!(ok.price_scale, 100);
    assert_eq!(ok.description, "BTC/USDT");

    // A tick size beyond u64 range clamps instead of overflowing.
    let clamped = feed.resolve_symbol("AAAUSDT").await.unwrap();
    assert_eq!(clamped.price_scale, 1_000_000_000_000_000_000);

    // Non-USDT and non-trading instruments never enter the cache.
    assert!(matches!(
        feed.resolve_symbol("ETHBTC").await,
        Err(FeedError::SymbolNotFound(_))
    ));
    assert!(matches!(
        feed.resolve_symbol("XRPUSDT").await,
        Err(FeedError::SymbolNotFound(_))
    ));

    let hits = feed.search_symbols("BTC").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].symbol, "BTCUSDT");
    assert_eq!(hits[0].full_name, "Binance:BTCUSDT");
}

#[tokio::test]
async fn binance_history_pages_until_the_window_is_covered() {
    // Five one-minute bars served two at a time forces three requests.
    let route = warp::path!("klines")
        .and(warp::query::<HashMap<String, String>>())
        .map(|query: HashMap<String, String>| {
            let start: i64 = query["startTime"].parse().unwrap();
            let end: i64 = query["endTime"].parse().unwrap();
            let limit: usize = query["limit"].parse().unwrap();
            let rows: Vec<serde_json::Value> = (0..5)
                .map(|i| BASE_MS + i * 60_000)
                .filter(|t| *t >= start && *t <= end)
                .take(limit)
                .map(|t| {
                    json!([
                        t, "1.0", "2.0", "0.5", "1.5", "10.0",
                        t + 59_999, "15.0", 10, "5.0", "7.5", "0"
                    ])
                })
                .collect();
            warp::reply::json(&rows)
        });
    let base = serve(route).await;

    let feed = binance_feed(base, 2);
    let page = feed
        .get_bars(
            &descriptor(Exchange::Binance, "BTCUSDT"),
            Resolution::Min1,
            minute_window(5),
        )
        .await
        .unwrap();

    assert!(!page.no_data);
    assert_eq!(page.bars.len(), 5);
    assert!(page.bars.windows(2).all(|w| w[0].time < w[1].time));
    assert_eq!(page.bars[4].time, BASE_MS + 4 * 60_000);
}

#[tokio::test]
async fn binance_http_error_fails_the_fetch() {
    let route = warp::path!("klines")
        .map(|| warp::reply::with_status("teapot", StatusCode::IM_A_TEAPOT));
    let base = serve(route).await;

    let feed = binance_feed(base, 1000);
    let err = feed
        .get_bars(
            &descriptor(Exchange::Binance, "BTCUSDT"),
            Resolution::Min1,
            minute_window(5),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::HistoryFetchFailed(_)));
}
