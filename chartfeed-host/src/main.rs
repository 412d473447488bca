//! Terminal demo: resolve a symbol, print an hour of history, then tail
//! live bars until interrupted.
//!
//! Usage: `chartfeed-demo [binance|okx] [SYMBOL] [RESOLUTION]`

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chartfeed_core::{Exchange, PeriodParams, Resolution};
use chartfeed_host::ChartHost;

fn parse_args() -> Result<(Exchange, String, Resolution)> {
    let mut args = std::env::args().skip(1);
    let exchange = match args.next().as_deref() {
        None | Some("binance") => Exchange::Binance,
        Some("okx") => Exchange::Okx,
        Some(other) => bail!("unknown exchange {:?}, expected binance or okx", other),
    };
    let symbol = args.next().unwrap_or_else(|| "BTCUSDT".to_string());
    let resolution = args
        .next()
        .unwrap_or_else(|| "1".to_string())
        .parse::<Resolution>()
        .context("bad resolution argument")?;
    Ok((exchange, symbol, resolution))
}

fn format_time(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(when) => when.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ms.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (exchange, symbol, resolution) = parse_args()?;
    let host = ChartHost::new(exchange, &symbol, resolution);
    let datafeed = host.datafeed();

    let config = datafeed.on_ready().await;
    info!(exchange = config.exchange_name, "datafeed ready");

    let descriptor = datafeed
        .resolve_symbol(host.symbol())
        .await
        .with_context(|| format!("resolving {}", host.symbol()))?;
    println!(
        "{} on {} (scale 1/{})",
        descriptor.description, descriptor.exchange, descriptor.price_scale
    );

    let now = Utc::now().timestamp();
    let history = datafeed
        .get_bars(
            &descriptor,
            resolution,
            PeriodParams {
                from: now - 3600,
                to: now,
                first_request: true,
            },
        )
        .await
        .context("fetching history")?;
    for bar in &history.bars {
        println!(
            "{}  O {:<12} H {:<12} L {:<12} C {:<12} V {}",
            format_time(bar.time),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        );
    }
    if history.no_data {
        println!("(no history in the last hour)");
    }

    let (tick_tx, mut ticks) = mpsc::unbounded_channel();
    let (reset_tx, mut resets) = mpsc::unbounded_channel();
    let listener_id = host.new_listener_id();
    datafeed
        .subscribe_bars(&descriptor, resolution, &listener_id, tick_tx, reset_tx)
        .await;
    println!("streaming live bars, press Ctrl-C to stop");

    loop {
        tokio::select! {
            Some(bar) = ticks.recv() => {
                println!(
                    "{}  C {:<12} V {}",
                    format_time(bar.time),
                    bar.close,
                    bar.volume
                );
            }
            Some(()) = resets.recv() => {
                println!("stream reconnected, cached history may be stale");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    datafeed.unsubscribe_bars(&listener_id).await;
    Ok(())
}
