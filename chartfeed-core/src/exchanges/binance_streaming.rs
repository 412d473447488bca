//! Live kline streaming for Binance
//!
//! Binance scopes a WebSocket URL to a single stream, so each subscription
//! owns its own connection and its own task. Dropped connections reconnect
//! after a fixed delay; subscribers get a cache reset signal before the
//! first bar after a reconnect.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::datafeed::{BarSink, CacheResetSignal};
use crate::market_data::codec::{bar_from_binance_ws, BinanceWsKlineMessage};
use crate::market_data::intervals::Resolution;

struct StreamHandle {
    stop: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

/// Per-subscription WebSocket streams keyed by listener id.
pub struct BinanceStreaming {
    ws_base: String,
    reconnect_delay: Duration,
    streams: Arc<DashMap<String, StreamHandle>>,
}

impl BinanceStreaming {
    pub fn new(ws_base: String, reconnect_delay: Duration) -> Self {
        Self {
            ws_base,
            reconnect_delay,
            streams: Arc::new(DashMap::new()),
        }
    }

    /// Opens a stream for `listener_id`, replacing any stream already
    /// registered under that id.
    pub async fn subscribe(
        &self,
        symbol: &str,
        resolution: Resolution,
        listener_id: &str,
        on_tick: BarSink,
        on_reset: CacheResetSignal,
    ) {
        self.unsubscribe(listener_id).await;

        let url = format!(
            "{}/{}@kline_{}",
            self.ws_base,
            symbol.to_lowercase(),
            resolution.binance_interval()
        );
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let delay = self.reconnect_delay;
        let id = listener_id.to_string();
        info!(listener_id = %id, %url, "opening Binance kline stream");
        let task = tokio::spawn(run_stream(url, on_tick, on_reset, stop_rx, delay, id));
        self.streams.insert(
            listener_id.to_string(),
            StreamHandle {
                stop: stop_tx,
                task,
            },
        );
    }

    /// Closes the stream for `listener_id`. Unknown ids are a no-op.
    pub async fn unsubscribe(&self, listener_id: &str) {
        if let Some((_, handle)) = self.streams.remove(listener_id) {
            debug!(%listener_id, "closing Binance kline stream");
            if handle.stop.send(()).is_err() {
                // Task already finished on its own, make sure it is gone.
                handle.task.abort();
            }
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.streams.len()
    }
}

impl Drop for BinanceStreaming {
    fn drop(&mut self) {
        self.streams.retain(|_, handle| {
            let _ = handle.stop.send(());
            handle.task.abort();
            false
        });
    }
}

async fn run_stream(
    url: String,
    on_tick: BarSink,
    on_reset: CacheResetSignal,
    mut stop: mpsc::UnboundedReceiver<()>,
    reconnect_delay: Duration,
    listener_id: String,
) {
    let mut needs_reset = false;
    loop {
        let mut ws = match connect_async(&url).await {
            Ok((ws, _)) => ws,
            Err(err) => {
                error!(%listener_id, %err, "Binance stream connect failed");
                tokio::select! {
                    _ = stop.recv() => return,
                    _ = tokio::time::sleep(reconnect_delay) => continue,
                }
            }
        };
        if needs_reset {
            needs_reset = false;
            if on_reset.send(()).is_err() {
                return;
            }
        }

        let abnormal = loop {
            tokio::select! {
                _ = stop.recv() => {
                    let _ = ws
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "unsubscribed".into(),
                        })))
                        .await;
                    return;
                }
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<BinanceWsKlineMessage>(&text) {
                            Ok(message) if message.event_type == "kline" => {
                                match bar_from_binance_ws(&message.kline) {
                                    Ok(bar) => {
                                        if on_tick.send(bar).is_err() {
                                            // Receiver gone, treat as unsubscribe.
                                            return;
                                        }
                                    }
                                    Err(err) => warn!(%listener_id, %err, "dropping bad kline"),
                                }
                            }
                            Ok(_) => {}
                            Err(err) => warn!(%listener_id, %err, "unrecognized stream message"),
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if ws.send(Message::Pong(payload)).await.is_err() {
                            break true;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let normal = frame
                            .as_ref()
                            .map(|f| f.code == CloseCode::Normal)
                            .unwrap_or(false);
                        if normal {
                            return;
                        }
                        break true;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%listener_id, %err, "Binance stream error");
                        break true;
                    }
                    None => break true,
                },
            }
        };

        if abnormal {
            needs_reset = true;
            warn!(%listener_id, "Binance stream dropped, reconnecting");
            tokio::select! {
                _ = stop.recv() => return,
                _ = tokio::time::sleep(reconnect_delay) => {}
            }
        }
    }
}
