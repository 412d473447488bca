//! Live candle streaming for OKX
//!
//! OKX multiplexes every candle channel over a single WebSocket, so one
//! connection task serves all subscriptions. The registry of subscriptions
//! is the source of truth; the command channel only nudges the task to
//! send frames or tear the connection down. On reconnect every subscriber
//! gets a cache reset signal before the channels are re-established, and
//! an idle connection drops a text `ping` on a timer to stay alive.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::datafeed::{BarSink, CacheResetSignal};
use crate::market_data::codec::bar_from_okx_row;

/// One chart listener attached to an OKX candle channel.
#[derive(Clone)]
pub struct OkxSubscription {
    pub listener_id: String,
    pub inst_id: String,
    /// Channel name, e.g. `candle1m`.
    pub channel: String,
    pub on_tick: BarSink,
    pub on_reset: CacheResetSignal,
}

impl OkxSubscription {
    fn channel_key(&self) -> String {
        format!("{}:{}", self.inst_id, self.channel)
    }
}

enum Command {
    Subscribe { inst_id: String, channel: String },
    Unsubscribe { inst_id: String, channel: String },
}

type Registry = Arc<RwLock<HashMap<String, OkxSubscription>>>;

/// Shared-connection stream manager for OKX candle channels.
pub struct OkxStreaming {
    commands: mpsc::UnboundedSender<Command>,
    registry: Registry,
    task: JoinHandle<()>,
}

impl OkxStreaming {
    /// Spawns the connection task. Must be called inside a Tokio runtime.
    pub fn new(url: String, reconnect_delay: Duration, ping_interval: Duration) -> Self {
        let registry: Registry = Arc::new(RwLock::new(HashMap::new()));
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(
            url,
            reconnect_delay,
            ping_interval,
            Arc::clone(&registry),
            command_rx,
        ));
        Self {
            commands,
            registry,
            task,
        }
    }

    /// Registers a listener, replacing any prior subscription under the
    /// same listener id.
    pub async fn subscribe(&self, sub: OkxSubscription) {
        info!(
            listener_id = %sub.listener_id,
            inst_id = %sub.inst_id,
            channel = %sub.channel,
            "subscribing OKX candle channel"
        );
        let replaced = {
            let mut registry = self.registry.write();
            let replaced = registry.remove(&sub.listener_id);
            registry.insert(sub.listener_id.clone(), sub.clone());
            replaced
        };
        if let Some(old) = replaced {
            let _ = self.commands.send(Command::Unsubscribe {
                inst_id: old.inst_id,
                channel: old.channel,
            });
        }
        let _ = self.commands.send(Command::Subscribe {
            inst_id: sub.inst_id,
            channel: sub.channel,
        });
    }

    /// Detaches a listener. Unknown ids are a no-op. The connection closes
    /// once the last listener is gone.
    pub async fn unsubscribe(&self, listener_id: &str) {
        let removed = self.registry.write().remove(listener_id);
        if let Some(old) = removed {
            debug!(%listener_id, channel = %old.channel, "unsubscribing OKX candle channel");
            let _ = self.commands.send(Command::Unsubscribe {
                inst_id: old.inst_id,
                channel: old.channel,
            });
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.read().len()
    }
}

impl Drop for OkxStreaming {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn control_frame(op: &str, channel: &str, inst_id: &str) -> String {
    serde_json::json!({
        "op": op,
        "args": [{ "channel": channel, "instId": inst_id }]
    })
    .to_string()
}

fn channel_in_use(registry: &Registry, inst_id: &str, channel: &str) -> bool {
    registry
        .read()
        .values()
        .any(|sub| sub.inst_id == inst_id && sub.channel == channel)
}

#[derive(Debug, Deserialize)]
struct OkxWsEnvelope {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    arg: Option<OkxWsArg>,
    #[serde(default)]
    data: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OkxWsArg {
    channel: String,
    #[serde(rename = "instId")]
    inst_id: String,
}

/// Routes one text frame to every listener on the matching channel.
fn dispatch_text(registry: &Registry, text: &str) {
    if text == "pong" {
        return;
    }
    let envelope: OkxWsEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(%err, "unrecognized OKX stream message");
            return;
        }
    };
    if let Some(event) = envelope.event {
        debug!(%event, "OKX stream event");
        return;
    }
    let arg = match envelope.arg {
        Some(arg) => arg,
        None => return,
    };
    if !arg.channel.starts_with("candle") {
        return;
    }
    let sinks: Vec<BarSink> = registry
        .read()
        .values()
        .filter(|sub| sub.inst_id == arg.inst_id && sub.channel == arg.channel)
        .map(|sub| sub.on_tick.clone())
        .collect();
    if sinks.is_empty() {
        return;
    }
    for row in &envelope.data {
        match bar_from_okx_row(row) {
            Ok(bar) => {
                for sink in &sinks {
                    let _ = sink.send(bar);
                }
            }
            Err(err) => warn!(%err, "dropping bad OKX candle"),
        }
    }
}

async fn run_connection(
    url: String,
    reconnect_delay: Duration,
    ping_interval: Duration,
    registry: Registry,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut needs_reset = false;
    'outer: loop {
        if registry.read().is_empty() {
            // Idle: nothing to stream, nothing staled by the gap.
            needs_reset = false;
            if commands.recv().await.is_none() {
                return;
            }
            continue;
        }

        let mut ws = match connect_async(&url).await {
            Ok((ws, _)) => ws,
            Err(err) => {
                error!(%err, "OKX stream connect failed");
                tokio::select! {
                    cmd = commands.recv() => if cmd.is_none() { return; },
                    _ = tokio::time::sleep(reconnect_delay) => {}
                }
                continue;
            }
        };
        info!("OKX stream connected");

        // Stale caches are flushed before any channel comes back up, so no
        // post-reconnect bar lands on old history.
        if needs_reset {
            needs_reset = false;
            let resets: Vec<CacheResetSignal> = registry
                .read()
                .values()
                .map(|sub| sub.on_reset.clone())
                .collect();
            for reset in resets {
                let _ = reset.send(());
            }
        }

        // One subscribe frame per distinct channel on this connection.
        // `active` keeps later Subscribe commands from repeating them.
        let mut active: HashSet<String> = HashSet::new();
        let frames: Vec<String> = {
            let registry = registry.read();
            registry
                .values()
                .filter(|sub| active.insert(sub.channel_key()))
                .map(|sub| control_frame("subscribe", &sub.channel, &sub.inst_id))
                .collect()
        };
        for frame in frames {
            if ws.send(Message::Text(frame)).await.is_err() {
                needs_reset = true;
                tokio::select! {
                    cmd = commands.recv() => if cmd.is_none() { return; },
                    _ = tokio::time::sleep(reconnect_delay) => {}
                }
                continue 'outer;
            }
        }

        let mut ping = tokio::time::interval_at(
            Instant::now() + ping_interval,
            ping_interval,
        );
        let reconnect = loop {
            tokio::select! {
                cmd = commands.recv() => {
                    let first = match cmd {
                        Some(cmd) => cmd,
                        None => {
                            let _ = close_normal(&mut ws).await;
                            return;
                        }
                    };
                    // Drain the whole batch before deciding whether the
                    // connection still has listeners.
                    let mut batch = vec![first];
                    while let Ok(cmd) = commands.try_recv() {
                        batch.push(cmd);
                    }
                    let mut send_failed = false;
                    for cmd in batch {
                        match cmd {
                            Command::Subscribe { inst_id, channel } => {
                                if active.insert(format!("{}:{}", inst_id, channel)) {
                                    let frame = control_frame("subscribe", &channel, &inst_id);
                                    if ws.send(Message::Text(frame)).await.is_err() {
                                        send_failed = true;
                                        break;
                                    }
                                }
                            }
                            Command::Unsubscribe { inst_id, channel } => {
                                // Keep the channel open while another
                                // listener still shares it.
                                if !channel_in_use(&registry, &inst_id, &channel)
                                    && active.remove(&format!("{}:{}", inst_id, channel))
                                {
                                    let frame = control_frame("unsubscribe", &channel, &inst_id);
                                    if ws.send(Message::Text(frame)).await.is_err() {
                                        send_failed = true;
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    if send_failed {
                        break true;
                    }
                    if registry.read().is_empty() {
                        let _ = close_normal(&mut ws).await;
                        break false;
                    }
                },
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => dispatch_text(&registry, &text),
                    Some(Ok(Message::Ping(payload))) => {
                        if ws.send(Message::Pong(payload)).await.is_err() {
                            break true;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break !registry.read().is_empty();
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(%err, "OKX stream error");
                        break !registry.read().is_empty();
                    }
                },
                _ = ping.tick() => {
                    if ws.send(Message::Text("ping".to_string())).await.is_err() {
                        break true;
                    }
                }
            }
        };

        if reconnect {
            needs_reset = true;
            warn!("OKX stream dropped, reconnecting");
            tokio::select! {
                cmd = commands.recv() => if cmd.is_none() { return; },
                _ = tokio::time::sleep(reconnect_delay) => {}
            }
        }
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn close_normal(ws: &mut WsStream) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    ws.send(Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "all listeners unsubscribed".into(),
    })))
    .await
}
