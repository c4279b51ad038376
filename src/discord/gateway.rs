use anyhow::{Context, Result, anyhow};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::DiscordClient;
use crate::models::Message;

/// `GUILD_MESSAGES` (512) | `DIRECT_MESSAGES` (4096) | `MESSAGE_CONTENT` (32768)
pub const DEFAULT_INTENTS: u64 = 512 | 4096 | 32768;

/// Used when Hello does not carry an interval (ms).
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 41250;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Close codes after which reconnecting cannot succeed:
/// authentication failed, invalid shard, sharding required, invalid API
/// version, invalid intents, disallowed intents.
const FATAL_CLOSE_CODES: [u16; 6] = [4004, 4010, 4011, 4012, 4013, 4014];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatewayOpcode {
    Dispatch,
    Heartbeat,
    Identify,
    Resume,
    Reconnect,
    InvalidSession,
    Hello,
    HeartbeatAck,
}

impl GatewayOpcode {
    fn code(self) -> u8 {
        match self {
            Self::Dispatch => 0,
            Self::Heartbeat => 1,
            Self::Identify => 2,
            Self::Resume => 6,
            Self::Reconnect => 7,
            Self::InvalidSession => 9,
            Self::Hello => 10,
            Self::HeartbeatAck => 11,
        }
    }

    fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }
}

/// Events the bot cares about
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready {
        session_id: String,
        resume_gateway_url: String,
        user_id: String,
    },
    MessageCreate(Box<Message>),
}

/// How a single websocket session ended
#[derive(Debug, PartialEq, Eq)]
enum Disconnect {
    Reconnect,
    Fatal(u16),
}

/// What the read loop does after a payload was handled
#[derive(Debug, PartialEq, Eq)]
enum FrameAction {
    Continue,
    SendHeartbeat,
    Disconnect(Disconnect),
}

/// Zombie-connection detection: every heartbeat must be acknowledged
/// before the next one is due.
#[derive(Debug)]
struct HeartbeatTracker {
    acked: bool,
}

impl Default for HeartbeatTracker {
    fn default() -> Self {
        Self { acked: true }
    }
}

impl HeartbeatTracker {
    /// Returns `false` when the previous heartbeat was never acknowledged.
    fn beat(&mut self) -> bool {
        if !self.acked {
            return false;
        }
        self.acked = false;
        true
    }

    fn ack(&mut self) {
        self.acked = true;
    }
}

#[derive(Debug, Default)]
struct SessionState {
    session_id: Option<String>,
    resume_gateway_url: Option<String>,
    sequence: Option<i64>,
}

/// Long-lived gateway connection that forwards events over a channel
pub struct Gateway {
    http: DiscordClient,
    intents: u64,
    session: SessionState,
}

impl Gateway {
    pub fn new(http: DiscordClient, intents: u64) -> Self {
        Self {
            http,
            intents,
            session: SessionState::default(),
        }
    }

    /// Keeps a session open until `tx` is closed or Discord refuses the bot.
    pub async fn run(mut self, tx: mpsc::Sender<GatewayEvent>) -> Result<()> {
        loop {
            match self.connect_and_listen(&tx).await {
                Ok(Disconnect::Reconnect) => info!("Discord gateway session ended; reconnecting"),
                Ok(Disconnect::Fatal(code)) => {
                    return Err(anyhow!("Discord closed the gateway with fatal code {code}"));
                }
                Err(e) => error!("Discord gateway error: {:#}", e),
            }

            if tx.is_closed() {
                return Ok(());
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn connect_and_listen(&mut self, tx: &mpsc::Sender<GatewayEvent>) -> Result<Disconnect> {
        let gateway_url = match self.session.resume_gateway_url.clone() {
            Some(url) if !url.is_empty() => url,
            _ => self.http.gateway_url().await?,
        };
        let ws_url = build_gateway_ws_url(&gateway_url);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .with_context(|| format!("connect Discord gateway websocket: {ws_url}"))?;
        let (mut write, mut read) = ws_stream.split();

        let heartbeat_interval_ms = read_hello_heartbeat_interval(&mut read).await?;
        self.send_identify_or_resume(&mut write).await?;

        let mut heartbeat = interval(Duration::from_millis(heartbeat_interval_ms));
        let mut tracker = HeartbeatTracker::default();

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !tracker.beat() {
                        warn!("Discord gateway heartbeat ACK missing; reconnecting");
                        return Ok(Disconnect::Reconnect);
                    }
                    self.send_heartbeat(&mut write).await?;
                }
                message = read.next() => {
                    let Some(message) = message else {
                        warn!("Discord gateway socket closed; reconnecting");
                        return Ok(Disconnect::Reconnect);
                    };

                    let message = message.context("read Discord gateway message")?;
                    if let WsMessage::Close(frame) = &message {
                        let code = frame.as_ref().map(|frame| u16::from(frame.code));
                        warn!("Discord gateway closed the socket with code {:?}", code);
                        return Ok(close_disposition(code));
                    }

                    let Some(raw) = websocket_message_to_text(message) else {
                        continue;
                    };
                    let payload: serde_json::Value =
                        serde_json::from_str(&raw).context("parse Discord gateway payload")?;

                    match self.handle_payload(&payload, &mut tracker, tx).await? {
                        FrameAction::Continue => {}
                        FrameAction::SendHeartbeat => self.send_heartbeat(&mut write).await?,
                        FrameAction::Disconnect(disconnect) => return Ok(disconnect),
                    }
                }
            }
        }
    }

    /// Applies one decoded gateway payload to the session state.
    async fn handle_payload(
        &mut self,
        payload: &serde_json::Value,
        tracker: &mut HeartbeatTracker,
        tx: &mpsc::Sender<GatewayEvent>,
    ) -> Result<FrameAction> {
        if let Some(sequence) = payload.get("s").and_then(serde_json::Value::as_i64) {
            self.session.sequence = Some(sequence);
        }

        let op = payload
            .get("op")
            .and_then(serde_json::Value::as_u64)
            .and_then(GatewayOpcode::from_u64);

        match op {
            Some(GatewayOpcode::Heartbeat) => Ok(FrameAction::SendHeartbeat),
            Some(GatewayOpcode::HeartbeatAck) => {
                tracker.ack();
                Ok(FrameAction::Continue)
            }
            Some(GatewayOpcode::Reconnect) => {
                info!("Discord gateway requested reconnect");
                Ok(FrameAction::Disconnect(Disconnect::Reconnect))
            }
            Some(GatewayOpcode::InvalidSession) => {
                self.handle_invalid_session(payload);
                Ok(FrameAction::Disconnect(Disconnect::Reconnect))
            }
            Some(GatewayOpcode::Dispatch) => {
                self.handle_dispatch(payload, tx).await?;
                Ok(FrameAction::Continue)
            }
            _ => Ok(FrameAction::Continue),
        }
    }

    async fn send_identify_or_resume<WsSink>(&self, write: &mut WsSink) -> Result<()>
    where
        WsSink: Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        if let Some(session_id) = &self.session.session_id {
            debug!("Resuming Discord gateway session {}", session_id);
            let payload = json!({
                "op": GatewayOpcode::Resume.code(),
                "d": {
                    "token": self.http.bot_token(),
                    "session_id": session_id,
                    "seq": self.session.sequence,
                }
            });
            return send_json(write, &payload)
                .await
                .context("send Discord gateway resume");
        }

        let payload = json!({
            "op": GatewayOpcode::Identify.code(),
            "d": {
                "token": self.http.bot_token(),
                "intents": self.intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": env!("CARGO_PKG_NAME"),
                    "device": env!("CARGO_PKG_NAME"),
                }
            }
        });
        send_json(write, &payload)
            .await
            .context("send Discord gateway identify")
    }

    async fn send_heartbeat<WsSink>(&self, write: &mut WsSink) -> Result<()>
    where
        WsSink: Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let payload = json!({
            "op": GatewayOpcode::Heartbeat.code(),
            "d": self.session.sequence,
        });
        send_json(write, &payload)
            .await
            .context("send Discord gateway heartbeat")
    }

    async fn handle_dispatch(
        &mut self,
        payload: &serde_json::Value,
        tx: &mpsc::Sender<GatewayEvent>,
    ) -> Result<()> {
        let event_type = payload
            .get("t")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("");
        let Some(data) = payload.get("d") else {
            return Ok(());
        };

        let Some(event) = parse_dispatch_event(event_type, data) else {
            return Ok(());
        };

        if let GatewayEvent::Ready {
            session_id,
            resume_gateway_url,
            ..
        } = &event
        {
            self.session.session_id = Some(session_id.clone());
            self.session.resume_gateway_url = Some(resume_gateway_url.clone());
        }

        tx.send(event)
            .await
            .context("dispatch parsed Discord gateway event")
    }

    fn handle_invalid_session(&mut self, payload: &serde_json::Value) {
        let can_resume = payload
            .get("d")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        if can_resume {
            warn!("Discord gateway invalid session (resume allowed)");
            return;
        }

        warn!("Discord gateway invalid session; starting a fresh session");
        self.session = SessionState::default();
    }
}

pub fn parse_dispatch_event(event_type: &str, d: &serde_json::Value) -> Option<GatewayEvent> {
    match event_type {
        "READY" => parse_ready_event(d),
        "MESSAGE_CREATE" => match serde_json::from_value::<Message>(d.clone()) {
            Ok(message) => Some(GatewayEvent::MessageCreate(Box::new(message))),
            Err(e) => {
                warn!("Skipping malformed MESSAGE_CREATE payload: {}", e);
                None
            }
        },
        "RESUMED" => {
            info!("Discord gateway session resumed");
            None
        }
        _ => None,
    }
}

fn parse_ready_event(d: &serde_json::Value) -> Option<GatewayEvent> {
    Some(GatewayEvent::Ready {
        session_id: d.get("session_id")?.as_str()?.to_string(),
        resume_gateway_url: d.get("resume_gateway_url")?.as_str()?.to_string(),
        user_id: d.get("user")?.get("id")?.as_str()?.to_string(),
    })
}

fn close_disposition(code: Option<u16>) -> Disconnect {
    match code {
        Some(code) if FATAL_CLOSE_CODES.contains(&code) => Disconnect::Fatal(code),
        _ => Disconnect::Reconnect,
    }
}

async fn send_json<WsSink>(write: &mut WsSink, payload: &serde_json::Value) -> Result<()>
where
    WsSink: Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    write
        .send(WsMessage::Text(payload.to_string().into()))
        .await?;
    Ok(())
}

async fn read_hello_heartbeat_interval<WsRead>(read: &mut WsRead) -> Result<u64>
where
    WsRead: Stream<Item = std::result::Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    while let Some(message) = read.next().await {
        let message = message.context("read Discord gateway hello payload")?;
        let Some(raw) = websocket_message_to_text(message) else {
            continue;
        };

        let payload: serde_json::Value =
            serde_json::from_str(&raw).context("parse Discord gateway hello JSON")?;

        if let Some(interval_ms) = hello_heartbeat_interval(&payload) {
            return Ok(interval_ms);
        }
    }

    Err(anyhow!("Discord gateway closed before Hello"))
}

fn hello_heartbeat_interval(payload: &serde_json::Value) -> Option<u64> {
    let op = payload
        .get("op")
        .and_then(serde_json::Value::as_u64)
        .and_then(GatewayOpcode::from_u64);
    if op != Some(GatewayOpcode::Hello) {
        return None;
    }

    Some(
        payload
            .get("d")
            .and_then(|d| d.get("heartbeat_interval"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS),
    )
}

fn websocket_message_to_text(message: WsMessage) -> Option<String> {
    match message {
        WsMessage::Text(text) => Some(text.to_string()),
        WsMessage::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok(),
        _ => None,
    }
}

fn build_gateway_ws_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    format!("{trimmed}/?v=10&encoding=json")
}
