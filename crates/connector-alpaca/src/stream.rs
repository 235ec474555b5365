//! Persistent trade stream with automatic reconnection.

use std::sync::Arc;

use auth::ApiCredentials;
use connector_core::{wait_for_shutdown, ConnectorError, SourceHandle, StreamConfig, TradeCallback};
use futures_util::{SinkExt, StreamExt};
use metrics::SharedMetrics;
use model::Symbol;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::parser::{auth_message, parse_message, subscribe_message, ParsedEvent};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection state of the trade stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Authenticating,
    Subscribed,
}

/// Result of a connection attempt.
enum ConnectResult {
    Connected(WsStream),
    Shutdown,
    Error(ConnectorError),
}

/// Result of a session.
enum SessionResult {
    /// Shutdown was requested while connecting or streaming.
    Shutdown,
    /// The connection was established and later lost.
    Disconnected(ConnectorError),
    /// The connection could not be established.
    ConnectFailed(ConnectorError),
}

/// Everything one session needs, shared across reconnects.
struct SessionContext {
    config: StreamConfig,
    credentials: ApiCredentials,
    symbols: Vec<Symbol>,
    on_trade: TradeCallback,
    metrics: SharedMetrics,
    state_tx: Arc<watch::Sender<StreamState>>,
}

impl SessionContext {
    fn set_state(&self, state: StreamState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Stream state changed");
        }
    }
}

/// Client for the venue's crypto trade stream.
pub struct TradeStreamClient {
    config: StreamConfig,
    credentials: ApiCredentials,
    metrics: SharedMetrics,
    state_tx: Arc<watch::Sender<StreamState>>,
}

impl TradeStreamClient {
    pub fn new(config: StreamConfig, credentials: ApiCredentials, metrics: SharedMetrics) -> Self {
        let (state_tx, _) = watch::channel(StreamState::Disconnected);
        Self {
            config,
            credentials,
            metrics,
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn state(&self) -> StreamState {
        *self.state_tx.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.state_tx.subscribe()
    }

    /// Connect, subscribe to trades for `symbols` and keep the connection alive until
    /// the returned handle is stopped.
    pub fn start(&self, symbols: Vec<Symbol>, on_trade: TradeCallback) -> SourceHandle {
        info!(url = %self.config.url, symbols = ?symbols, "Starting trade stream");

        let ctx = SessionContext {
            config: self.config.clone(),
            credentials: self.credentials.clone(),
            symbols,
            on_trade,
            metrics: self.metrics.clone(),
            state_tx: self.state_tx.clone(),
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        SourceHandle::spawn("trade-stream", shutdown_tx, run_stream(ctx, shutdown_rx))
    }
}

async fn connect_with_timeout(
    config: &StreamConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> ConnectResult {
    tokio::select! {
        biased;

        _ = wait_for_shutdown(shutdown_rx) => ConnectResult::Shutdown,

        result = tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str())) => {
            match result {
                Ok(Ok((stream, _))) => ConnectResult::Connected(stream),
                Ok(Err(e)) => ConnectResult::Error(ConnectorError::WebSocket(e.to_string())),
                Err(_) => ConnectResult::Error(ConnectorError::WebSocket("connection timeout".to_string())),
            }
        }
    }
}

/// Run a single connection: connect, authenticate, subscribe, then stream until the
/// connection drops or shutdown is requested.
async fn run_session(ctx: &SessionContext, shutdown_rx: &mut watch::Receiver<bool>) -> SessionResult {
    ctx.set_state(StreamState::Connecting);
    info!(url = %ctx.config.url, "Connecting to trade stream");

    let ws_stream = match connect_with_timeout(&ctx.config, shutdown_rx).await {
        ConnectResult::Connected(stream) => stream,
        ConnectResult::Shutdown => return SessionResult::Shutdown,
        ConnectResult::Error(e) => return SessionResult::ConnectFailed(e),
    };

    let (mut write, mut read) = ws_stream.split();

    // Auth and subscribe go out back to back; the server processes them in order.
    ctx.set_state(StreamState::Authenticating);
    for payload in [auth_message(&ctx.credentials), subscribe_message(&ctx.symbols)] {
        if let Err(e) = write.send(Message::text(payload)).await {
            ctx.metrics.inc_websocket_errors();
            return SessionResult::Disconnected(ConnectorError::WebSocket(e.to_string()));
        }
    }
    ctx.set_state(StreamState::Subscribed);
    info!(symbols = ?ctx.symbols, "Subscribed to trades");

    loop {
        tokio::select! {
            biased;

            _ = wait_for_shutdown(shutdown_rx) => {
                info!("Shutdown signal received, closing connection");
                let _ = write.close().await;
                return SessionResult::Shutdown;
            }

            msg_opt = read.next() => {
                let msg = match msg_opt {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        ctx.metrics.inc_websocket_errors();
                        return SessionResult::Disconnected(ConnectorError::WebSocket(e.to_string()));
                    }
                    None => {
                        info!("WebSocket stream ended");
                        return SessionResult::Disconnected(ConnectorError::ConnectionClosed);
                    }
                };

                match msg {
                    Message::Text(text) => {
                        ctx.metrics.inc_messages_received();
                        dispatch(ctx, &text);
                    }
                    Message::Ping(data) => {
                        debug!("Received Ping, sending Pong");
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            warn!(error = %e, "Failed to send Pong");
                            ctx.metrics.inc_websocket_errors();
                            return SessionResult::Disconnected(ConnectorError::WebSocket(e.to_string()));
                        }
                    }
                    Message::Close(frame) => {
                        info!(frame = ?frame, "WebSocket closed by server");
                        return SessionResult::Disconnected(ConnectorError::ConnectionClosed);
                    }
                    _ => {}
                }
            }
        }
    }
}

fn dispatch(ctx: &SessionContext, text: &str) {
    let events = match parse_message(text) {
        Ok(events) => events,
        Err(e) => {
            ctx.metrics.inc_parse_errors();
            warn!(error = %e, "Failed to parse stream payload");
            return;
        }
    };

    for event in events {
        match event {
            ParsedEvent::Trade(trade) => {
                ctx.metrics.inc_trades_received();
                (ctx.on_trade)(trade);
            }
            ParsedEvent::Malformed(e) => {
                ctx.metrics.inc_parse_errors();
                warn!(error = %e, "Dropping malformed trade event");
            }
            ParsedEvent::Error { code, message } => {
                warn!(code = ?code, message = %message, "Stream reported an error");
            }
            ParsedEvent::Other(_) => {}
        }
    }
}

/// Reconnect loop. Only returns once shutdown has been requested.
async fn run_stream(
    ctx: SessionContext,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), ConnectorError> {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let error = match run_session(&ctx, &mut shutdown_rx).await {
            SessionResult::Shutdown => break,
            SessionResult::Disconnected(e) => {
                warn!(error = %e, "Connection lost");
                e
            }
            SessionResult::ConnectFailed(e) => {
                ctx.metrics.inc_websocket_errors();
                warn!(error = %e, "Connection failed");
                e
            }
        };
        ctx.set_state(StreamState::Disconnected);

        debug!(
            error = %error,
            delay_secs = ctx.config.reconnect_delay.as_secs_f64(),
            "Waiting before reconnect"
        );
        tokio::select! {
            _ = tokio::time::sleep(ctx.config.reconnect_delay) => {}
            _ = wait_for_shutdown(&mut shutdown_rx) => {
                info!("Shutdown requested during reconnect delay");
                break;
            }
        }

        ctx.metrics.inc_reconnect_attempts();
        info!("Reconnecting to trade stream");
    }

    ctx.set_state(StreamState::Disconnected);
    info!("Trade stream shutdown complete");
    Ok(())
}
