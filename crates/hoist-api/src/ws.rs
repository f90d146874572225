//! Per-deployment event stream over WebSocket.
//!
//! Each socket registers a [`ChannelSubscriber`] with the emitter and
//! forwards its events as JSON text frames until either side goes away.
//! Frames for one job are not guaranteed to arrive in emission order.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hoist_events::{ChannelSubscriber, Event};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::ApiState;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Silence after a Ping before the connection is considered dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

/// Events buffered per socket. A socket that falls this far behind is
/// unsubscribed and closed.
const SOCKET_BUFFER: usize = 64;

/// GET /api/v1/deployments/{name}/events
pub async fn events(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, name))
}

async fn handle_socket(socket: WebSocket, state: ApiState, deployment: String) {
    let (subscriber, rx) = ChannelSubscriber::new(SOCKET_BUFFER);
    let id = state.events.subscribe(&deployment, Arc::new(subscriber)).await;
    debug!(%deployment, subscription = %id, "event stream opened");

    let (sender, receiver) = socket.split();
    run_socket_loop(sender, receiver, rx).await;

    state.events.unsubscribe(&deployment, id).await;
    debug!(%deployment, subscription = %id, "event stream closed");
}

async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: mpsc::Receiver<Event>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            event = rx.recv() => {
                let Some(event) = event else { break };
                match event.to_json() {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "could not encode event"),
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}
