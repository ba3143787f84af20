use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio_stream::{
    wrappers::errors::BroadcastStreamRecvError, Stream, StreamExt, StreamMap,
};
use tracing::{debug, info, warn};

use crate::{
    config::ServerConfig,
    room::{
        ClientMessage, Envelope, EnvelopeStream, RoomRegistry, RoomSettings, RoomSummary,
        ServerMessage, SharedState, Source, ViewerId,
    },
    traffic::{Region, RegionInfo},
};

#[derive(Clone)]
struct AppState {
    registry: Arc<RoomRegistry>,
}

pub async fn run(config: ServerConfig) -> Result<()> {
    config.validate()?;
    let registry = Arc::new(RoomRegistry::new(RoomSettings::from_config(&config)));
    let app = router(registry);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        %addr,
        default_room = %config.default_room,
        region = %config.initial_region,
        tick_secs = config.tick_interval_secs,
        "bridge server live (Ctrl+C to stop)"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn router(registry: Arc<RoomRegistry>) -> Router {
    Router::new()
        .route("/ws", get(viewer_socket))
        .route("/api/regions", get(regions))
        .route("/api/rooms", get(rooms))
        .route("/api/rooms/:room/state", get(room_state))
        .route("/api/rooms/:room/events", get(room_events))
        .with_state(AppState { registry })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down bridge server");
}

async fn regions() -> Json<Vec<RegionInfo>> {
    Json(Region::ALL.into_iter().map(RegionInfo::from).collect())
}

async fn rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.registry.summaries())
}

async fn room_state(
    Path(room): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SharedState>, StatusCode> {
    let handle = state.registry.get(&room).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(handle.snapshot()))
}

/// Read-only feed of everything a room broadcasts, for passive displays.
async fn room_events(
    Path(room): Path<String>,
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let handle = state.registry.get(&room).ok_or(StatusCode::NOT_FOUND)?;
    let stream = handle
        .observe()
        .into_stream()
        .filter_map(|item| match item {
            Ok(envelope) => serde_json::to_string(&envelope)
                .ok()
                .map(|payload| {
                    Ok::<_, Infallible>(
                        Event::default()
                            .event(envelope.message.kind())
                            .data(payload),
                    )
                }),
            Err(_) => None,
        });
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    ))
}

async fn viewer_socket(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| viewer_session(socket, state.registry))
}

async fn viewer_session(mut socket: WebSocket, registry: Arc<RoomRegistry>) {
    let viewer = registry.next_viewer_id();
    let welcome = Envelope::to_room(Source::Server, ServerMessage::Welcome { viewer_id: viewer });
    if send_envelope(&mut socket, &welcome).await.is_err() {
        return;
    }
    debug!(%viewer, "viewer connected");

    let mut subscriptions: StreamMap<String, EnvelopeStream> = StreamMap::new();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_text(&registry, viewer, &text, &mut subscriptions);
                        if let Some(reply) = reply {
                            if send_envelope(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if socket.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        break;
                    }
                    _ => {}
                }
            }
            Some((room, item)) = subscriptions.next(), if !subscriptions.is_empty() => {
                let Some(envelope) = outbound(&registry, viewer, &room, item) else {
                    continue;
                };
                if send_envelope(&mut socket, &envelope).await.is_err() {
                    break;
                }
            }
        }
    }

    // Stop delivery before the roster broadcast goes out.
    drop(subscriptions);
    let left = registry.disconnect(viewer);
    debug!(%viewer, rooms = ?left, "viewer session closed");
}

/// What to send for one item off a room subscription. A lagged viewer gets
/// a fresh snapshot in place of the frames it missed.
fn outbound(
    registry: &RoomRegistry,
    viewer: ViewerId,
    room: &str,
    item: Result<Envelope, BroadcastStreamRecvError>,
) -> Option<Envelope> {
    match item {
        Ok(envelope) => Some(envelope),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(%viewer, %room, skipped, "viewer lagged; resending snapshot");
            registry
                .get(room)
                .map(|handle| Envelope::to_room(Source::Server, handle.snapshot_message()))
        }
    }
}

/// Applies one inbound frame. Returns the direct reply, if any. Anything
/// unparseable is dropped.
fn handle_client_text(
    registry: &RoomRegistry,
    viewer: ViewerId,
    text: &str,
    subscriptions: &mut StreamMap<String, EnvelopeStream>,
) -> Option<Envelope> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(%viewer, error = %err, "malformed client message dropped");
            return None;
        }
    };

    match message {
        ClientMessage::Join { room, role, name } => {
            match registry.join(&room, viewer, role, &name) {
                Ok((subscription, snapshot)) => {
                    subscriptions.insert(room.trim().to_string(), subscription.into_stream());
                    Some(Envelope::to_room(Source::Server, snapshot))
                }
                Err(err) => {
                    warn!(%viewer, error = %err, "join dropped");
                    None
                }
            }
        }
        ClientMessage::Leave { room } => {
            subscriptions.remove(room.trim());
            registry.leave(&room, viewer);
            None
        }
        ClientMessage::Command { room, kind, value } => {
            registry.submit(&room, viewer, &kind, value);
            None
        }
    }
}

async fn send_envelope(socket: &mut WebSocket, envelope: &Envelope) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(envelope).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload)).await
}
