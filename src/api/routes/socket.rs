//! Per-session websocket: server events out, client commands in.

use crate::api::AppState;
use crate::builder::PackBuilder;
use crate::error::{ApiError, Error, Result};
use crate::events::{ClientCommand, ServerEvent};
use crate::session::SessionHandle;
use crate::types::SessionId;
use axum::{
    Json,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Consecutive failed reads before a socket is abandoned
const MAX_READ_FAILURES: u32 = 10;

type SharedSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Consecutive read failures on one socket
#[derive(Debug, Default)]
struct ReadFailures(u32);

impl ReadFailures {
    /// Count a failure; `true` once the socket should be abandoned
    fn record(&mut self) -> bool {
        self.0 += 1;
        self.0 >= MAX_READ_FAILURES
    }

    fn reset(&mut self) {
        self.0 = 0;
    }
}

/// GET /sessions/:id/socket - Websocket upgrade
///
/// The `Origin` header must equal the configured frontend origin.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}/socket",
    tag = "sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 101, description = "Switching to the websocket protocol"),
        (status = 400, description = "Not a websocket upgrade request"),
        (status = 403, description = "Origin not allowed"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn session_socket(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    headers: HeaderMap,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response> {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if origin != state.config.web.frontend {
        tracing::debug!(session_id = %id, origin, "Websocket origin rejected");
        return Ok((
            StatusCode::FORBIDDEN,
            Json(ApiError::new(
                "forbidden_origin",
                format!("origin '{origin}' is not allowed"),
            )),
        )
            .into_response());
    }

    let handle = state.builder.session(id).await?;
    let ws = ws.ok_or_else(|| Error::InvalidRequest {
        message: "expected a websocket upgrade".into(),
        issues: Vec::new(),
    })?;

    let builder = Arc::clone(&state.builder);
    Ok(ws.on_upgrade(move |socket| serve_socket(socket, builder, handle)))
}

async fn serve_socket(socket: WebSocket, builder: Arc<PackBuilder>, handle: Arc<SessionHandle>) {
    let session_id = handle.id();
    let (sink, mut stream) = socket.split();
    let sink: SharedSink = Arc::new(Mutex::new(sink));

    // subscribe first so nothing emitted after `connected` is missed
    let events = handle.subscribe();
    if let Err(e) = send_event(&sink, &ServerEvent::Connected).await {
        tracing::debug!(session_id = %session_id, error = %e, "Websocket closed before connect");
        return;
    }
    tracing::info!(session_id = %session_id, "Websocket connected");

    let mut forward = tokio::spawn(forward_events(Arc::clone(&sink), events, session_id));
    let mut failures = ReadFailures::default();

    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(frame))) => {
                    failures.reset();
                    handle_frame(&builder, session_id, &frame).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let give_up = failures.record();
                    tracing::debug!(session_id = %session_id, error = %e, failures = failures.0, "Websocket read failed");
                    if give_up {
                        tracing::warn!(session_id = %session_id, "Too many websocket read failures, giving up");
                        break;
                    }
                }
            },
            _ = &mut forward => break,
        }
    }

    forward.abort();
    tracing::info!(session_id = %session_id, "Websocket disconnected");
}

/// Forward session events to one socket until the session is deleted
async fn forward_events(
    sink: SharedSink,
    events: broadcast::Receiver<ServerEvent>,
    session_id: SessionId,
) {
    let mut events = BroadcastStream::new(events);

    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                if let Err(e) = send_event(&sink, &event).await {
                    tracing::debug!(session_id = %session_id, event = event.name(), error = %e, "Websocket write failed");
                    return;
                }
                if event.is_terminal() {
                    if let Err(e) = sink.lock().await.close().await {
                        tracing::debug!(session_id = %session_id, error = %e, "Websocket close failed");
                    }
                    return;
                }
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(session_id = %session_id, skipped, "Websocket subscriber lagged");
            }
        }
    }
}

async fn send_event(sink: &SharedSink, event: &ServerEvent) -> Result<()> {
    let frame = event.to_frame()?;
    sink.lock()
        .await
        .send(Message::Text(frame))
        .await
        .map_err(|e| Error::Other(format!("websocket write failed: {e}")))
}

/// Run one client command against the session, then save the snapshot
///
/// Failures are logged; the client learns about progress only through events.
async fn handle_frame(builder: &PackBuilder, session_id: SessionId, frame: &str) {
    let command = match ClientCommand::parse(frame) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Malformed websocket command");
            return;
        }
    };

    let result = match command {
        ClientCommand::Preliminary => builder.start_preliminary(session_id).await,
        ClientCommand::Process => builder.start_process(session_id).await,
        ClientCommand::ToggleLink(toggle) => {
            builder.toggle_link(session_id, toggle).await.map(|_| ())
        }
        ClientCommand::Package => builder.start_package(session_id).await,
        ClientCommand::GetDownload(package_id) => builder
            .publish_package(session_id, &package_id)
            .await
            .map(|_| ()),
        ClientCommand::Delete => builder.delete_session(session_id).await,
        ClientCommand::Unknown(name) => {
            tracing::debug!(session_id = %session_id, command = %name, "Unknown websocket command");
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::warn!(session_id = %session_id, error = %e, "Websocket command failed");
    }
    builder.save_snapshot().await;
}
