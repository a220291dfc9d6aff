//! Session handlers: lifecycle, stage triggers, toggles and package downloads.

use super::{CreatedSession, ToggleRequest};
use crate::api::AppState;
use crate::error::{Error, Result};
use crate::events::ToggleLink;
use crate::session::{PACKAGE_FILE, Session};
use crate::types::{LinkId, LinkState, PackageId, Request, SessionId};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

/// GET /sessions - List every live session
#[utoipa::path(
    get,
    path = "/api/sessions",
    tag = "sessions",
    responses(
        (status = 200, description = "All sessions, oldest first", body = Vec<Session>)
    )
)]
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.builder.list_sessions().await)
}

/// POST /sessions - Create a session from a pack request
#[utoipa::path(
    post,
    path = "/api/sessions",
    tag = "sessions",
    request_body(content = Request, description = "Platform, versions and links"),
    responses(
        (status = 200, description = "Session created", body = CreatedSession),
        (status = 400, description = "Malformed request or invalid links", body = crate::error::ApiError)
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CreatedSession>> {
    let request: Request = serde_json::from_slice(&body).map_err(|e| Error::InvalidRequest {
        message: format!("invalid request body: {e}"),
        issues: Vec::new(),
    })?;

    let id = state.builder.create_session(request).await?;
    Ok(Json(CreatedSession { id }))
}

/// GET /sessions/:id - Full session state
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session state", body = Session),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<Session>> {
    Ok(Json(state.builder.get_session(id).await?))
}

/// DELETE /sessions/:id - Delete a session and its files
#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 201, description = "Session deleted"),
        (status = 404, description = "Session not found")
    )
)]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode> {
    state.builder.delete_session(id).await?;
    Ok(StatusCode::CREATED)
}

/// POST /sessions/:id/preliminary - Start resolving links
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/preliminary",
    tag = "stages",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 201, description = "Stage started; progress is reported over the websocket"),
        (status = 400, description = "Session not initialized"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Another stage is running")
    )
)]
pub async fn start_preliminary(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode> {
    state.builder.start_preliminary(id).await?;
    Ok(StatusCode::CREATED)
}

/// POST /sessions/:id/process - Start downloading and checking dependencies
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/process",
    tag = "stages",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 201, description = "Stage started; progress is reported over the websocket"),
        (status = 400, description = "Preliminary stage not done"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Another stage is running")
    )
)]
pub async fn start_process(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode> {
    state.builder.start_process(id).await?;
    Ok(StatusCode::CREATED)
}

/// POST /sessions/:id/package - Start zipping the downloads
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/package",
    tag = "stages",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 201, description = "Stage started; progress is reported over the websocket"),
        (status = 400, description = "Process stage not done"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Another stage is running")
    )
)]
pub async fn start_package(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode> {
    state.builder.start_package(id).await?;
    Ok(StatusCode::CREATED)
}

/// PATCH /sessions/:id/links/:link_id - Enable or disable a download candidate
#[utoipa::path(
    patch,
    path = "/api/sessions/{id}/links/{link_id}",
    tag = "sessions",
    params(
        ("id" = String, Path, description = "Session ID"),
        ("link_id" = String, Path, description = "Link ID")
    ),
    request_body(content = ToggleRequest, description = "Candidate URL and new value"),
    responses(
        (status = 200, description = "Updated link state", body = LinkState),
        (status = 400, description = "Preliminary stage not done or unknown candidate"),
        (status = 404, description = "Session or link not found")
    )
)]
pub async fn toggle_link(
    State(state): State<AppState>,
    Path((id, link_id)): Path<(SessionId, LinkId)>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<LinkState>> {
    let toggle = ToggleLink {
        id: link_id,
        link: request.link,
        value: request.value,
    };
    let link = state.builder.toggle_link(id, toggle).await?;
    state.builder.save_snapshot().await;
    Ok(Json(link))
}

/// POST /sessions/:id/download/:package_id - Publish a package for download
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/download/{package_id}",
    tag = "sessions",
    params(
        ("id" = String, Path, description = "Session ID"),
        ("package_id" = String, Path, description = "Package ID")
    ),
    responses(
        (status = 200, description = "Package published", body = Session),
        (status = 400, description = "Package is not complete"),
        (status = 404, description = "Session or package not found")
    )
)]
pub async fn publish_package(
    State(state): State<AppState>,
    Path((id, package_id)): Path<(SessionId, String)>,
) -> Result<Json<Session>> {
    let session = state.builder.publish_package(id, &package_id).await?;
    state.builder.save_snapshot().await;
    Ok(Json(session))
}

/// GET /sessions/:id/download/:package_id - Stream a published package
#[utoipa::path(
    get,
    path = "/api/sessions/{id}/download/{package_id}",
    tag = "sessions",
    params(
        ("id" = String, Path, description = "Session ID"),
        ("package_id" = String, Path, description = "Package ID")
    ),
    responses(
        (status = 200, description = "Zip archive", content_type = "application/zip"),
        (status = 404, description = "Package not published")
    )
)]
pub async fn download_package(
    State(state): State<AppState>,
    Path((id, package_id)): Path<(SessionId, PackageId)>,
) -> Result<Response> {
    let published = state.builder.published_package(id, package_id).await?;

    let file = tokio::fs::File::open(&published.path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(format!("package {package_id}")),
            _ => Error::Io(e),
        })?;
    let size = file.metadata().await?.len();

    let file_name = published
        .path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(PACKAGE_FILE);

    tracing::debug!(session_id = %id, package_id = %package_id, size, "Serving package");

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={file_name}"),
            ),
            (header::CONTENT_LENGTH, size.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
