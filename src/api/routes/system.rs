//! System handlers: support info and OpenAPI.

use axum::{Json, response::IntoResponse};

use crate::types::SupportInfo;

/// GET /info - Platforms and versions offered to clients
#[utoipa::path(
    get,
    path = "/api/info",
    tag = "system",
    responses(
        (status = 200, description = "Supported platforms and versions", body = SupportInfo)
    )
)]
pub async fn get_info() -> impl IntoResponse {
    Json(SupportInfo::current())
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/api/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}
