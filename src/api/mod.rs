//! REST API server module
//!
//! Serves the session API and per-session websockets under `/api`, and the
//! static frontend from `<working-directory>/public` everywhere else.

use crate::error::Error;
use crate::{Config, PackBuilder, Result};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{delete, get, patch, post},
};
use axum_server::tls_rustls::RustlsConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Open connections get this long to finish after a shutdown signal (TLS only)
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Create the router with all route definitions
///
/// # Routes
///
/// ## Sessions (under `/api`)
/// - `GET /sessions` - List all sessions
/// - `POST /sessions` - Create a session from a request
/// - `GET /sessions/:id` - Get a session
/// - `DELETE /sessions/:id` - Delete a session and its files
/// - `PATCH /sessions/:id/links/:link_id` - Enable or disable a download candidate
/// - `POST /sessions/:id/download/:package_id` - Publish a package
/// - `GET /sessions/:id/download/:package_id` - Download a published package
/// - `GET /sessions/:id/socket` - Websocket for events and commands
///
/// ## Stages
/// - `POST /sessions/:id/preliminary` - Resolve links
/// - `POST /sessions/:id/process` - Download and check dependencies
/// - `POST /sessions/:id/package` - Zip the downloads
///
/// ## System
/// - `GET /info` - Supported platforms and versions
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
///
/// Any other path is served from `<working-directory>/public`.
pub fn create_router(builder: Arc<PackBuilder>, config: Arc<Config>) -> Router {
    let state = AppState::new(builder, config.clone());

    let api = Router::new()
        // Sessions
        .route("/sessions", get(routes::list_sessions))
        .route("/sessions", post(routes::create_session))
        .route("/sessions/:id", get(routes::get_session))
        .route("/sessions/:id", delete(routes::delete_session))
        .route("/sessions/:id/links/:link_id", patch(routes::toggle_link))
        .route(
            "/sessions/:id/download/:package_id",
            get(routes::download_package),
        )
        .route(
            "/sessions/:id/download/:package_id",
            post(routes::publish_package),
        )
        .route("/sessions/:id/socket", get(routes::session_socket))
        // Stages
        .route("/sessions/:id/preliminary", post(routes::start_preliminary))
        .route("/sessions/:id/process", post(routes::start_process))
        .route("/sessions/:id/package", post(routes::start_package))
        // System
        .route("/info", get(routes::get_info))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes before applying state; it reads the spec from /api/openapi.json
    let api = if config.web.swagger_ui {
        api.merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
    } else {
        api
    };

    let frontend = ServeDir::new(config.working_directory.join("public"));

    Router::new()
        .nest("/api", api)
        .fallback_service(frontend)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config.web.frontend))
}

/// Build a CORS layer allowing the configured frontend origin
///
/// Credentials are allowed, so methods and headers are listed explicitly.
fn build_cors_layer(frontend: &str) -> CorsLayer {
    let allowed: Vec<HeaderValue> = frontend.parse().ok().into_iter().collect();
    if allowed.is_empty() {
        tracing::warn!(frontend, "Frontend origin is not a valid header value, CORS disabled");
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Start the API server on the configured address.
///
/// Serves plain HTTP, or HTTPS with the configured PEM files when
/// `web.ssl.enabled` is set. Returns once `shutdown` resolves and the server
/// has stopped.
///
/// # Example
///
/// ```no_run
/// use pack_builder::{Config, PackBuilder};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let builder = Arc::new(PackBuilder::new((*config).clone()).await?);
///
/// pack_builder::api::start_api_server(builder, config, async {
///     tokio::signal::ctrl_c().await.ok();
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    builder: Arc<PackBuilder>,
    config: Arc<Config>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let address = config.web.listen_address();

    tracing::info!(
        address = %address,
        public_url = %config.web.public_url(),
        tls = config.web.ssl.enabled,
        "Starting API server"
    );

    let app = create_router(builder, config.clone());

    if config.web.ssl.enabled {
        let tls = RustlsConfig::from_pem_file(&config.web.ssl.cert_path, &config.web.ssl.key_path)
            .await
            .map_err(|e| Error::Config {
                message: format!("failed to load TLS certificate or key: {e}"),
                key: Some("web.ssl".to_string()),
            })?;

        let socket_address = tokio::net::lookup_host(&address)
            .await?
            .next()
            .ok_or_else(|| Error::Config {
                message: format!("listen address '{address}' did not resolve"),
                key: Some("web.address".to_string()),
            })?;

        let handle = axum_server::Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown.await;
                handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
            }
        });

        tracing::info!(address = %socket_address, "API server listening (TLS)");

        axum_server::bind_rustls(socket_address, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .map_err(|e| Error::ApiServerError(e.to_string()))?;
    } else {
        let listener = TcpListener::bind(&address).await.map_err(Error::Io)?;

        tracing::info!(address = %address, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::ApiServerError(e.to_string()))?;
    }

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
