//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the pack-builder REST API using
//! utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the pack-builder REST API
///
/// The spec can be accessed via:
/// - `/api/openapi.json` - JSON format OpenAPI specification
/// - `/api/swagger-ui` - Interactive Swagger UI documentation (if enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "pack-builder REST API",
        version = "0.1.0",
        description = "Build Minecraft plugin and mod packs: resolve links, download and verify archives, check dependencies and zip the result",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    paths(
        // Sessions
        crate::api::routes::list_sessions,
        crate::api::routes::create_session,
        crate::api::routes::get_session,
        crate::api::routes::delete_session,
        crate::api::routes::toggle_link,
        crate::api::routes::publish_package,
        crate::api::routes::download_package,
        crate::api::routes::session_socket,

        // Stages
        crate::api::routes::start_preliminary,
        crate::api::routes::start_process,
        crate::api::routes::start_package,

        // System
        crate::api::routes::get_info,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Request and session state
        crate::types::Platform,
        crate::types::Mode,
        crate::types::Status,
        crate::types::ErrorTag,
        crate::types::Stage,
        crate::types::Request,
        crate::types::ProviderKind,
        crate::types::Version,
        crate::types::PluginInfo,
        crate::types::Preliminary,
        crate::types::Download,
        crate::types::Dependency,
        crate::types::PostProcessing,
        crate::types::LinkState,
        crate::types::OverallState,
        crate::types::PackageCategory,
        crate::types::Package,
        crate::types::PlatformInfo,
        crate::types::SupportInfo,
        crate::session::Session,
        crate::events::ToggleLink,

        // API request/response types
        crate::api::routes::CreatedSession,
        crate::api::routes::ToggleRequest,

        // Error types
        crate::error::ApiError,
        crate::error::ErrorDetail,
        crate::error::LinkIssue,
    )),
    tags(
        (name = "sessions", description = "Sessions - Create, inspect and delete sessions, toggle candidates, publish and download packages"),
        (name = "stages", description = "Stages - Trigger link resolution, downloads and packaging"),
        (name = "system", description = "System endpoints - Supported platforms and the OpenAPI spec"),
    )
)]
pub struct ApiDoc;
