//! Error types for pack-builder
//!
//! This module provides the error handling for the library:
//! - The crate-wide [`Error`] used at stage boundaries and by the API surface
//! - [`ProviderError`] for a single provider probe (always recovered locally)
//! - [`JarError`] for a single candidate download (recorded on the link)
//! - [`StageError`] for session lifecycle preconditions
//! - HTTP status code mapping and the JSON error body returned by the API

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for pack-builder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pack-builder
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "web.port")
        key: Option<String>,
    },

    /// The request body was rejected
    #[error("{message}")]
    InvalidRequest {
        /// Summary of what is wrong with the request
        message: String,
        /// Per-link problems, empty when the request shape itself is wrong
        issues: Vec<LinkIssue>,
    },

    /// A lifecycle precondition was not met
    #[error("{0}")]
    Stage(#[from] StageError),

    /// Session or package not found
    #[error("{0} not found")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parse error (config file, plugin manifests)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Zip archive error
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// One problem with one link of a creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LinkIssue {
    /// The caller-assigned link id as sent
    pub id: String,
    /// What is wrong with it
    pub message: String,
}

impl LinkIssue {
    /// Create a new issue for a link id
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

/// Session lifecycle precondition failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// The session was never initialized
    #[error("the session has not been initialized yet")]
    NotInitialized,

    /// Download/process requested before the preliminary stage finished
    #[error("preliminary checks have not been run for the session")]
    PreliminaryNotRun,

    /// Packaging requested before downloads and post-processing finished
    #[error("the session has not been processed yet")]
    ProcessNotRun,

    /// Another stage is still running for this session
    #[error("another stage is already running for the session")]
    StageRunning,

    /// The session has been deleted
    #[error("the session has been deleted")]
    Deleted,

    /// The link id is not part of the session
    #[error("link {0} not found")]
    LinkNotFound(uuid::Uuid),

    /// The link has no such download candidate
    #[error("link {link_id} has no candidate {url}")]
    CandidateNotFound {
        /// Link being toggled
        link_id: uuid::Uuid,
        /// Candidate URL that was not offered
        url: String,
    },

    /// The package id is not part of the session
    #[error("package not found")]
    PackageNotFound,

    /// Only successful packages can be published
    #[error("package is not complete")]
    PackageIncomplete,
}

/// Failure of one provider probe
///
/// The `Display` text is what gets recorded in a preliminary result's failed attempts.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider does not recognise the link format
    #[error("unable to parse {0} from link")]
    Unrecognized(&'static str),

    /// The upstream API answered with a non-success status
    #[error("failed to get resource, status code: {status}")]
    Api {
        /// HTTP status returned by the upstream API
        status: u16,
    },

    /// Nothing matched the lookup
    #[error("{0}")]
    NotFound(String),

    /// The link does not point at a JAR
    #[error("link does not point to a valid JAR file")]
    NotAJar,

    /// Transport or decoding failure
    #[error("{0}")]
    Network(#[from] reqwest::Error),
}

/// Failure of one candidate download
///
/// The `Display` text becomes the download record's message.
#[derive(Debug, Error)]
pub enum JarError {
    /// The request could not be completed
    #[error("error downloading: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("error downloading: status code {0}")]
    Status(u16),

    /// Writing the body to disk failed
    #[error("error writing to file {path}: {source}")]
    Write {
        /// Target file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The file could not be inspected after download
    #[error("unable to check file: {0}")]
    Inspect(std::io::Error),

    /// Zero-byte body
    #[error("file is empty")]
    Empty,

    /// The first four bytes are not a zip local file header
    #[error("not a valid JAR file, magic bytes: {0:02x?}")]
    BadMagic(Vec<u8>),
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "invalid_request",
///     "message": "invalid links",
///     "details": [{"id": "abc", "message": "invalid ID"}]
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "invalid_request")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context, such as the per-link issue list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - invalid input or unmet precondition
            Error::Config { .. } => 400,
            Error::InvalidRequest { .. } => 400,
            Error::Stage(StageError::StageRunning) => 409,
            Error::Stage(StageError::Deleted) => 404,
            Error::Stage(StageError::LinkNotFound(_)) => 404,
            Error::Stage(StageError::PackageNotFound) => 404,
            Error::Stage(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 502 Bad Gateway - upstream failures
            Error::Network(_) => 502,

            // 500 Internal Server Error
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::Yaml(_) => 500,
            Error::Zip(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidRequest { .. } => "invalid_request",
            Error::Stage(e) => match e {
                StageError::NotInitialized => "not_initialized",
                StageError::PreliminaryNotRun => "preliminary_not_run",
                StageError::ProcessNotRun => "process_not_run",
                StageError::StageRunning => "stage_running",
                StageError::Deleted => "session_deleted",
                StageError::LinkNotFound(_) => "link_not_found",
                StageError::CandidateNotFound { .. } => "candidate_not_found",
                StageError::PackageNotFound => "package_not_found",
                StageError::PackageIncomplete => "package_incomplete",
            },
            Error::NotFound(_) => "not_found",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Yaml(_) => "yaml_error",
            Error::Zip(_) => "zip_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::InvalidRequest { issues, .. } if !issues.is_empty() => {
                serde_json::to_value(issues).ok()
            }
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            Error::Stage(StageError::LinkNotFound(id)) => {
                Some(serde_json::json!({ "link_id": id }))
            }
            Error::Stage(StageError::CandidateNotFound { link_id, url }) => {
                Some(serde_json::json!({ "link_id": link_id, "url": url }))
            }
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
