//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`sessions`] — Session lifecycle, stage triggers, toggles and downloads
//! - [`socket`] — Per-session websocket
//! - [`system`] — Support info and OpenAPI

use serde::{Deserialize, Serialize};

use crate::types::SessionId;

mod sessions;
mod socket;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use sessions::*;
pub use socket::*;
pub use system::*;

// ============================================================================
// Request/Response Types (shared across handlers)
// ============================================================================

/// Response of POST /sessions
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreatedSession {
    /// Id of the new session
    #[schema(value_type = String)]
    pub id: SessionId,
}

/// Request body for PATCH /sessions/:id/links/:link_id
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ToggleRequest {
    /// Candidate URL
    #[serde(alias = "Link")]
    pub link: String,
    /// Use the candidate or not
    #[serde(alias = "Value")]
    pub value: bool,
}
