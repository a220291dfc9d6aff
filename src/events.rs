//! Websocket event framing
//!
//! Every frame is plain text: an event name, optionally followed by a single
//! space and a JSON payload. Server events flow through each session's
//! broadcast channel; client commands are parsed from incoming frames.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::Session;
use crate::types::{LinkId, LinkState};

/// Events pushed to websocket subscribers
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Sent once to a socket right after it connects
    Connected,
    /// Preliminary stage started
    PreliminaryStart,
    /// One link finished resolving
    PreliminaryStep(Box<LinkState>),
    /// Every link resolved
    PreliminaryDone(Box<Session>),
    /// Download stage started
    ProcessStart,
    /// One link finished downloading or dependency checking
    ProcessStep(Box<LinkState>),
    /// Downloads and dependency checks finished
    ProcessDone(Box<Session>),
    /// Packaging started
    PackageStart,
    /// Packaging finished
    PackageDone(Box<Session>),
    /// Publish request received
    GetDownloadStart,
    /// Package published
    GetDownloadDone(Box<Session>),
    /// Package could not be published
    GetDownloadError(String),
    /// Session deleted; always the last event of a session
    Deleted,
}

/// Payload of `get_download_error`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Failure {
    success: bool,
    message: String,
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected => "connected",
            ServerEvent::PreliminaryStart => "preliminary_start",
            ServerEvent::PreliminaryStep(_) => "preliminary_step",
            ServerEvent::PreliminaryDone(_) => "preliminary_done",
            ServerEvent::ProcessStart => "process_start",
            ServerEvent::ProcessStep(_) => "process_step",
            ServerEvent::ProcessDone(_) => "process_done",
            ServerEvent::PackageStart => "package_start",
            ServerEvent::PackageDone(_) => "package_done",
            ServerEvent::GetDownloadStart => "get_download_start",
            ServerEvent::GetDownloadDone(_) => "get_download_done",
            ServerEvent::GetDownloadError(_) => "get_download_error",
            ServerEvent::Deleted => "deleted",
        }
    }

    /// Whether the session is gone after this event
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerEvent::Deleted)
    }

    /// Encode as a text frame: `name` or `name <json>`
    pub fn to_frame(&self) -> Result<String> {
        let payload = match self {
            ServerEvent::PreliminaryStep(link) | ServerEvent::ProcessStep(link) => {
                Some(serde_json::to_string(link)?)
            }
            ServerEvent::PreliminaryDone(session)
            | ServerEvent::ProcessDone(session)
            | ServerEvent::PackageDone(session)
            | ServerEvent::GetDownloadDone(session) => Some(serde_json::to_string(session)?),
            ServerEvent::GetDownloadError(message) => Some(serde_json::to_string(&Failure {
                success: false,
                message: message.clone(),
            })?),
            _ => None,
        };

        Ok(match payload {
            Some(json) => format!("{} {}", self.name(), json),
            None => self.name().to_string(),
        })
    }
}

/// Payload of the `toggle_link` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToggleLink {
    /// Link whose candidate is toggled
    #[serde(alias = "Id")]
    #[schema(value_type = String)]
    pub id: LinkId,
    /// Candidate URL
    #[serde(alias = "Link")]
    pub link: String,
    /// Use the candidate or not
    #[serde(alias = "Value")]
    pub value: bool,
}

/// Commands a websocket client can send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Run the preliminary stage
    Preliminary,
    /// Run the download and dependency stages
    Process,
    /// Enable or disable one download candidate
    ToggleLink(ToggleLink),
    /// Zip the downloads
    Package,
    /// Publish a package; the payload is the raw package id
    GetDownload(String),
    /// Delete the session
    Delete,
    /// Anything else, by lowercased name
    Unknown(String),
}

impl ClientCommand {
    /// Parse a text frame
    ///
    /// The command name is matched case-insensitively. Only `toggle_link`
    /// can fail, when its payload is not a valid toggle.
    pub fn parse(frame: &str) -> Result<Self> {
        let frame = frame.trim();
        let (name, payload) = match frame.split_once(' ') {
            Some((name, payload)) => (name, payload.trim()),
            None => (frame, ""),
        };

        Ok(match name.to_lowercase().as_str() {
            "preliminary" => ClientCommand::Preliminary,
            "process" => ClientCommand::Process,
            "toggle_link" => ClientCommand::ToggleLink(serde_json::from_str(payload)?),
            "package" => ClientCommand::Package,
            "get_download" => ClientCommand::GetDownload(payload.trim_matches('"').to_string()),
            "delete" => ClientCommand::Delete,
            other => ClientCommand::Unknown(other.to_string()),
        })
    }
}
