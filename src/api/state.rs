//! Application state for the API server

use crate::{Config, PackBuilder};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The pack builder owning every session
    pub builder: Arc<PackBuilder>,

    /// Configuration (frontend origin, swagger toggle)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(builder: Arc<PackBuilder>, config: Arc<Config>) -> Self {
        Self { builder, config }
    }
}
