//! Session lifecycle control — create, look up, delete, toggle, publish.

use std::sync::Arc;

use crate::error::{Error, Result, StageError};
use crate::events::{ServerEvent, ToggleLink};
use crate::session::{Session, SessionHandle};
use crate::types::{LinkState, PackageId, Request, SessionId, Status};

use super::{PackBuilder, PublishedPackage};

impl PackBuilder {
    /// Validate a request and create an initialized session for it
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequest`] with one issue per bad link when the request
    /// is rejected, or an I/O error when the working directory cannot be created.
    pub async fn create_session(&self, request: Request) -> Result<SessionId> {
        request.validate()?;

        let mut session = Session::new(self.working_directory(), request);
        session.initialize().await?;
        let id = session.id;

        tracing::info!(
            session_id = %id,
            platform = %session.request.platform,
            game_version = %session.request.game_version,
            links = session.links.len(),
            "Session created"
        );

        self.sessions
            .write()
            .await
            .insert(id, Arc::new(SessionHandle::new(session)));
        self.save_snapshot().await;
        Ok(id)
    }

    /// Handle of a live session
    pub async fn session(&self, id: SessionId) -> Result<Arc<SessionHandle>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {id}")))
    }

    /// Current state of a session
    pub async fn get_session(&self, id: SessionId) -> Result<Session> {
        Ok(self.session(id).await?.snapshot().await)
    }

    /// Every live session, oldest first
    pub async fn list_sessions(&self) -> Vec<Session> {
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.read().await.values().cloned().collect();

        let mut sessions = Vec::with_capacity(handles.len());
        for handle in handles {
            sessions.push(handle.snapshot().await);
        }
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    /// Delete a session, its files and its published packages
    ///
    /// Running stages are cancelled. The session is gone from the registry
    /// afterwards, so a second delete reports it as not found.
    pub async fn delete_session(&self, id: SessionId) -> Result<()> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("session {id}")))?;

        handle.delete().await;
        self.downloads
            .write()
            .await
            .retain(|_, published| published.session_id != id);
        self.save_snapshot().await;
        Ok(())
    }

    /// Enable or disable one download candidate of a link
    ///
    /// Valid once the preliminary stage has completed. Only candidates the
    /// resolver offered can be toggled.
    pub async fn toggle_link(&self, id: SessionId, toggle: ToggleLink) -> Result<LinkState> {
        let handle = self.session(id).await?;
        let state = handle
            .update(|session| -> std::result::Result<LinkState, StageError> {
                if !session.overall_state.preliminary {
                    return Err(StageError::PreliminaryNotRun);
                }

                let state = session
                    .links
                    .get_mut(&toggle.id)
                    .ok_or(StageError::LinkNotFound(toggle.id))?;
                let candidate = state
                    .preliminary
                    .as_mut()
                    .and_then(|p| p.links.get_mut(&toggle.link))
                    .ok_or_else(|| StageError::CandidateNotFound {
                        link_id: toggle.id,
                        url: toggle.link.clone(),
                    })?;
                *candidate = toggle.value;
                Ok(state.clone())
            })
            .await??;

        tracing::debug!(
            session_id = %id,
            link_id = %toggle.id,
            url = %toggle.link,
            value = toggle.value,
            "Candidate toggled"
        );
        Ok(state)
    }

    /// Make a package retrievable over HTTP
    ///
    /// Emits `get_download_start`, then `get_download_done` with the session
    /// or `get_download_error` with the reason.
    pub async fn publish_package(&self, id: SessionId, raw_package_id: &str) -> Result<Session> {
        let handle = self.session(id).await?;
        handle.emit(ServerEvent::GetDownloadStart);

        match self.promote(&handle, raw_package_id).await {
            Ok(session) => {
                handle.emit(ServerEvent::GetDownloadDone(Box::new(session.clone())));
                Ok(session)
            }
            Err(e) => {
                handle.emit(ServerEvent::GetDownloadError(e.to_string()));
                Err(e)
            }
        }
    }

    async fn promote(&self, handle: &SessionHandle, raw_package_id: &str) -> Result<Session> {
        let package_id: PackageId = raw_package_id.trim().parse().map_err(|e| {
            Error::InvalidRequest {
                message: format!("invalid package id {raw_package_id:?}: {e}"),
                issues: Vec::new(),
            }
        })?;

        let (published, session) = handle
            .update(|session| -> std::result::Result<_, StageError> {
                let package = session
                    .packages
                    .get_mut(&package_id)
                    .ok_or(StageError::PackageNotFound)?;
                if package.status != Status::Success {
                    return Err(StageError::PackageIncomplete);
                }
                package.downloadable = true;

                let published = PublishedPackage {
                    session_id: session.id,
                    name: package.name.clone(),
                    path: package.path.clone(),
                };
                Ok((published, session.clone()))
            })
            .await??;

        tracing::info!(
            session_id = %session.id,
            package_id = %package_id,
            path = %published.path.display(),
            "Package published"
        );
        self.downloads.write().await.insert(package_id, published);
        Ok(session)
    }

    /// A published package of a session
    pub async fn published_package(
        &self,
        session_id: SessionId,
        package_id: PackageId,
    ) -> Result<PublishedPackage> {
        self.downloads
            .read()
            .await
            .get(&package_id)
            .filter(|published| published.session_id == session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("package {package_id}")))
    }
}
