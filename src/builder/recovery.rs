//! Recovery snapshot of the session registry.
//!
//! The whole registry is written to `<working-directory>/recover.json` after
//! every stage and websocket command, and read back on startup. Paths are not
//! stored; they are derived again from each session id.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::session::{Session, SessionHandle};
use crate::types::{SessionId, Status};

use super::{PackBuilder, PublishedPackage};

/// File name of the snapshot inside the working directory
pub const SNAPSHOT_FILE: &str = "recover.json";

impl PackBuilder {
    /// Location of the recovery snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.config.working_directory.join(SNAPSHOT_FILE)
    }

    /// Write the snapshot, logging instead of failing
    pub async fn save_snapshot(&self) {
        if let Err(e) = self.write_snapshot().await {
            tracing::warn!(
                path = %self.snapshot_path().display(),
                error = %e,
                "Failed to save recovery snapshot"
            );
        }
    }

    async fn write_snapshot(&self) -> Result<()> {
        let _guard = self.snapshot_lock.lock().await;

        let sessions: BTreeMap<SessionId, Session> = self
            .list_sessions()
            .await
            .into_iter()
            .map(|session| (session.id, session))
            .collect();
        let data = serde_json::to_vec_pretty(&sessions)?;

        // atomic replace
        let path = self.snapshot_path();
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(sessions = sessions.len(), path = %path.display(), "Recovery snapshot saved");
        Ok(())
    }

    /// Load sessions from the snapshot, returning how many were restored
    ///
    /// A missing snapshot restores nothing. Published packages are registered
    /// again so their download links keep working.
    pub async fn restore_snapshot(&self) -> Result<usize> {
        let path = self.snapshot_path();
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let stored: BTreeMap<SessionId, Session> = serde_json::from_slice(&data)?;
        let base = self.working_directory().to_path_buf();

        let mut sessions = self.sessions.write().await;
        let mut downloads = self.downloads.write().await;
        let mut restored = 0;

        for (id, mut session) in stored {
            if session.overall_state.deleted {
                continue;
            }
            session.id = id;
            session.attach(&base);

            for (package_id, package) in &session.packages {
                if package.downloadable && package.status == Status::Success {
                    downloads.insert(
                        *package_id,
                        PublishedPackage {
                            session_id: id,
                            name: package.name.clone(),
                            path: package.path.clone(),
                        },
                    );
                }
            }

            sessions.insert(id, Arc::new(SessionHandle::new(session)));
            restored += 1;
        }

        tracing::info!(sessions = restored, path = %path.display(), "Sessions restored");
        Ok(restored)
    }
}
