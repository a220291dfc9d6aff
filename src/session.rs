//! Sessions and their per-session synchronisation
//!
//! A [`Session`] is the serialisable record of one pack build. A
//! [`SessionHandle`] wraps it with everything needed to drive it concurrently:
//! - one mutex around the record, so every mutation sees a consistent state
//! - a stage lock, held by a running stage so a second one is refused
//! - a broadcast channel feeding websocket subscribers
//! - a cancellation token fired on delete

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::error::{Result, StageError};
use crate::events::ServerEvent;
use crate::types::{
    LinkId, LinkState, OverallState, Package, PackageId, Request, SessionId, Stage,
};
use crate::utils;

/// Events buffered per session before slow subscribers start lagging
const EVENT_BUFFER: usize = 256;

/// How long a delete waits for a cancelled stage to drop its in-flight work
const STAGE_RELEASE_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the directory holding downloaded JARs
pub const DOWNLOADS_DIR: &str = "downloads";

/// Name of the archive produced by the package stage
pub const PACKAGE_FILE: &str = "pack.zip";

/// One pack build
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    /// Session id, also the name of its working directory
    #[schema(value_type = String)]
    pub id: SessionId,

    /// `<working-directory>/<id>`
    #[serde(skip)]
    pub working_directory: PathBuf,

    /// `<working-directory>/<id>/downloads`
    #[serde(skip)]
    pub downloads_directory: PathBuf,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Packages produced so far
    #[schema(value_type = Object)]
    pub packages: BTreeMap<PackageId, Package>,

    /// The request that created the session
    pub request: Request,

    /// Stage completion flags
    pub overall_state: OverallState,

    /// Per-link state
    #[schema(value_type = Object)]
    pub links: BTreeMap<LinkId, LinkState>,
}

impl Session {
    /// A new, uninitialised session rooted under `base`
    pub fn new(base: &Path, request: Request) -> Self {
        let mut session = Self {
            id: uuid::Uuid::new_v4(),
            working_directory: PathBuf::new(),
            downloads_directory: PathBuf::new(),
            created_at: Utc::now(),
            packages: BTreeMap::new(),
            request,
            overall_state: OverallState::default(),
            links: BTreeMap::new(),
        };
        session.attach(base);
        session
    }

    /// Derive the on-disk paths from the session id
    ///
    /// Used after deserialising a snapshot, where paths are not stored.
    pub fn attach(&mut self, base: &Path) {
        self.working_directory = base.join(self.id.to_string());
        self.downloads_directory = self.working_directory.join(DOWNLOADS_DIR);
        let package_path = self.package_path();
        for package in self.packages.values_mut() {
            package.path = package_path.clone();
        }
    }

    /// Where the package stage writes its archive
    pub fn package_path(&self) -> PathBuf {
        self.working_directory.join(PACKAGE_FILE)
    }

    /// Create the directories and register one fresh link state per request link
    ///
    /// Running it again replaces every link state.
    pub async fn initialize(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(&self.downloads_directory).await?;

        self.links = self
            .request
            .parsed_links()
            .into_iter()
            .map(|(id, link)| (id, LinkState::new(id, link)))
            .collect();
        self.overall_state.advance(Stage::Initialized)?;
        Ok(())
    }
}

/// Shared, lockable handle to a live session
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    session: Mutex<Session>,
    stage_lock: Arc<Mutex<()>>,
    events: broadcast::Sender<ServerEvent>,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Wrap a session
    pub fn new(session: Session) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_BUFFER);
        Self {
            id: session.id,
            session: Mutex::new(session),
            stage_lock: Arc::new(Mutex::new(())),
            events,
            cancel: CancellationToken::new(),
        }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// A copy of the current record
    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    /// Run `f` against the record under the session lock
    pub async fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let session = self.session.lock().await;
        f(&session)
    }

    /// Mutate the record under the session lock
    ///
    /// Fails with [`StageError::Deleted`] once the session is deleted, so
    /// in-flight work stops writing into a removed session.
    pub async fn update<R>(
        &self,
        f: impl FnOnce(&mut Session) -> R,
    ) -> std::result::Result<R, StageError> {
        let mut session = self.session.lock().await;
        if session.overall_state.deleted {
            return Err(StageError::Deleted);
        }
        Ok(f(&mut session))
    }

    /// Subscribe to the session's events
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Broadcast an event to current subscribers
    ///
    /// Nothing is sent after the session has been deleted.
    pub fn emit(&self, event: ServerEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        // no receivers is fine
        self.events.send(event).ok();
    }

    /// Claim the stage lock for `stage`
    ///
    /// Fails when the session is deleted, when another stage holds the lock,
    /// or when the previous stage has not completed. The guard must be held
    /// for the whole run.
    pub async fn begin_stage(
        &self,
        stage: Stage,
    ) -> std::result::Result<OwnedMutexGuard<()>, StageError> {
        if self.cancel.is_cancelled() {
            return Err(StageError::Deleted);
        }

        let guard = self
            .stage_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| StageError::StageRunning)?;

        self.session
            .lock()
            .await
            .overall_state
            .require_ready_for(stage)?;

        Ok(guard)
    }

    /// Token cancelled when the session is deleted
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the session has been deleted
    pub fn is_deleted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Delete the session: cancel running work, remove its directory and
    /// broadcast `deleted`
    ///
    /// The directory is removed only after a running stage has released the
    /// stage lock, so none of its writes outlive the removal.
    ///
    /// Returns `false` when the session was already deleted; a repeated
    /// delete does nothing.
    pub async fn delete(&self) -> bool {
        let working_directory = {
            let mut session = self.session.lock().await;
            if session.overall_state.deleted {
                return false;
            }
            // Deleted has no predecessor, so this cannot fail
            session.overall_state.advance(Stage::Deleted).ok();
            session.working_directory.clone()
        };

        self.cancel.cancel();

        // a cancelled stage releases the lock once its downloads are dropped
        let stage = tokio::time::timeout(STAGE_RELEASE_TIMEOUT, self.stage_lock.lock())
            .await
            .ok();
        if stage.is_none() {
            tracing::warn!(session_id = %self.id, "Cancelled stage did not stop in time");
        }

        let mut removed = utils::remove_dir_if_exists(&working_directory).await;
        if removed.is_err() {
            // a late write can land mid-walk
            removed = utils::remove_dir_if_exists(&working_directory).await;
        }
        drop(stage);

        if let Err(e) = removed {
            tracing::warn!(
                session_id = %self.id,
                path = %working_directory.display(),
                error = %e,
                "Failed to remove session directory"
            );
        }

        tracing::info!(session_id = %self.id, "Session deleted");
        self.events.send(ServerEvent::Deleted).ok();
        true
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use tempfile::TempDir;

    const LINK_A: &str = "0d8f3a7e-9d1e-4c5b-8a57-3f0f3c3e2a11";

    fn request() -> Request {
        serde_json::from_str(&format!(
            r#"{{"platform": "spigot", "game_version": "1.20.4", "links": {{"{LINK_A}": "https://spigotmc.org/resources/x.1"}}}}"#
        ))
        .unwrap()
    }

    async fn initialized(base: &Path) -> SessionHandle {
        let mut session = Session::new(base, request());
        session.initialize().await.unwrap();
        SessionHandle::new(session)
    }

    #[tokio::test]
    async fn test_initialize_creates_layout_and_links() {
        let temp_dir = TempDir::new().unwrap();
        let mut session = Session::new(temp_dir.path(), request());
        session.initialize().await.unwrap();

        assert!(session.downloads_directory.is_dir());
        assert_eq!(
            session.downloads_directory,
            temp_dir.path().join(session.id.to_string()).join("downloads")
        );
        assert!(session.overall_state.initialized);
        assert_eq!(session.links.len(), 1);
        let link = session.links.values().next().unwrap();
        assert_eq!(link.id.to_string(), LINK_A);
        assert!(link.preliminary.is_none());
    }

    #[tokio::test]
    async fn test_serialized_session_omits_paths() {
        let temp_dir = TempDir::new().unwrap();
        let handle = initialized(temp_dir.path()).await;
        let json = serde_json::to_value(handle.snapshot().await).unwrap();

        assert!(json.get("working_directory").is_none());
        assert!(json.get("downloads_directory").is_none());
        assert_eq!(json["overall_state"]["initialized"], true);
        assert_eq!(json["overall_state"]["package"], false);
        assert_eq!(json["request"]["platform"], "spigot");

        let mut restored: Session = serde_json::from_value(json).unwrap();
        restored.attach(temp_dir.path());
        assert_eq!(restored.request.platform, Platform::Spigot);
        assert_eq!(
            restored.package_path(),
            temp_dir.path().join(restored.id.to_string()).join("pack.zip")
        );
    }

    #[tokio::test]
    async fn test_begin_stage_checks_order_and_exclusivity() {
        let temp_dir = TempDir::new().unwrap();
        let handle = initialized(temp_dir.path()).await;

        assert_eq!(
            handle.begin_stage(Stage::Download).await.unwrap_err(),
            StageError::PreliminaryNotRun
        );

        let guard = handle.begin_stage(Stage::Preliminary).await.unwrap();
        assert_eq!(
            handle.begin_stage(Stage::Preliminary).await.unwrap_err(),
            StageError::StageRunning
        );
        drop(guard);

        handle.begin_stage(Stage::Preliminary).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_last() {
        let temp_dir = TempDir::new().unwrap();
        let handle = initialized(temp_dir.path()).await;
        let working_directory = handle.read(|s| s.working_directory.clone()).await;
        let mut events = handle.subscribe();

        assert!(handle.delete().await);
        assert!(!working_directory.exists());
        assert!(handle.is_deleted());
        assert!(handle.cancellation().is_cancelled());

        assert!(!handle.delete().await);
        handle.emit(ServerEvent::ProcessStart);

        assert!(matches!(events.recv().await.unwrap(), ServerEvent::Deleted));
        assert!(events.try_recv().is_err());

        assert_eq!(
            handle.update(|_| ()).await.unwrap_err(),
            StageError::Deleted
        );
        assert_eq!(
            handle.begin_stage(Stage::Preliminary).await.unwrap_err(),
            StageError::Deleted
        );
        assert!(handle.snapshot().await.overall_state.deleted);
    }

    #[tokio::test]
    async fn test_delete_waits_for_the_running_stage() {
        let temp_dir = TempDir::new().unwrap();
        let handle = initialized(temp_dir.path()).await;
        let (working_directory, downloads_directory) = handle
            .read(|s| (s.working_directory.clone(), s.downloads_directory.clone()))
            .await;

        let guard = handle.begin_stage(Stage::Preliminary).await.unwrap();
        let cancel = handle.cancellation();
        let stage = tokio::spawn(async move {
            cancel.cancelled().await;
            // an in-flight download finishing its write after the cancel
            tokio::time::sleep(Duration::from_millis(50)).await;
            tokio::fs::write(downloads_directory.join("late.jar"), b"PK")
                .await
                .unwrap();
            drop(guard);
        });

        assert!(handle.delete().await);
        stage.await.unwrap();
        assert!(!working_directory.exists());
    }
}
