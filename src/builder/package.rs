//! Package stage: zip the downloads directory.

use std::collections::BTreeMap;

use crate::events::ServerEvent;
use crate::packager;
use crate::session::SessionHandle;
use crate::types::{Mode, Package, PackageCategory, Stage, Status};

use super::PackBuilder;

impl PackBuilder {
    /// Zip the session's downloads into `pack.zip`
    ///
    /// Replaces any earlier package with a single new one. A zip failure is
    /// recorded on the package rather than aborting the stage.
    pub(crate) async fn run_package(&self, handle: &SessionHandle) {
        let session_id = handle.id();
        handle.emit(ServerEvent::PackageStart);

        let (mode, output, downloads_directory) = handle
            .read(|session| {
                (
                    session.request.mode(),
                    session.package_path(),
                    session.downloads_directory.clone(),
                )
            })
            .await;

        let (name, category) = match mode {
            Mode::Plugins => ("Plugin Pack", PackageCategory::Server),
            Mode::Mods => ("Mod Pack", PackageCategory::Client),
        };

        let mut package = Package {
            downloadable: false,
            status: Status::Success,
            message: String::new(),
            name: name.to_string(),
            category,
            path: output.clone(),
            size: 0,
        };

        match packager::package_folder(&output, &downloads_directory).await {
            Ok(zipped) => package.size = zipped.size,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Packaging failed");
                package.status = Status::Error;
                package.message = e.to_string();
            }
        }

        let finished = handle
            .update(|session| {
                session.packages = BTreeMap::from([(uuid::Uuid::new_v4(), package)]);
                session
                    .overall_state
                    .advance(Stage::Packaged)
                    .map(|_| session.clone())
            })
            .await
            .and_then(|advanced| advanced);

        match finished {
            Ok(session) => {
                self.downloads
                    .write()
                    .await
                    .retain(|_, published| published.session_id != session_id);
                tracing::info!(session_id = %session_id, "Package stage complete");
                handle.emit(ServerEvent::PackageDone(Box::new(session)));
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Package stage aborted");
            }
        }
    }
}
