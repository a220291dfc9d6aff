//! Process stage: download every link in batches, then check dependencies.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::path::Path;

use crate::events::ServerEvent;
use crate::session::SessionHandle;
use crate::types::{Download, LinkId, Mode, Stage};
use crate::utils;

use super::{PackBuilder, STAGE_CONCURRENCY};

/// One link's download, as decided at batch dispatch
#[derive(Debug, Clone)]
struct DownloadJob {
    link_id: LinkId,
    /// Enabled candidates; `None` when the link did not resolve
    candidates: Option<Vec<String>>,
    file_name: String,
}

impl PackBuilder {
    /// Download every link, then run the dependency engine in plugins mode
    ///
    /// Links go in batches of five; the next batch is dispatched once the
    /// previous one has fully finished. Candidate toggles are read when a
    /// batch is dispatched.
    pub(crate) async fn run_process(&self, handle: &SessionHandle) {
        let session_id = handle.id();
        handle.emit(ServerEvent::ProcessStart);

        let (link_ids, downloads_directory, mode) = handle
            .read(|session| {
                (
                    session.links.keys().copied().collect::<Vec<_>>(),
                    session.downloads_directory.clone(),
                    session.request.mode(),
                )
            })
            .await;

        let cancel = handle.cancellation();
        for batch in link_ids.chunks(STAGE_CONCURRENCY) {
            let jobs = handle.read(|session| dispatch(session, batch)).await;

            let mut in_flight: FuturesUnordered<_> = jobs
                .into_iter()
                .map(|job| self.download_link(job, &downloads_directory))
                .collect();

            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!(session_id = %session_id, "Process stage cancelled");
                        return;
                    }
                    next = in_flight.next() => next,
                };
                let Some((link_id, download)) = next else {
                    break;
                };

                let updated = handle
                    .update(|session| {
                        session.links.get_mut(&link_id).map(|state| {
                            state.download = Some(download);
                            state.clone()
                        })
                    })
                    .await;

                match updated {
                    Ok(Some(state)) => handle.emit(ServerEvent::ProcessStep(Box::new(state))),
                    Ok(None) => {}
                    Err(_) => return,
                }
            }
        }

        if let Err(e) = handle
            .update(|session| session.overall_state.advance(Stage::Download))
            .await
            .and_then(|advanced| advanced)
        {
            tracing::warn!(session_id = %session_id, error = %e, "Process stage aborted");
            return;
        }
        tracing::info!(session_id = %session_id, "Downloads complete");

        if mode == Mode::Plugins && !self.check_dependencies(handle).await {
            return;
        }

        let finished = handle
            .update(|session| {
                session
                    .overall_state
                    .advance(Stage::PostProcessing)
                    .map(|_| session.clone())
            })
            .await
            .and_then(|advanced| advanced);

        match finished {
            Ok(session) => {
                tracing::info!(session_id = %session_id, "Process stage complete");
                handle.emit(ServerEvent::ProcessDone(Box::new(session)));
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Process stage aborted");
            }
        }
    }

    async fn download_link(&self, job: DownloadJob, directory: &Path) -> (LinkId, Download) {
        let download = match job.candidates {
            None => Download::error("no download link from previous stage"),
            Some(candidates) => {
                self.jars
                    .download_first(&candidates, directory, &job.file_name)
                    .await
            }
        };

        if !download.is_success() {
            tracing::warn!(
                link_id = %job.link_id,
                message = %download.message,
                "Link download failed"
            );
        }
        (job.link_id, download)
    }
}

/// Snapshot the jobs of one batch
fn dispatch(session: &crate::session::Session, batch: &[LinkId]) -> Vec<DownloadJob> {
    batch
        .iter()
        .filter_map(|link_id| session.links.get(link_id))
        .map(|state| {
            let resolved = state.preliminary.as_ref().filter(|p| p.is_success());
            DownloadJob {
                link_id: state.id,
                candidates: resolved.map(|p| p.enabled_links()),
                file_name: jar_file_name(resolved.and_then(|p| p.file_stem()), state.id),
            }
        })
        .collect()
}

/// `<name>.jar`, falling back to the link id when no name is known
pub(crate) fn jar_file_name(name: Option<&str>, fallback: LinkId) -> String {
    let stem = match name {
        Some(name) if !name.trim().is_empty() => utils::sanitize_file_name(name),
        _ => fallback.to_string(),
    };
    format!("{stem}.jar")
}
