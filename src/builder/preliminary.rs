//! Preliminary stage: resolve every link of a session.

use futures::StreamExt;
use futures::stream;

use crate::events::ServerEvent;
use crate::resolver::Lookup;
use crate::session::SessionHandle;
use crate::types::Stage;

use super::{PackBuilder, STAGE_CONCURRENCY};

impl PackBuilder {
    /// Resolve every link, emitting one step per link as it completes
    ///
    /// Steps arrive in completion order. Deleting the session stops the stage
    /// without a `preliminary_done`.
    pub(crate) async fn run_preliminary(&self, handle: &SessionHandle) {
        let session_id = handle.id();
        handle.emit(ServerEvent::PreliminaryStart);

        let (request, links) = handle
            .read(|session| {
                let links: Vec<_> = session
                    .links
                    .values()
                    .map(|state| (state.id, state.link.clone()))
                    .collect();
                (session.request.clone(), links)
            })
            .await;

        let cancel = handle.cancellation();
        let request = &request;
        let mut resolved = stream::iter(links)
            .map(|(link_id, link)| async move {
                let preliminary = self.resolver.resolve(request, &Lookup::link(link)).await;
                (link_id, preliminary)
            })
            .buffer_unordered(STAGE_CONCURRENCY);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(session_id = %session_id, "Preliminary stage cancelled");
                    return;
                }
                next = resolved.next() => next,
            };
            let Some((link_id, preliminary)) = next else {
                break;
            };

            if !preliminary.is_success() {
                tracing::warn!(
                    session_id = %session_id,
                    link_id = %link_id,
                    message = %preliminary.message,
                    "Link could not be resolved"
                );
            }

            let updated = handle
                .update(|session| {
                    session.links.get_mut(&link_id).map(|state| {
                        state.preliminary = Some(preliminary);
                        state.clone()
                    })
                })
                .await;

            match updated {
                Ok(Some(state)) => handle.emit(ServerEvent::PreliminaryStep(Box::new(state))),
                Ok(None) => {}
                Err(_) => return,
            }
        }

        let finished = handle
            .update(|session| {
                session
                    .overall_state
                    .advance(Stage::Preliminary)
                    .map(|_| session.clone())
            })
            .await;

        match finished {
            Ok(Ok(session)) => {
                tracing::info!(session_id = %session_id, "Preliminary stage complete");
                handle.emit(ServerEvent::PreliminaryDone(Box::new(session)));
            }
            Ok(Err(e)) | Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Preliminary stage aborted");
            }
        }
    }
}
