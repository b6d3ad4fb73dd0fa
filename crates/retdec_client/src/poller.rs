use crate::{RetdecClient, Result, cancellable};
use retdec_core::prelude::*;

use std::collections::HashSet;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Remembers the phases already reported for one job.
#[derive(Debug, Default)]
pub(crate) struct PhaseTracker {
    reported: HashSet<Phase>,
    completion: u8,
}

impl PhaseTracker {
    /// Returns the phases of `snapshot` that were not reported before, in snapshot order.
    pub(crate) fn observe<'a>(&mut self, snapshot: &'a StatusSnapshot) -> Vec<&'a Phase> {
        if snapshot.completion < self.completion {
            tracing::warn!(
                job = %snapshot.id,
                previous = self.completion,
                completion = snapshot.completion,
                "Completion went backwards"
            );
        }
        self.completion = self.completion.max(snapshot.completion);

        snapshot
            .phases
            .iter()
            .filter(|&phase| self.reported.insert(phase.clone()))
            .collect()
    }
}

impl RetdecClient {
    /// Polls the status of `handle` until it is finished and returns the terminal snapshot.
    ///
    /// Errors are never retried.
    pub(crate) async fn poll_until_finished<R: ResultConsumer>(
        &self,
        handle: &JobHandle,
        consumer: &mut R,
        cancel: &CancellationToken,
        state: &watch::Sender<JobState>,
    ) -> Result<StatusSnapshot> {
        consumer.started();
        state.send_replace(JobState::Polling);

        let status_url = handle.status_url()?;
        let mut tracker = PhaseTracker::default();

        loop {
            let snapshot: StatusSnapshot = cancellable(cancel, self.get_json(status_url)).await?;
            tracing::debug!(
                job = %handle.id(),
                completion = snapshot.completion,
                finished = snapshot.finished,
                "Status polled"
            );

            consumer.set_status(&snapshot);
            for phase in tracker.observe(&snapshot) {
                consumer.phase_change(phase);
            }

            if snapshot.is_terminal() {
                tracing::info!(
                    job = %handle.id(),
                    succeeded = snapshot.succeeded,
                    failed = snapshot.failed,
                    "Decompilation finished"
                );
                return Ok(snapshot);
            }

            cancellable(cancel, async {
                tokio::time::sleep(self.poll_interval).await;
                Ok(())
            })
            .await?;
        }
    }
}
