use crate::{RetdecClient, Result, cancellable};
use retdec_core::prelude::*;

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A decompilation followed on a background task.
///
/// Returned by [`RetdecClient::spawn`]. Every failure inside the task is delivered to the
/// consumer's [`failed`](ResultConsumer::failed) callback; [`join`](Self::join) hands the
/// consumer back once its closing call happened.
#[derive(Debug)]
pub struct DecompilationTask<R> {
    id: String,
    cancel: CancellationToken,
    state: watch::Receiver<JobState>,
    join: JoinHandle<R>,
}

impl<R> DecompilationTask<R> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The latest known state of the decompilation.
    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Requests cancellation. The consumer receives [`DecompilationError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits until the state changes and returns the new state.
    /// Returns [`None`] once the task is gone.
    pub async fn changed(&mut self) -> Option<JobState> {
        self.state.changed().await.ok()?;
        Some(*self.state.borrow_and_update())
    }

    /// Waits for the task and returns the consumer.
    pub async fn join(self) -> Result<R> {
        self.join
            .await
            .map_err(|e| DecompilationError::Panicked(e.to_string()))
    }
}

impl RetdecClient {
    /// Follows a submitted decompilation on the current task.
    ///
    /// The consumer is closed with either `finished` or `failed`; in the latter case the
    /// error is also returned.
    pub async fn decompile<R: ResultConsumer>(
        &self,
        handle: &JobHandle,
        consumer: &mut R,
        cancel: &CancellationToken,
    ) -> Result<JobState> {
        let (state, _) = watch::channel(JobState::Submitted);
        self.drive(handle, consumer, cancel, &state).await
    }

    /// Submits `job` and follows it on the current task.
    ///
    /// A failed submission is returned without calling the consumer.
    pub async fn submit_and_decompile<R: ResultConsumer>(
        &self,
        job: &JobDescriptor,
        consumer: &mut R,
        cancel: &CancellationToken,
    ) -> Result<JobState> {
        let handle = cancellable(cancel, self.submit(job)).await?;
        self.decompile(&handle, consumer, cancel).await
    }

    /// Follows a submitted decompilation on a new background task.
    pub fn spawn<R: ResultConsumer + 'static>(
        &self,
        handle: JobHandle,
        consumer: R,
    ) -> DecompilationTask<R> {
        self.spawn_with_token(handle, consumer, CancellationToken::new())
    }

    pub fn spawn_with_token<R: ResultConsumer + 'static>(
        &self,
        handle: JobHandle,
        mut consumer: R,
        cancel: CancellationToken,
    ) -> DecompilationTask<R> {
        let (state_tx, state_rx) = watch::channel(JobState::Submitted);
        let client = self.clone();
        let id = handle.id().to_string();
        let task_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            // The error already went to `failed`.
            let _ = client
                .drive(&handle, &mut consumer, &task_cancel, &state_tx)
                .await;
            consumer
        });

        DecompilationTask {
            id,
            cancel,
            state: state_rx,
            join,
        }
    }

    async fn drive<R: ResultConsumer>(
        &self,
        handle: &JobHandle,
        consumer: &mut R,
        cancel: &CancellationToken,
        state: &watch::Sender<JobState>,
    ) -> Result<JobState> {
        consumer.set_id(handle.id());

        let outcome = AssertUnwindSafe(self.run_pipeline(handle, consumer, cancel, state))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(DecompilationError::Panicked(panic_message(&*panic))));

        match outcome {
            Ok(terminal) => {
                consumer.finished();
                state.send_replace(terminal);
                Ok(terminal)
            }
            Err(e) => {
                tracing::warn!(job = %handle.id(), error = %e, "Decompilation failed");
                state.send_replace(if e.is_cancelled() {
                    JobState::Cancelled
                } else {
                    JobState::Failed
                });
                consumer.failed(&e);
                Err(e)
            }
        }
    }

    async fn run_pipeline<R: ResultConsumer>(
        &self,
        handle: &JobHandle,
        consumer: &mut R,
        cancel: &CancellationToken,
        state: &watch::Sender<JobState>,
    ) -> Result<JobState> {
        let terminal = self
            .poll_until_finished(handle, consumer, cancel, state)
            .await?;

        // Outputs are offered even when the service reports a failure.
        if terminal.failed {
            tracing::warn!(
                job = %handle.id(),
                error = terminal.error.as_deref().unwrap_or_default(),
                "Decompilation failed on the service, fetching outputs anyway"
            );
        }

        self.fetch_outputs(handle, &terminal, consumer, cancel)
            .await?;

        Ok(terminal.state())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
