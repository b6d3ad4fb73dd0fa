use crate::error::*;
use crate::status::*;

use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt};

/// A downloaded decompilation output, handed to [`ResultConsumer::consume_output`].
pub struct OutputStream {
    pub kind: OutputKind,
    /// Key of the entry inside a nested output (e.g. the function of a control-flow graph).
    pub name: Option<String>,
    /// File name suggested by the service, if any.
    pub file_name: Option<String>,
    pub media_type: String,
    pub body: BoxStream<'static, std::io::Result<Bytes>>,
}

impl OutputStream {
    /// Drains the body into memory.
    pub async fn bytes(mut self) -> std::io::Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .finish_non_exhaustive()
    }
}

/// A trait for receiving the progress and outputs of a decompilation.
///
/// Calls happen in three stages:
/// 1. **Init**: [`set_id`](Self::set_id), then [`started`](Self::started).
/// 2. **Working**: [`set_status`](Self::set_status) once per poll,
///    [`phase_change`](Self::phase_change) once per newly seen phase, and for every
///    available output [`accept_output`](Self::accept_output) followed by
///    [`consume_output`](Self::consume_output) if it was accepted.
/// 3. **Closing**: exactly one of [`finished`](Self::finished) or [`failed`](Self::failed).
///
/// Calls for one job never overlap, but may come from a thread other than the
/// one that created the job.
pub trait ResultConsumer: Send {
    /// Sets the id of the decompilation.
    fn set_id(&mut self, id: &str);

    /// Called after `set_id`, when polling starts.
    fn started(&mut self) {}

    /// Receives every polled status.
    fn set_status(&mut self, _status: &StatusSnapshot) {}

    /// Informs about a phase not reported before.
    fn phase_change(&mut self, _phase: &Phase) {}

    /// Decides whether an available output is downloaded.
    ///
    /// `name` is the key inside a nested output, [`None`] for single outputs.
    fn accept_output(&mut self, kind: OutputKind, name: Option<&str>) -> bool;

    /// Consumes an accepted output. The stream should be drained before returning.
    fn consume_output(
        &mut self,
        output: OutputStream,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Called when the decompilation and all downloads completed.
    fn finished(&mut self) {}

    /// Called when the decompilation could not be followed to the end.
    fn failed(&mut self, error: &DecompilationError);
}
