//! # Retdec FileSystem Output
//!
//! A [`ResultConsumer`] that saves decompilation outputs into a directory.
//!
//! Progress is printed to stderr. Outputs are stored under the file name suggested by the
//! service, falling back to `<id>.<kind>` when none is given.
//!
//! ## Features
//!
//! * **Atomic Writes**: Streams into a temporary file and renames it, so an output is never read partially.
//!
//! ## Usage
//!
//! ```no_run
//! use retdec_fs::FileSaveConsumer;
//! use retdec_core::status::OutputKind;
//!
//! let consumer = FileSaveConsumer::new("./out").with_kinds([OutputKind::Hll, OutputKind::Dsm]);
//! ```

use retdec_core::prelude::*;

use futures::StreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

async fn atomic_write(path: &Path, output: OutputStream) -> std::io::Result<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = path.with_extension("tmp");
    match write_and_rename(&tmp_path, path, output).await {
        Ok(written) => Ok(written),
        Err(e) => {
            let _ = fs::remove_file(&tmp_path).await;
            Err(e)
        }
    }
}

async fn write_and_rename(tmp_path: &Path, path: &Path, output: OutputStream) -> std::io::Result<u64> {
    let mut file = fs::File::create(tmp_path).await?;
    let mut body = output.body;
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(tmp_path, path).await?;
    Ok(written)
}

/// Keeps only the last path component of a suggested name.
fn sanitize(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "..")
}

#[derive(Debug)]
pub struct FileSaveConsumer {
    root: PathBuf,
    kinds: Option<HashSet<OutputKind>>,
    id: Option<String>,
    status: Option<StatusSnapshot>,
    saved: Vec<PathBuf>,
    error: Option<String>,
    finished: bool,
}

impl FileSaveConsumer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            root: path.into(),
            kinds: None,
            id: None,
            status: None,
            saved: Vec::new(),
            error: None,
            finished: false,
        }
    }

    /// Only accept the given output kinds.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = OutputKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The last polled status.
    pub fn status(&self) -> Option<&StatusSnapshot> {
        self.status.as_ref()
    }

    /// Paths of all outputs saved so far.
    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }

    /// Message of the failure the consumer was closed with.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn get_path(&self, output: &OutputStream) -> PathBuf {
        let name = output
            .file_name
            .as_deref()
            .and_then(sanitize)
            .unwrap_or_else(|| {
                let id = self.id.as_deref().unwrap_or("decompilation");
                match output.name.as_deref().and_then(sanitize) {
                    Some(name) => format!("{id}.{}.{name}", output.kind),
                    None => format!("{id}.{}", output.kind),
                }
            });
        self.root.join(name)
    }
}

impl ResultConsumer for FileSaveConsumer {
    fn set_id(&mut self, id: &str) {
        self.id = Some(id.to_string());
    }

    fn started(&mut self) {
        eprintln!(
            "Started decompilation with unique identifier {}",
            self.id.as_deref().unwrap_or_default()
        );
    }

    fn set_status(&mut self, status: &StatusSnapshot) {
        self.status = Some(status.clone());
    }

    fn phase_change(&mut self, phase: &Phase) {
        let mut line = format!("[{:3}] {}", phase.completion, phase.name);
        if phase.name != phase.description {
            line.push(' ');
            line.push_str(&phase.description);
        }
        if !phase.warnings.is_empty() {
            line.push_str(" ! warnings");
        }
        eprintln!("{line}");
    }

    fn accept_output(&mut self, kind: OutputKind, _name: Option<&str>) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }

    async fn consume_output(&mut self, output: OutputStream) -> Result<(), BoxError> {
        let path = self.get_path(&output);
        eprintln!("Consuming {}", path.display());

        let size = atomic_write(&path, output).await?;
        tracing::debug!(path = %path.display(), size, "Output saved");
        self.saved.push(path);
        Ok(())
    }

    fn finished(&mut self) {
        self.finished = true;
        eprintln!("Decompilation finished.");
    }

    fn failed(&mut self, error: &DecompilationError) {
        self.error = Some(error.to_string());
        eprintln!("Decompilation failed: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    fn output(file_name: Option<&str>, name: Option<&str>, chunks: &[&'static [u8]]) -> OutputStream {
        OutputStream {
            kind: OutputKind::Cfgs,
            name: name.map(str::to_string),
            file_name: file_name.map(str::to_string),
            media_type: "image/svg+xml".into(),
            body: stream::iter(
                chunks
                    .iter()
                    .map(|c| Ok::<_, std::io::Error>(Bytes::from_static(*c)))
                    .collect::<Vec<_>>(),
            )
            .boxed(),
        }
    }

    #[tokio::test]
    async fn saves_under_suggested_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut consumer = FileSaveConsumer::new(dir.path());
        consumer.set_id("job1");

        consumer
            .consume_output(output(Some("cfg_main.svg"), Some("main"), &[b"<svg", b"/>"]))
            .await
            .unwrap();

        let path = dir.path().join("cfg_main.svg");
        assert_eq!(consumer.saved(), &[path.clone()]);
        assert_eq!(std::fs::read(&path).unwrap(), b"<svg/>");
        assert!(!dir.path().join("cfg_main.tmp").exists());
    }

    #[tokio::test]
    async fn falls_back_to_id_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        let mut consumer = FileSaveConsumer::new(dir.path());
        consumer.set_id("job1");

        consumer
            .consume_output(output(None, Some("main"), &[b"x"]))
            .await
            .unwrap();
        consumer
            .consume_output(output(Some("../../etc/passwd"), None, &[b"y"]))
            .await
            .unwrap();

        assert!(dir.path().join("job1.cfgs.main").exists());
        assert!(dir.path().join("passwd").exists());
    }

    #[tokio::test]
    async fn broken_stream_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut consumer = FileSaveConsumer::new(dir.path());

        let broken = OutputStream {
            body: stream::iter(vec![
                Ok(Bytes::from_static(b"partial")),
                Err(std::io::Error::other("connection reset")),
            ])
            .boxed(),
            ..output(Some("test.c"), None, &[])
        };

        assert!(consumer.consume_output(broken).await.is_err());
        assert!(consumer.saved().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_rename_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let occupied = dir.path().join("test.c");
        std::fs::create_dir(&occupied).unwrap();
        std::fs::write(occupied.join("keep"), b"x").unwrap();

        let mut consumer = FileSaveConsumer::new(dir.path());
        let result = consumer
            .consume_output(output(Some("test.c"), None, &[b"int main;"]))
            .await;

        assert!(result.is_err());
        assert!(consumer.saved().is_empty());
        assert!(!dir.path().join("test.tmp").exists());
        assert!(occupied.join("keep").exists());
    }

    #[test]
    fn accepts_selected_kinds() {
        let mut all = FileSaveConsumer::new("out");
        assert!(all.accept_output(OutputKind::Archive, None));

        let mut some = FileSaveConsumer::new("out").with_kinds([OutputKind::Hll]);
        assert!(some.accept_output(OutputKind::Hll, None));
        assert!(!some.accept_output(OutputKind::Dsm, None));
    }

    #[test]
    fn closing_is_recorded() {
        let mut consumer = FileSaveConsumer::new("out");
        consumer.failed(&DecompilationError::Cancelled);
        assert_eq!(consumer.error(), Some("Decompilation cancelled"));
        assert!(!consumer.is_finished());
    }
}
