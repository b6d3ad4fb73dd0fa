use crate::constants::{links, routes};
use crate::error::DecompilationError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The id and follow-up links of a submitted decompilation.
///
/// Handles are immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    id: String,
    links: BTreeMap<String, String>,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, links: BTreeMap<String, String>) -> Self {
        Self {
            id: id.into(),
            links,
        }
    }

    /// Rebuilds the handle of a previously submitted decompilation from its id.
    pub fn resume(base_url: &str, id: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let link = |route: &str| format!("{}/{}", base, route.replace("{id}", id));

        let mut l = BTreeMap::new();
        l.insert(links::DECOMPILATION.to_string(), link(routes::DECOMPILATION_BY_ID));
        l.insert(links::STATUS.to_string(), link(routes::DECOMPILATION_STATUS));
        l.insert(links::OUTPUTS.to_string(), link(routes::DECOMPILATION_OUTPUTS));
        Self::new(id, l)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn links(&self) -> &BTreeMap<String, String> {
        &self.links
    }

    pub fn link(&self, name: &str) -> Result<&str, DecompilationError> {
        self.links.get(name).map(String::as_str).ok_or_else(|| {
            DecompilationError::binding(
                format!("Decompilation {} has no '{}' link", self.id, name),
                format!("{:?}", self.links),
            )
        })
    }

    pub fn status_url(&self) -> Result<&str, DecompilationError> {
        self.link(links::STATUS)
    }

    pub fn outputs_url(&self) -> Result<&str, DecompilationError> {
        self.link(links::OUTPUTS)
    }
}

/// Generation result of an optional artifact (call graph, archive, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactStatus {
    #[serde(default)]
    pub generated: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Call graph metadata. The service reports either one entry or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallGraphStatus {
    Many(Vec<ArtifactStatus>),
    One(ArtifactStatus),
}

impl CallGraphStatus {
    pub fn entries(&self) -> &[ArtifactStatus] {
        match self {
            Self::Many(statuses) => statuses,
            Self::One(status) => std::slice::from_ref(status),
        }
    }
}

/// Reads a percentage, clamping whatever the service sends into `0..=100`.
fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = i64::deserialize(deserializer)?;
    Ok(value.clamp(0, 100) as u8)
}

/// A named unit of progress within a decompilation.
///
/// Two phases are equal only if every field matches; progress reporting
/// deduplicates on this equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phase {
    #[serde(default)]
    pub part: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Completion percentage of the job when this phase was reached.
    #[serde(default, deserialize_with = "percent")]
    pub completion: u8,
    #[serde(default)]
    pub warnings: BTreeSet<String>,
}

/// One polled view of a decompilation.
///
/// `finished` is the only terminal signal; `succeeded` and `failed` are only
/// meaningful once it is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub id: String,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub succeeded: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Overall completion percentage.
    #[serde(default, deserialize_with = "percent")]
    pub completion: u8,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub cg: Option<CallGraphStatus>,
    #[serde(default)]
    pub cfgs: Option<ArtifactStatus>,
    #[serde(default)]
    pub archive: Option<ArtifactStatus>,
}

impl StatusSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.finished
    }

    /// Whether the snapshot carries any call graph metadata.
    pub fn has_call_graph(&self) -> bool {
        self.cg.as_ref().is_some_and(|cg| !cg.entries().is_empty())
    }

    /// The state this snapshot puts the job in.
    pub fn state(&self) -> JobState {
        match (self.finished, self.failed) {
            (false, _) => JobState::Polling,
            (true, true) => JobState::Failed,
            (true, false) => JobState::Succeeded,
        }
    }
}

/// Lifecycle of a decompilation as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Submitted,
    Polling,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

wire_enum! {
    /// Canonical categories of decompilation outputs.
    pub enum OutputKind {
        /// Source code in the high-level language.
        Hll => "hll",
        /// Disassembled input.
        Dsm => "dsm",
        /// Call graph.
        Cg => "cg",
        /// Control-flow graphs, one per function.
        Cfgs => "cfgs",
        /// Archive with all generated outputs.
        Archive => "archive",
        /// The binary compiled from the provided source.
        Binary => "binary",
    }
}

/// Either a single download link or links keyed by name (e.g. per function).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputLink {
    Single(String),
    Nested(BTreeMap<String, String>),
}

/// Body of the outputs endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputsResponse {
    #[serde(default)]
    pub links: BTreeMap<String, OutputLink>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::WireToken;

    #[test]
    fn handle_from_submission_body() {
        let handle: JobHandle = serde_json::from_str(
            r#"{
                "id": "XnRDb0Wj06",
                "links": {
                    "decompilation": "https://retdec.com/service/api/decompiler/decompilations/XnRDb0Wj06",
                    "status": "https://retdec.com/service/api/decompiler/decompilations/XnRDb0Wj06/status",
                    "outputs": "https://retdec.com/service/api/decompiler/decompilations/XnRDb0Wj06/outputs"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(handle.id(), "XnRDb0Wj06");
        assert_eq!(
            handle.status_url().unwrap(),
            "https://retdec.com/service/api/decompiler/decompilations/XnRDb0Wj06/status"
        );
        assert_eq!(
            handle,
            JobHandle::resume("https://retdec.com/service/api/", "XnRDb0Wj06")
        );
    }

    #[test]
    fn missing_link_is_a_binding_error() {
        let handle = JobHandle::new("abc", BTreeMap::new());
        assert!(matches!(
            handle.outputs_url(),
            Err(DecompilationError::Binding { .. })
        ));
    }

    #[test]
    fn phase_equality_includes_warnings() {
        let a = Phase {
            part: Some("Decompiler".into()),
            name: "Decompilation".into(),
            description: "Decompilation".into(),
            completion: 10,
            warnings: BTreeSet::new(),
        };
        let mut b = a.clone();
        assert_eq!(a, b);

        b.warnings.insert("unknown section".into());
        assert_ne!(a, b);

        let mut c = a.clone();
        c.completion = 20;
        assert_ne!(a, c);
    }

    #[test]
    fn snapshot_state() {
        let snapshot: StatusSnapshot = serde_json::from_str(
            r#"{
                "id": "abc",
                "pending": false,
                "running": false,
                "finished": true,
                "succeeded": false,
                "failed": true,
                "error": "Decompilation failed",
                "completion": 100,
                "phases": [
                    {"part": "Decompiler", "name": "Initialization", "description": "Initialization", "completion": 0, "warnings": []}
                ]
            }"#,
        )
        .unwrap();

        assert!(snapshot.is_terminal());
        assert_eq!(snapshot.state(), JobState::Failed);
        assert_eq!(snapshot.phases.len(), 1);
        assert!(snapshot.cg.is_none());

        let running = StatusSnapshot {
            succeeded: true,
            ..Default::default()
        };
        assert_eq!(running.state(), JobState::Polling);
        assert!(!running.state().is_terminal());
    }

    #[test]
    fn call_graph_metadata_in_both_shapes() {
        let single: StatusSnapshot =
            serde_json::from_str(r#"{"id":"x","finished":true,"cg":{"generated":true}}"#).unwrap();
        assert!(single.cg.is_some());
        assert!(single.has_call_graph());

        let list: StatusSnapshot = serde_json::from_str(
            r#"{"id":"x","finished":true,"cg":[{"generated":true},{"generated":false,"error":"timeout"}]}"#,
        )
        .unwrap();
        assert!(list.cg.is_some());
        assert_eq!(list.cg.as_ref().unwrap().entries().len(), 2);
        assert!(list.has_call_graph());

        let empty: StatusSnapshot =
            serde_json::from_str(r#"{"id":"x","finished":true,"cg":[]}"#).unwrap();
        assert!(!empty.has_call_graph());

        let missing: StatusSnapshot = serde_json::from_str(r#"{"id":"x","finished":true}"#).unwrap();
        assert!(!missing.has_call_graph());
    }

    #[test]
    fn out_of_range_completion_is_clamped() {
        let snapshot: StatusSnapshot = serde_json::from_str(
            r#"{"id":"x","completion":-1,"phases":[{"name":"Init","description":"Init","completion":300}]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.completion, 0);
        assert_eq!(snapshot.phases[0].completion, 100);
    }

    #[test]
    fn outputs_single_and_nested() {
        let outputs: OutputsResponse = serde_json::from_str(
            r#"{"links": {
                "hll": "https://example.com/hll",
                "cfgs": {"main": "https://example.com/cfgs/main", "foo": "https://example.com/cfgs/foo"}
            }}"#,
        )
        .unwrap();

        assert_eq!(
            outputs.links["hll"],
            OutputLink::Single("https://example.com/hll".into())
        );
        match &outputs.links["cfgs"] {
            OutputLink::Nested(links) => assert_eq!(links.len(), 2),
            other => panic!("unexpected link {other:?}"),
        }
        assert_eq!(OutputKind::from_token("cfgs"), Some(OutputKind::Cfgs));
    }
}
