//! In-process stand-in for the decompilation service.

#![allow(dead_code)]

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, OnceLock};

/// A multipart field as received by the stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Text(String),
    File { file_name: String, data: Vec<u8> },
}

pub struct Stub {
    base: OnceLock<String>,
    submit: (StatusCode, Value),
    submit_text: Option<(StatusCode, String)>,
    statuses: Mutex<VecDeque<Value>>,
    status_error: Option<StatusCode>,
    outputs: Value,
    pub fields: Mutex<Vec<(String, Received)>>,
    pub hits: Mutex<Vec<String>>,
}

impl Stub {
    pub fn new() -> Self {
        Self {
            base: OnceLock::new(),
            submit: (
                StatusCode::CREATED,
                json!({
                    "id": "job1",
                    "links": {
                        "decompilation": "{base}/decompiler/decompilations/job1",
                        "status": "{base}/decompiler/decompilations/job1/status",
                        "outputs": "{base}/decompiler/decompilations/job1/outputs"
                    }
                }),
            ),
            submit_text: None,
            statuses: Mutex::new(VecDeque::new()),
            status_error: None,
            outputs: json!({ "links": {} }),
            fields: Mutex::new(Vec::new()),
            hits: Mutex::new(Vec::new()),
        }
    }

    pub fn submit_response(mut self, status: StatusCode, body: Value) -> Self {
        self.submit = (status, body);
        self
    }

    /// Answers the submission with a plain text body.
    pub fn submit_text(mut self, status: StatusCode, body: &str) -> Self {
        self.submit_text = Some((status, body.to_string()));
        self
    }

    /// Statuses are served in order; the last one repeats.
    pub fn statuses(self, statuses: Vec<Value>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn status_error(mut self, status: StatusCode) -> Self {
        self.status_error = Some(status);
        self
    }

    /// `{base}` inside links is replaced by the stub's base URL.
    pub fn outputs(mut self, links: Value) -> Self {
        self.outputs = json!({ "links": links });
        self
    }

    pub async fn serve(self) -> (String, Arc<Stub>) {
        let stub = Arc::new(self);
        let app = Router::new()
            .route("/api/decompiler/decompilations", post(submit))
            .route("/api/decompiler/decompilations/{id}/status", get(status))
            .route("/api/decompiler/decompilations/{id}/outputs", get(outputs))
            .route("/api/files/{name}", get(file))
            .route("/api/test/echo", get(echo))
            .with_state(stub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/api", listener.local_addr().unwrap());
        stub.base.set(base.clone()).unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (base, stub)
    }

    pub fn hits(&self, fragment: &str) -> usize {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.contains(fragment))
            .count()
    }

    pub fn field(&self, name: &str) -> Option<Received> {
        self.fields
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn expand(&self, value: &Value) -> Value {
        let base = self.base.get().cloned().unwrap_or_default();
        serde_json::from_str(&value.to_string().replace("{base}", &base)).unwrap()
    }

    fn hit(&self, path: String) {
        self.hits.lock().unwrap().push(path);
    }
}

async fn submit(State(stub): State<Arc<Stub>>, mut multipart: Multipart) -> Response {
    stub.hit("submit".into());
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let received = match field.file_name().map(str::to_string) {
            Some(file_name) => Received::File {
                file_name,
                data: field.bytes().await.unwrap().to_vec(),
            },
            None => Received::Text(field.text().await.unwrap()),
        };
        stub.fields.lock().unwrap().push((name, received));
    }

    if let Some((status, text)) = &stub.submit_text {
        return (*status, text.clone()).into_response();
    }
    let (status, body) = &stub.submit;
    (*status, Json(stub.expand(body))).into_response()
}

async fn status(State(stub): State<Arc<Stub>>, Path(id): Path<String>) -> impl IntoResponse {
    stub.hit(format!("status/{id}"));
    if let Some(code) = stub.status_error {
        return (code, Json(json!({ "code": code.as_u16(), "message": "broken" })));
    }

    let mut statuses = stub.statuses.lock().unwrap();
    let next = if statuses.len() > 1 {
        statuses.pop_front()
    } else {
        statuses.front().cloned()
    };
    (StatusCode::OK, Json(next.unwrap_or_else(|| json!({ "id": id }))))
}

async fn outputs(State(stub): State<Arc<Stub>>, Path(id): Path<String>) -> impl IntoResponse {
    stub.hit(format!("outputs/{id}"));
    Json(stub.expand(&stub.outputs))
}

async fn file(State(stub): State<Arc<Stub>>, Path(name): Path<String>) -> impl IntoResponse {
    stub.hit(format!("files/{name}"));
    (
        [
            (header::CONTENT_TYPE, "text/plain".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{name}\""),
            ),
        ],
        format!("content of {name}"),
    )
}

async fn echo(Query(params): Query<BTreeMap<String, String>>) -> Json<BTreeMap<String, String>> {
    Json(params)
}

/// A status body with one phase per name.
pub fn snapshot(finished: bool, phases: &[&str]) -> Value {
    let phases: Vec<Value> = phases
        .iter()
        .enumerate()
        .map(|(i, name)| {
            json!({
                "part": "Decompiler",
                "name": name,
                "description": name,
                "completion": i * 10,
                "warnings": []
            })
        })
        .collect();
    let completion = if finished { 100 } else { phases.len() * 10 };

    json!({
        "id": "job1",
        "pending": false,
        "running": !finished,
        "finished": finished,
        "succeeded": finished,
        "failed": false,
        "completion": completion,
        "phases": phases
    })
}
