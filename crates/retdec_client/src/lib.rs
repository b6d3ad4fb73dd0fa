//! # Retdec Client
//!
//! An async HTTP client for the retdec decompilation service.
//!
//! Submits [`JobDescriptor`]s, polls the status of the resulting decompilation until it
//! finishes and streams the outputs to a [`ResultConsumer`]. The pipeline either runs on
//! the caller's task ([`RetdecClient::decompile`]) or in the background
//! ([`RetdecClient::spawn`]).
//!
//! ## Example: Decompiling a binary
//!
//! ```no_run
//!  use retdec_client::RetdecClient;
//!  use retdec_core::prelude::*;
//!
//!  struct Print;
//!
//!  impl ResultConsumer for Print {
//!     fn set_id(&mut self, id: &str) {
//!         println!("decompilation {id}");
//!     }
//!
//!     fn accept_output(&mut self, kind: OutputKind, _name: Option<&str>) -> bool {
//!         kind == OutputKind::Hll
//!     }
//!
//!     async fn consume_output(&mut self, output: OutputStream) -> Result<(), BoxError> {
//!         let source = output.bytes().await?;
//!         println!("{}", String::from_utf8_lossy(&source));
//!         Ok(())
//!     }
//!
//!     fn failed(&mut self, error: &DecompilationError) {
//!         eprintln!("{error}");
//!     }
//!  }
//!
//!  async fn run() -> retdec_client::Result<()> {
//!     let client = RetdecClient::new(DEFAULT_BASE_URL, Some("my-api-key".into()))?;
//!     let handle = client.submit(&JobDescriptor::bin(InputFile::from_path("a.out"))).await?;
//!
//!     let task = client.spawn(handle, Print);
//!     task.join().await?;
//!     Ok(())
//! }
//! ```

mod fetcher;
mod poller;
mod task;

pub use task::DecompilationTask;

use retdec_core::prelude::{routes::*, *};

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

pub use retdec_core::error::DecompilationError;

pub type Result<T> = std::result::Result<T, DecompilationError>;

const OCTET_STREAM: &str = "application/octet-stream";

/// Settings of a [`RetdecClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root of the service API, e.g. `https://retdec.com/service/api`.
    pub base_url: String,
    /// Sent as the user name of HTTP basic auth.
    pub api_key: Option<String>,
    /// Time between two status requests.
    pub poll_interval: Duration,
    /// Timeout of a single HTTP request. [`None`] waits forever.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RetdecClient {
    /// Always ends with a `/` so relative routes join below it.
    base_url: Url,
    client: Client,
    api_key: Option<String>,
    poll_interval: Duration,
}

impl RetdecClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        Self::with_config(ClientConfig {
            base_url: base_url.into(),
            api_key,
            ..Default::default()
        })
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut base = config.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| DecompilationError::InvalidLink(format!("{base}: {e}")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(DecompilationError::transport)?;

        Ok(Self {
            base_url,
            client,
            api_key: config.api_key,
            poll_interval: config.poll_interval,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The handle of an earlier decompilation, rebuilt from its id.
    pub fn resume(&self, id: &str) -> JobHandle {
        JobHandle::resume(self.base_url.as_str(), id)
    }

    fn auth_request(&self, builder: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.api_key {
            builder.basic_auth(key, None::<&str>)
        } else {
            builder
        }
    }

    /// Resolves a link advertised by the service. Absolute links are kept as they are.
    fn resolve(&self, link: &str) -> Result<Url> {
        self.base_url
            .join(link)
            .map_err(|e| DecompilationError::InvalidLink(format!("{link}: {e}")))
    }

    /// Submits a decompilation and returns its handle.
    ///
    /// A rejected request fails with [`DecompilationError::Rejected`]; nothing is polled.
    pub async fn submit(&self, job: &JobDescriptor) -> Result<JobHandle> {
        let url = self.resolve(DECOMPILATIONS)?;
        let form = build_form(job).await?;

        let response = self
            .auth_request(self.client.post(url))
            .multipart(form)
            .send()
            .await
            .map_err(DecompilationError::transport)?;

        let status = response.status();
        let text = response.text().await.map_err(DecompilationError::transport)?;

        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            let error = serde_json::from_str::<ServiceError>(&text).unwrap_or(ServiceError {
                message: text,
                ..Default::default()
            });
            return Err(DecompilationError::Rejected {
                status: status.as_u16(),
                error,
            });
        }

        if !status.is_success() {
            return Err(DecompilationError::UnexpectedStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        let handle: JobHandle = bind(&text)?;
        tracing::info!(job = %handle.id(), mode = %job.mode.mode(), "Decompilation submitted");
        Ok(handle)
    }

    /// Calls the echo endpoint, which returns the passed parameters.
    /// Useful to check connectivity and the API key.
    pub async fn echo(&self, args: &[(&str, &str)]) -> Result<BTreeMap<String, String>> {
        let url = self.resolve(TEST_ECHO)?;
        let response = self
            .auth_request(self.client.get(url))
            .query(args)
            .send()
            .await
            .map_err(DecompilationError::transport)?;

        read_json(response).await
    }

    /// Fetches and parses a JSON resource. Anything but **HTTP 200** is a binding error.
    async fn get_json<T: DeserializeOwned>(&self, link: &str) -> Result<T> {
        let url = self.resolve(link)?;
        let response = self
            .auth_request(self.client.get(url))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(DecompilationError::transport)?;

        read_json(response).await
    }

    /// Starts the download of an output.
    async fn download(&self, link: &str) -> Result<Response> {
        let url = self.resolve(link)?;
        let response = self
            .auth_request(self.client.get(url))
            .send()
            .await
            .map_err(DecompilationError::transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DecompilationError::UnexpectedStatus { status, body });
        }

        Ok(response)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await.map_err(DecompilationError::transport)?;
    if status != StatusCode::OK {
        return Err(DecompilationError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }
    bind(&body)
}

fn bind<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| DecompilationError::binding(e.to_string(), body))
}

async fn build_form(job: &JobDescriptor) -> Result<Form> {
    let mut form = Form::new();
    for field in job.form_fields() {
        form = match field.value {
            FormValue::File(file) => {
                let data = match file.source {
                    InputSource::Path(path) => Bytes::from(tokio::fs::read(&path).await?),
                    InputSource::Bytes(data) => data,
                };
                let part = Part::bytes(data.to_vec())
                    .file_name(file.file_name)
                    .mime_str(OCTET_STREAM)
                    .map_err(DecompilationError::transport)?;
                form.part(field.name, part)
            }
            FormValue::Text(text) => form.text(field.name, text),
            value => form.text(field.name, value.as_text().unwrap_or_default().to_string()),
        };
    }
    Ok(form)
}

/// Runs `fut` unless `cancel` trips first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(DecompilationError::Cancelled),
        res = fut => res,
    }
}
