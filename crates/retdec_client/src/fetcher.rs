use crate::{OCTET_STREAM, RetdecClient, Result, cancellable};
use retdec_core::prelude::*;

use futures::StreamExt;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;

impl RetdecClient {
    /// Offers every advertised output of a finished decompilation to `consumer`.
    pub(crate) async fn fetch_outputs<R: ResultConsumer>(
        &self,
        handle: &JobHandle,
        terminal: &StatusSnapshot,
        consumer: &mut R,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let outputs: OutputsResponse =
            cancellable(cancel, self.get_json(handle.outputs_url()?)).await?;

        for (key, link) in &outputs.links {
            let Some(kind) = OutputKind::from_token(key) else {
                tracing::warn!(job = %handle.id(), output = %key, "Skipping unknown output");
                continue;
            };

            // The service advertises a call graph link even when none was generated.
            if kind == OutputKind::Cg && !terminal.has_call_graph() {
                tracing::debug!(job = %handle.id(), "Skipping call graph without status metadata");
                continue;
            }

            match link {
                OutputLink::Single(url) => {
                    self.deliver(kind, None, url, consumer, cancel).await?;
                }
                OutputLink::Nested(entries) => {
                    for (name, url) in entries {
                        self.deliver(kind, Some(name.as_str()), url, consumer, cancel).await?;
                    }
                }
            }
        }

        Ok(())
    }

    async fn deliver<R: ResultConsumer>(
        &self,
        kind: OutputKind,
        name: Option<&str>,
        link: &str,
        consumer: &mut R,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !consumer.accept_output(kind, name) {
            tracing::debug!(output = %kind, name = ?name, "Output declined");
            return Ok(());
        }

        let response = cancellable(cancel, self.download(link)).await?;
        let headers = response.headers();
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(suggested_file_name);
        let media_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(OCTET_STREAM)
            .to_string();

        tracing::debug!(output = %kind, name = ?name, file_name = ?file_name, media_type = %media_type, "Consuming output");

        let output = OutputStream {
            kind,
            name: name.map(str::to_string),
            file_name,
            media_type,
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map_err(std::io::Error::other))
                .boxed(),
        };

        cancellable(cancel, async {
            consumer
                .consume_output(output)
                .await
                .map_err(DecompilationError::Consumer)
        })
        .await
    }
}

/// Extracts the file name of a `Content-Disposition` header.
///
/// An RFC 6266 `filename*` takes precedence over a plain `filename`.
pub(crate) fn suggested_file_name(header: &str) -> Option<String> {
    let mut plain = None;
    for (key, value) in disposition_params(header) {
        if key.eq_ignore_ascii_case("filename*") {
            if let Some(name) = decode_extended(&value) {
                return Some(name);
            }
        } else if key.eq_ignore_ascii_case("filename") && plain.is_none() {
            plain = Some(value);
        }
    }
    plain.filter(|name| !name.is_empty())
}

/// Splits the parameters following the disposition type.
/// Quoted values may contain `;` and backslash escapes.
fn disposition_params(header: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = header.chars().peekable();
    while chars.next_if(|&c| c != ';').is_some() {}

    while chars.next().is_some() {
        let mut key = String::new();
        while let Some(c) = chars.next_if(|&c| c != '=' && c != ';') {
            key.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => value.extend(chars.next()),
                    '"' => break,
                    c => value.push(c),
                }
            }
            while chars.next_if(|&c| c != ';').is_some() {}
        } else {
            while let Some(c) = chars.next_if(|&c| c != ';') {
                value.push(c);
            }
            value.truncate(value.trim_end().len());
        }

        params.push((key.trim().to_string(), value));
    }

    params
}

/// Decodes an RFC 5987 `charset'language'value`. Charsets other than UTF-8 are read as Latin-1.
fn decode_extended(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let bytes = urlencoding::decode_binary(parts.next()?.as_bytes());

    let name = if charset.eq_ignore_ascii_case("utf-8") {
        String::from_utf8(bytes.into_owned()).ok()?
    } else {
        bytes.iter().copied().map(char::from).collect()
    };
    (!name.is_empty()).then_some(name)
}
