// Response emitter - turns a pipeline result into an HTTP response

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::Stream;
use reqwest::Client;
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::config::LinkMode;
use crate::downloader::errors::DownloadError;
use crate::downloader::models::{ProducedFile, Retrieval, RetrievalRequest, StrategyOutcome};
use crate::downloader::workspace::Workspace;

const DEFAULT_TITLE: &str = "download";

/// Trailing extensions stripped from titles before `.<ext>` is appended
const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mp3", "m4a", "webm", "mkv", "mov", "opus", "ogg", "wav", "flac", "aac",
];

pub struct Emitter {
    client: Client,
    link_mode: LinkMode,
    fetch_timeout: Duration,
}

impl Emitter {
    pub fn new(client: Client, link_mode: LinkMode, fetch_timeout: Duration) -> Self {
        Self {
            client,
            link_mode,
            fetch_timeout,
        }
    }

    pub async fn emit(&self, request: &RetrievalRequest, retrieval: Retrieval) -> Response {
        let Retrieval { strategy, outcome } = retrieval;
        let ext = request.extension();

        match outcome {
            StrategyOutcome::FileProduced(file) => emit_file(file, ext).await,
            StrategyOutcome::InlineBytes { data, title } => {
                let length = data.len() as u64;
                attachment(Body::from(data), Some(length), &filename(title.as_deref(), ext))
            }
            StrategyOutcome::RemoteLink { url, title } => {
                if self.link_mode == LinkMode::Proxy {
                    match self.open_link(&url).await {
                        Ok((body, length)) => {
                            return attachment(body, length, &filename(title.as_deref(), ext))
                        }
                        Err(e) => {
                            tracing::warn!(strategy = %strategy, error = %e, "link proxy failed, returning link");
                        }
                    }
                }
                link_response(&strategy, request, &url, title.as_deref())
            }
            // The executor never hands back a failure as a success
            StrategyOutcome::Failed(failure) => {
                error_response(&DownloadError::AggregateFailure(vec![failure]))
            }
        }
    }

    /// Start fetching the bytes behind a link; the body is relayed as it arrives
    async fn open_link(&self, url: &str) -> Result<(Body, Option<u64>), String> {
        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let length = response.content_length();
        Ok((Body::from_stream(response.bytes_stream()), length))
    }
}

/// Streams an artifact and drops its workspace once the last chunk is read.
///
/// Dropping the stream early (client gone) drops the workspace too.
struct ArtifactStream {
    inner: Option<ReaderStream<tokio::fs::File>>,
    workspace: Option<Workspace>,
    remaining: u64,
}

impl ArtifactStream {
    fn new(file: tokio::fs::File, workspace: Workspace, length: u64) -> Self {
        let mut stream = Self {
            inner: Some(ReaderStream::new(file)),
            workspace: Some(workspace),
            remaining: length,
        };
        if length == 0 {
            stream.finish();
        }
        stream
    }

    fn finish(&mut self) {
        // Close the handle before the directory goes
        self.inner.take();
        self.workspace.take();
    }
}

impl Stream for ArtifactStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.remaining = this.remaining.saturating_sub(chunk.len() as u64);
                if this.remaining == 0 {
                    this.finish();
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(other) => {
                this.finish();
                Poll::Ready(other)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Stream the artifact; the workspace lives exactly as long as the body
async fn emit_file(file: ProducedFile, ext: &str) -> Response {
    let ProducedFile {
        mut workspace,
        path,
        size_bytes,
        title,
    } = file;

    match tokio::fs::File::open(&path).await {
        Ok(handle) => {
            let stream = ArtifactStream::new(handle, workspace, size_bytes);
            attachment(
                Body::from_stream(stream),
                Some(size_bytes),
                &filename(title.as_deref(), ext),
            )
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to open artifact");
            let _ = workspace.release().await;
            error_response(&DownloadError::ArtifactMissing(
                "artifact could not be read".to_string(),
            ))
        }
    }
}

fn attachment(body: Body, length: Option<u64>, filename: &str) -> Response {
    let mut headers = vec![
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (header::CONTENT_DISPOSITION, content_disposition(filename)),
    ];
    if let Some(length) = length {
        headers.push((header::CONTENT_LENGTH, length.to_string()));
    }

    let mut response = body.into_response();
    for (name, value) in headers {
        match value.parse() {
            Ok(value) => {
                response.headers_mut().insert(name, value);
            }
            Err(_) => {
                tracing::warn!(header = %name, "dropping unrepresentable header");
            }
        }
    }
    response
}

fn link_response(strategy: &str, request: &RetrievalRequest, url: &str, title: Option<&str>) -> Response {
    Json(json!({
        "success": true,
        "downloadUrl": url,
        "filename": filename(title, request.extension()),
        "title": title,
        "source": strategy,
        "is_mp3": request.audio_only(),
    }))
    .into_response()
}

/// Client-facing error; internal reasons stay in the logs
pub fn error_response(err: &DownloadError) -> Response {
    match err {
        DownloadError::InvalidInput(msg) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        DownloadError::AggregateFailure(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "All retrieval strategies failed",
                "details": err.client_details(),
            })),
        )
            .into_response(),
        other => {
            tracing::error!(error = %other, "download failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Download failed" })),
            )
                .into_response()
        }
    }
}

/// `<title>.<ext>`, with characters unsafe in a quoted header replaced
pub fn filename(title: Option<&str>, ext: &str) -> String {
    let title = title
        .map(str::trim)
        .map(strip_media_extension)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE);
    let safe: String = title
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}.{}", safe, ext)
}

/// Resolvers often hand back a file name (`clip.mp4`) where a title belongs
fn strip_media_extension(title: &str) -> &str {
    match title.rsplit_once('.') {
        Some((stem, ext))
            if !stem.trim().is_empty()
                && MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) =>
        {
            stem.trim_end()
        }
        _ => title,
    }
}

/// Quoted ASCII filename, plus an RFC 5987 `filename*` when the name is not ASCII
fn content_disposition(filename: &str) -> String {
    if filename.is_ascii() {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}
