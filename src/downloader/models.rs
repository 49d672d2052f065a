// Common data models for the retrieval pipeline

use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::errors::{DownloadError, StrategyFailure};
use super::format_selector::FormatSelector;
use super::workspace::Workspace;

/// One retrieval request, validated and immutable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    source_url: String,
    audio_only: bool,
}

impl RetrievalRequest {
    /// Build a request, rejecting an empty or blank URL
    pub fn new(source_url: &str, audio_only: bool) -> Result<Self, DownloadError> {
        let source_url = source_url.trim();
        if source_url.is_empty() {
            return Err(DownloadError::InvalidInput("URL is required".to_string()));
        }
        Ok(Self {
            source_url: source_url.to_string(),
            audio_only,
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn audio_only(&self) -> bool {
        self.audio_only
    }

    /// Container extension of the emitted file
    pub fn extension(&self) -> &'static str {
        FormatSelector::extension(self.audio_only)
    }
}

/// Inbound body of `POST /download`
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequestBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_mp3: bool,
}

impl DownloadRequestBody {
    pub fn into_request(self) -> Result<RetrievalRequest, DownloadError> {
        RetrievalRequest::new(self.url.as_deref().unwrap_or(""), self.is_mp3)
    }
}

/// A media file left in a workspace by the local tool.
///
/// Holds the workspace so the file outlives the strategy call; dropping or
/// releasing it removes the directory.
#[derive(Debug)]
pub struct ProducedFile {
    pub workspace: Workspace,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub title: Option<String>,
}

/// Result of a single strategy attempt
#[derive(Debug)]
pub enum StrategyOutcome {
    FileProduced(ProducedFile),
    RemoteLink { url: String, title: Option<String> },
    InlineBytes { data: Bytes, title: Option<String> },
    Failed(StrategyFailure),
}

/// Successful pipeline result, tagged with the strategy that produced it
#[derive(Debug)]
pub struct Retrieval {
    pub strategy: String,
    pub outcome: StrategyOutcome,
}

/// Availability of one external binary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolStatus {
    pub available: bool,
    pub version: Option<String>,
}

/// Response body of `GET /check-tools`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsReport {
    pub yt_dlp: bool,
    pub yt_dlp_version: Option<String>,
    pub ffmpeg: bool,
    pub ffmpeg_version: Option<String>,
}

impl ToolsReport {
    pub fn new(yt_dlp: ToolStatus, ffmpeg: ToolStatus) -> Self {
        Self {
            yt_dlp: yt_dlp.available,
            yt_dlp_version: yt_dlp.version,
            ffmpeg: ffmpeg.available,
            ffmpeg_version: ffmpeg.version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_urls_are_rejected() {
        for url in ["", "   "] {
            let err = RetrievalRequest::new(url, false).unwrap_err();
            assert!(matches!(err, DownloadError::InvalidInput(_)));
        }
    }

    #[test]
    fn body_without_url_is_invalid() {
        let body: DownloadRequestBody = serde_json::from_str(r#"{"is_mp3": true}"#).unwrap();
        assert!(body.into_request().is_err());
    }

    #[test]
    fn body_defaults_to_video() {
        let body: DownloadRequestBody =
            serde_json::from_str(r#"{"url": " https://youtu.be/dQw4w9WgXcQ "}"#).unwrap();
        let request = body.into_request().unwrap();
        assert_eq!(request.source_url(), "https://youtu.be/dQw4w9WgXcQ");
        assert!(!request.audio_only());
        assert_eq!(request.extension(), "mp4");
    }

    #[test]
    fn audio_request_uses_mp3() {
        let request = RetrievalRequest::new("https://youtu.be/dQw4w9WgXcQ", true).unwrap();
        assert_eq!(request.extension(), "mp3");
    }
}
