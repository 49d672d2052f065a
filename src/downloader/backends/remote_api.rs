// Remote API strategy - resolves a direct media link through HTTP resolvers
//
// Endpoints are tried in configured order; the first one that answers with a
// usable http(s) link wins. This strategy never downloads the media itself.

use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, Method, Url};
use serde_json::Value;

use crate::config::{HttpMethod, RemoteEndpoint};
use crate::downloader::errors::{DownloadError, StrategyFailure};
use crate::downloader::models::{RetrievalRequest, StrategyOutcome};
use crate::downloader::traits::RetrievalStrategy;

lazy_static! {
    static ref MEDIA_ID_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?:youtube\.com/watch\?(?:.*&)?v=)([A-Za-z0-9_-]{11})").unwrap(),
        Regex::new(r"(?:youtu\.be/)([A-Za-z0-9_-]{11})").unwrap(),
        Regex::new(r"(?:youtube\.com/(?:shorts|embed|live|v)/)([A-Za-z0-9_-]{11})").unwrap(),
        Regex::new(r"(?:vimeo\.com/(?:video/)?)(\d+)").unwrap(),
        Regex::new(r"(?:tiktok\.com/.*/video/)(\d+)").unwrap(),
    ];
}

/// Media identifier embedded in a known source URL
pub fn extract_media_id(url: &str) -> Option<String> {
    MEDIA_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Per-request placeholder values
struct TemplateVars<'a> {
    url: &'a str,
    id: &'a str,
    format: &'static str,
    mode: &'static str,
    audio_only: bool,
}

impl<'a> TemplateVars<'a> {
    fn new(request: &'a RetrievalRequest, id: &'a str) -> Self {
        Self {
            url: request.source_url(),
            id,
            format: request.extension(),
            mode: if request.audio_only() { "audio" } else { "auto" },
            audio_only: request.audio_only(),
        }
    }

    /// `{url}` goes last so a source URL containing braces is never re-expanded
    fn expand(&self, template: &str, encode_url: bool) -> String {
        let url = if encode_url {
            urlencoding::encode(self.url).into_owned()
        } else {
            self.url.to_string()
        };

        template
            .replace("{id}", self.id)
            .replace("{format}", self.format)
            .replace("{mode}", self.mode)
            .replace("{audio_only}", if self.audio_only { "true" } else { "false" })
            .replace("{url}", &url)
    }

    fn expand_body(&self, value: &Value) -> Value {
        match value {
            Value::String(s) if s == "{audio_only}" => Value::Bool(self.audio_only),
            Value::String(s) => Value::String(self.expand(s, false)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.expand_body(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.expand_body(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

pub struct RemoteApiStrategy {
    name: String,
    endpoints: Vec<RemoteEndpoint>,
    client: Client,
    default_timeout: Duration,
}

impl RemoteApiStrategy {
    pub fn new(
        name: impl Into<String>,
        endpoints: Vec<RemoteEndpoint>,
        client: Client,
        default_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            endpoints,
            client,
            default_timeout,
        }
    }

    /// Ask one endpoint for a link
    async fn resolve(
        &self,
        endpoint: &RemoteEndpoint,
        vars: &TemplateVars<'_>,
    ) -> Result<(String, Option<String>), String> {
        let url = vars.expand(&endpoint.url, true);
        let timeout = endpoint
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        let method = match endpoint.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };

        let mut builder = self.client.request(method, &url).timeout(timeout);
        for (key, value) in &endpoint.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &endpoint.body {
            builder = builder.json(&vars.expand_body(body));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                format!("timed out after {}ms", timeout.as_millis())
            } else {
                format!("request failed: {}", e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| format!("invalid JSON: {}", e))?;

        let link = json
            .pointer(&endpoint.link_field)
            .and_then(Value::as_str)
            .ok_or_else(|| format!("no link at {}", endpoint.link_field))?;

        if !is_usable_link(link) {
            return Err(format!("unusable link at {}", endpoint.link_field));
        }

        let title = endpoint
            .title_field
            .as_deref()
            .and_then(|pointer| json.pointer(pointer))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok((link.to_string(), title))
    }
}

fn is_usable_link(link: &str) -> bool {
    Url::parse(link)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

#[async_trait]
impl RetrievalStrategy for RemoteApiStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, request: &RetrievalRequest) -> StrategyOutcome {
        let Some(id) = extract_media_id(request.source_url()) else {
            return StrategyOutcome::Failed(StrategyFailure::from_error(
                self.name(),
                DownloadError::RemoteResolution("no media id in source URL".to_string()),
            ));
        };

        let vars = TemplateVars::new(request, &id);
        let mut errors = Vec::new();

        for endpoint in &self.endpoints {
            match self.resolve(endpoint, &vars).await {
                Ok((url, title)) => {
                    tracing::info!(strategy = %self.name, endpoint = %endpoint.name, "remote link resolved");
                    return StrategyOutcome::RemoteLink { url, title };
                }
                Err(e) => {
                    tracing::warn!(strategy = %self.name, endpoint = %endpoint.name, error = %e, "remote endpoint skipped");
                    errors.push(format!("{}: {}", endpoint.name, e));
                }
            }
        }

        if errors.is_empty() {
            errors.push("no endpoints configured".to_string());
        }

        StrategyOutcome::Failed(StrategyFailure::from_error(
            self.name(),
            DownloadError::RemoteResolution(errors.join("; ")),
        ))
    }
}
