// Service configuration
//
// Loaded once at startup from an optional JSON file, then overridden by CLI
// flags / environment variables. Nothing here is read from globals later.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

const CONFIG_DIR_NAME: &str = "clipfetch";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug)]
pub enum ConfigError {
    Read(PathBuf, std::io::Error),
    Parse(PathBuf, serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(path, e) => write!(f, "Failed to read config {}: {}", path.display(), e),
            Self::Parse(path, e) => write!(f, "Invalid config {}: {}", path.display(), e),
            Self::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// What the emitter does with a resolved remote link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// Return the link as JSON; the client fetches it
    #[default]
    Redirect,
    /// Fetch the bytes behind the link and send them as an attachment
    Proxy,
}

impl std::str::FromStr for LinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redirect" => Ok(Self::Redirect),
            "proxy" => Ok(Self::Proxy),
            other => Err(format!("unknown link mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// One remote API that resolves a media URL to a direct link.
///
/// `url` and string values inside `body` are templates: `{url}`, `{id}`,
/// `{format}`, `{mode}` and `{audio_only}` are substituted per request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteEndpoint {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON pointer to the direct link, e.g. `/url`
    #[serde(default = "default_link_field")]
    pub link_field: String,
    /// JSON pointer to a title, if the API returns one
    #[serde(default)]
    pub title_field: Option<String>,
    /// Overrides `remote_timeout_ms` for this endpoint
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_link_field() -> String {
    "/url".to_string()
}

impl RemoteEndpoint {
    pub fn get(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            method: HttpMethod::Get,
            body: None,
            headers: BTreeMap::new(),
            link_field: default_link_field(),
            title_field: None,
            timeout_ms: None,
        }
    }

    /// JSON POST endpoint
    pub fn post(name: &str, url: &str, body: Value) -> Self {
        let mut endpoint = Self::get(name, url);
        endpoint.method = HttpMethod::Post;
        endpoint.body = Some(body);
        endpoint
            .headers
            .insert("Accept".to_string(), "application/json".to_string());
        endpoint
    }

    pub fn with_link_field(mut self, pointer: &str) -> Self {
        self.link_field = pointer.to_string();
        self
    }

    pub fn with_title_field(mut self, pointer: &str) -> Self {
        self.title_field = Some(pointer.to_string());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// One entry of the ordered strategy chain
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyDescriptor {
    LocalTool,
    RemoteApi {
        #[serde(default = "default_remote_name")]
        name: String,
        endpoints: Vec<RemoteEndpoint>,
    },
}

fn default_remote_name() -> String {
    "remote-api".to_string()
}

/// External downloader invocation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Program to run; discovered on the system when unset
    pub program: Option<String>,
    /// Arguments placed before all others, e.g. `["-m", "yt_dlp"]` for python3
    pub prefix_args: Vec<String>,
    /// ffmpeg binary reported by `/check-tools`
    pub ffmpeg_program: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: None,
            prefix_args: Vec::new(),
            ffmpeg_program: "ffmpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Wall-clock limit for one downloader invocation
    pub tool_timeout_ms: u64,
    /// Default limit for one remote API call
    pub remote_timeout_ms: u64,
    /// Parent directory for per-request workspaces
    pub temp_root: PathBuf,
    /// Served for unmatched routes when the directory exists
    pub static_dir: Option<PathBuf>,
    /// SOCKS5/HTTP proxy for the downloader and remote calls
    pub proxy: Option<String>,
    pub link_mode: LinkMode,
    pub tool: ToolConfig,
    pub strategies: Vec<StrategyDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            tool_timeout_ms: 300_000,
            remote_timeout_ms: 15_000,
            temp_root: std::env::temp_dir().join("clipfetch"),
            static_dir: Some(PathBuf::from("public")),
            proxy: None,
            link_mode: LinkMode::Redirect,
            tool: ToolConfig::default(),
            strategies: default_strategies(),
        }
    }
}

/// Local tool first, then the bundled remote resolvers
pub fn default_strategies() -> Vec<StrategyDescriptor> {
    let cobalt = RemoteEndpoint::post(
        "cobalt",
        "https://api.cobalt.tools/",
        json!({
            "url": "{url}",
            "downloadMode": "{mode}",
            "audioFormat": "mp3",
            "videoQuality": "720",
        }),
    )
    .with_title_field("/filename");

    let wuk = RemoteEndpoint::post(
        "wuk",
        "https://co.wuk.sh/api/json",
        json!({ "url": "{url}", "isAudioOnly": "{audio_only}" }),
    );

    vec![
        StrategyDescriptor::LocalTool,
        StrategyDescriptor::RemoteApi {
            name: default_remote_name(),
            endpoints: vec![cobalt, wuk],
        },
    ]
}

impl Config {
    /// Load from `path`, or from `<config_dir>/clipfetch/config.json` if that
    /// exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => dirs::config_dir()
                .map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
                .filter(|p| p.is_file()),
        };

        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::Read(path.clone(), e))?;
                let config = Self::from_json(&raw).map_err(|e| ConfigError::Parse(path.clone(), e))?;
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tool_timeout_ms == 0 || self.remote_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".to_string()));
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::Invalid("at least one strategy is required".to_string()));
        }
        for descriptor in &self.strategies {
            if let StrategyDescriptor::RemoteApi { name, endpoints } = descriptor {
                if endpoints.is_empty() {
                    return Err(ConfigError::Invalid(format!("{} has no endpoints", name)));
                }
            }
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_tool_timeout_ms(mut self, ms: u64) -> Self {
        self.tool_timeout_ms = ms;
        self
    }

    pub fn with_remote_timeout_ms(mut self, ms: u64) -> Self {
        self.remote_timeout_ms = ms;
        self
    }

    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = root.into();
        self
    }

    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_link_mode(mut self, mode: LinkMode) -> Self {
        self.link_mode = mode;
        self
    }

    pub fn with_tool(mut self, tool: ToolConfig) -> Self {
        self.tool = tool;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<StrategyDescriptor>) -> Self {
        self.strategies = strategies;
        self
    }
}
