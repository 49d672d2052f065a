use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clipfetch_lib::config::{Config, LinkMode};

/// Media retrieval service: yt-dlp first, remote resolvers as fallback
#[derive(Parser, Debug)]
#[command(name = "clipfetch", version, about)]
struct Cli {
    /// JSON config file (default: <config_dir>/clipfetch/config.json if present)
    #[arg(long, env = "CLIPFETCH_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Limit for one downloader invocation
    #[arg(long, env = "CLIPFETCH_TOOL_TIMEOUT_MS")]
    tool_timeout_ms: Option<u64>,

    /// Default limit for one remote API call
    #[arg(long, env = "CLIPFETCH_REMOTE_TIMEOUT_MS")]
    remote_timeout_ms: Option<u64>,

    /// Parent directory for per-request workspaces
    #[arg(long, env = "CLIPFETCH_TEMP_ROOT")]
    temp_root: Option<PathBuf>,

    /// Directory served for unmatched routes
    #[arg(long, env = "CLIPFETCH_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// `redirect` returns remote links as JSON, `proxy` streams them
    #[arg(long, env = "CLIPFETCH_LINK_MODE")]
    link_mode: Option<LinkMode>,

    /// Proxy for the downloader and remote calls, e.g. socks5h://127.0.0.1:1080
    #[arg(long, env = "CLIPFETCH_PROXY")]
    proxy: Option<String>,
}

impl Cli {
    fn apply(self, mut config: Config) -> Config {
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(ms) = self.tool_timeout_ms {
            config = config.with_tool_timeout_ms(ms);
        }
        if let Some(ms) = self.remote_timeout_ms {
            config = config.with_remote_timeout_ms(ms);
        }
        if let Some(root) = self.temp_root {
            config = config.with_temp_root(root);
        }
        if let Some(dir) = self.static_dir {
            config = config.with_static_dir(Some(dir));
        }
        if let Some(mode) = self.link_mode {
            config = config.with_link_mode(mode);
        }
        if let Some(proxy) = self.proxy.filter(|p| !p.trim().is_empty()) {
            config = config.with_proxy(Some(proxy));
        }
        config
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let config = cli.apply(config);
    config.validate().context("validating configuration")?;

    clipfetch_lib::serve(config).await
}
