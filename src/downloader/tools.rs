use std::process::Command;
use std::time::Duration;

use crate::config::ToolConfig;
use crate::downloader::models::{ToolStatus, ToolsReport};
use crate::downloader::utils::run_output_with_timeout;

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// How to launch the downloader: program plus fixed leading arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub prefix_args: Vec<String>,
}

impl ToolCommand {
    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            program: config.program.clone().unwrap_or_else(find_ytdlp),
            prefix_args: config.prefix_args.clone(),
        }
    }

    /// Full argument list: prefix first, then `args`
    pub fn args_with(&self, args: Vec<String>) -> Vec<String> {
        let mut full = self.prefix_args.clone();
        full.extend(args);
        full
    }
}

/// Find yt-dlp executable in common paths
pub fn find_ytdlp() -> String {
    let common_paths = [
        "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
        "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac
        "/usr/bin/yt-dlp",          // System installation
    ];

    for path in common_paths {
        if std::path::Path::new(path).exists() {
            return path.to_string();
        }
    }

    if let Ok(output) = Command::new("which").arg("yt-dlp").output() {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path.is_empty() {
                return path;
            }
        }
    }

    // Last resort: hope it's in PATH
    "yt-dlp".to_string()
}

pub struct ToolManager {
    downloader: ToolCommand,
    ffmpeg_program: String,
}

impl ToolManager {
    pub fn new(downloader: ToolCommand, ffmpeg_program: impl Into<String>) -> Self {
        Self {
            downloader,
            ffmpeg_program: ffmpeg_program.into(),
        }
    }

    pub async fn report(&self) -> ToolsReport {
        let (yt_dlp, ffmpeg) = tokio::join!(
            self.check_version(&self.downloader.program, self.downloader.args_with(vec!["--version".to_string()])),
            self.check_version(&self.ffmpeg_program, vec!["-version".to_string()]),
        );
        ToolsReport::new(yt_dlp, ffmpeg)
    }

    async fn check_version(&self, program: &str, args: Vec<String>) -> ToolStatus {
        match run_output_with_timeout(program, &args, None, VERSION_CHECK_TIMEOUT).await {
            Ok(output) if output.status.success() => ToolStatus {
                available: true,
                version: parse_version(&String::from_utf8_lossy(&output.stdout)),
            },
            Ok(output) => {
                tracing::debug!(program, status = ?output.status.code(), "version check failed");
                ToolStatus { available: false, version: None }
            }
            Err(e) => {
                tracing::debug!(program, error = %e, "version check failed");
                ToolStatus { available: false, version: None }
            }
        }
    }
}

/// First line of version output; for `ffmpeg version X ...` just `X`
fn parse_version(stdout: &str) -> Option<String> {
    let first = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;

    if let Some(rest) = first.strip_prefix("ffmpeg version ") {
        return rest.split_whitespace().next().map(str::to_string);
    }
    Some(first.to_string())
}
