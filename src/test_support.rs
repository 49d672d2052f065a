// Shared fixtures for unit and HTTP tests

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::Router;
use tokio::net::TcpListener;

use crate::downloader::tools::ToolCommand;

/// Serve `router` on an ephemeral local port
pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("test listener should bind");
    let address = listener
        .local_addr()
        .expect("test listener should expose local address");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("test server should run");
    });

    address
}

/// A shell script standing in for yt-dlp.
///
/// The script parses `-P <dir>` and `-f <format>` into `$dir` / `$fmt`, logs
/// each invocation to a counter file outside the workspace, then runs `body`.
pub struct FakeTool {
    pub command: ToolCommand,
    counter: PathBuf,
}

impl FakeTool {
    pub fn new(dir: &Path, body: &str) -> Self {
        let script = dir.join("fake-yt-dlp.sh");
        let counter = dir.join("invocations.log");
        let contents = format!(
            r#"#!/bin/sh
echo "$*" >> "{counter}"
dir=""
fmt=""
while [ $# -gt 0 ]; do
  case "$1" in
    -P) dir="$2"; shift 2 ;;
    -f) fmt="$2"; shift 2 ;;
    *) shift ;;
  esac
done
{body}
"#,
            counter = counter.display(),
            body = body,
        );
        std::fs::write(&script, contents).expect("fake tool script should be written");

        // Run through `sh` so the script never needs the exec bit
        Self {
            command: ToolCommand {
                program: "sh".to_string(),
                prefix_args: vec![script.to_string_lossy().to_string()],
            },
            counter,
        }
    }

    /// Argument lines of every invocation so far
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(&self.counter)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Entries currently under a temp root
pub fn dir_entries(root: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(root) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}
