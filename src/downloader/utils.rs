// Helper functions for strategy implementations

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// Run command with timeout (shared utility)
///
/// The child is killed when the timeout fires or when the returned future is
/// dropped mid-flight.
pub async fn run_output_with_timeout(
    program: &str,
    args: &[String],
    current_dir: Option<&Path>,
    limit: Duration,
) -> Result<std::process::Output, String> {
    let mut command = TokioCommand::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = current_dir {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| format!("Failed to capture stdout from {}", program))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| format!("Failed to capture stderr from {}", program))?;

    let mut stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stdout: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });
    let mut stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stderr: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });

    // Descendants can inherit the pipes and outlive the child, so the drains
    // share the same deadline as the wait
    let collected = timeout(limit, async {
        let status = child
            .wait()
            .await
            .map_err(|e| format!("Failed to wait for {}: {}", program, e))?;
        let stdout = (&mut stdout_task)
            .await
            .map_err(|e| format!("stdout task failed: {}", e))??;
        let stderr = (&mut stderr_task)
            .await
            .map_err(|e| format!("stderr task failed: {}", e))??;
        Ok::<_, String>(std::process::Output { status, stdout, stderr })
    })
    .await;

    match collected {
        Ok(result) => result,
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(format!("Timed out after {}ms", limit.as_millis()))
        }
    }
}

/// The lines of tool stderr worth logging, capped to keep logs readable
pub fn stderr_preview(stderr: &str) -> String {
    let important: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:") || l.contains("HTTP Error"))
        .take(2)
        .collect();

    if !important.is_empty() {
        return important.join(" | ");
    }

    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
        .chars()
        .take(200)
        .collect()
}

/// Build an HTTP client, routed through `proxy` when one is configured
pub fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client, String> {
    let mut builder = reqwest::Client::builder().user_agent(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    );

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| format!("Invalid proxy URL {}: {}", proxy_url, e))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_prefers_error_lines() {
        let stderr = "[youtube] abc: Downloading webpage\n\
                      WARNING: something minor\n\
                      ERROR: [youtube] abc: HTTP Error 403: Forbidden\n";
        assert_eq!(
            stderr_preview(stderr),
            "ERROR: [youtube] abc: HTTP Error 403: Forbidden"
        );
    }

    #[test]
    fn preview_falls_back_to_last_line() {
        assert_eq!(stderr_preview("first\nlast line\n\n"), "last line");
        assert_eq!(stderr_preview(""), "no output");
    }

    #[test]
    fn client_builds_with_and_without_proxy() {
        assert!(build_http_client(None).is_ok());
        assert!(build_http_client(Some("socks5h://127.0.0.1:1080")).is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_output_is_captured() {
        let out = run_output_with_timeout(
            "sh",
            &["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
            None,
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(out.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&out.stderr).trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_output_with_timeout(
            "sh",
            &["-c".to_string(), "touch marker".to_string()],
            Some(dir.path()),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert!(out.status.success());
        assert!(dir.path().join("marker").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let err = run_output_with_timeout(
            "sh",
            &["-c".to_string(), "exec sleep 5".to_string()],
            None,
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();

        assert_eq!(err, "Timed out after 100ms");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn background_child_holding_pipes_still_times_out() {
        let started = std::time::Instant::now();
        let err = run_output_with_timeout(
            "sh",
            &["-c".to_string(), "sleep 3 & exit 0".to_string()],
            None,
            Duration::from_millis(200),
        )
        .await
        .unwrap_err();

        assert_eq!(err, "Timed out after 200ms");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let err = run_output_with_timeout(
            "clipfetch-definitely-missing-binary",
            &[],
            None,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();

        assert!(err.starts_with("Failed to start"));
    }
}
