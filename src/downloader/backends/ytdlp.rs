// Local tool strategy - runs yt-dlp into a scratch workspace
//
// One primary invocation, then at most one looser fallback invocation, each in
// its own freshly acquired workspace. A workspace only survives the attempt
// when it holds the returned artifact.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::downloader::diagnostics::{diagnose_error, BlockingReason};
use crate::downloader::errors::{DownloadError, StrategyFailure};
use crate::downloader::format_selector::{FormatSelector, SelectorPass};
use crate::downloader::models::{ProducedFile, RetrievalRequest, StrategyOutcome};
use crate::downloader::tools::ToolCommand;
use crate::downloader::traits::RetrievalStrategy;
use crate::downloader::utils::{run_output_with_timeout, stderr_preview};
use crate::downloader::workspace::WorkspaceManager;

pub const LOCAL_TOOL_STRATEGY: &str = "local-tool";

/// Extensions yt-dlp leaves next to the media (metadata, thumbnails, partials)
const SIDE_ARTIFACT_EXTENSIONS: &[&str] = &[
    "json",
    "jpg",
    "jpeg",
    "png",
    "webp",
    "part",
    "ytdl",
    "temp",
    "description",
    "vtt",
    "srt",
    "lrc",
];

/// Why one invocation failed, with the diagnosed cause when recognizable
struct PassFailure {
    error: DownloadError,
    reason: Option<BlockingReason>,
}

impl PassFailure {
    fn plain(error: DownloadError) -> Self {
        Self { error, reason: None }
    }
}

pub struct LocalToolStrategy {
    command: ToolCommand,
    workspaces: WorkspaceManager,
    timeout: Duration,
    proxy: Option<String>,
}

impl LocalToolStrategy {
    pub fn new(command: ToolCommand, workspaces: WorkspaceManager, timeout: Duration) -> Self {
        Self {
            command,
            workspaces,
            timeout,
            proxy: None,
        }
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Build command arguments
    fn build_args(&self, request: &RetrievalRequest, workspace: &Path, pass: SelectorPass) -> Vec<String> {
        let mut args = FormatSelector::format_args(request.audio_only(), pass);
        args.extend([
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            "30".to_string(),
            "--retries".to_string(),
            "3".to_string(),
            "-P".to_string(),
            workspace.to_string_lossy().to_string(),
            // Default template is "%(title)s [%(id)s].%(ext)s"; drop the id
            "-o".to_string(),
            "%(title)s.%(ext)s".to_string(),
        ]);

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(request.source_url().to_string());
        self.command.args_with(args)
    }

    /// One invocation in a fresh workspace
    async fn run_pass(
        &self,
        request: &RetrievalRequest,
        pass: SelectorPass,
    ) -> Result<ProducedFile, PassFailure> {
        let mut workspace = self.workspaces.acquire().await.map_err(PassFailure::plain)?;
        let args = self.build_args(request, workspace.path(), pass);

        tracing::debug!(
            pass = pass.as_str(),
            program = %self.command.program,
            args = %args.join(" "),
            "starting downloader"
        );

        let output = run_output_with_timeout(
            &self.command.program,
            &args,
            Some(workspace.path()),
            self.timeout,
        )
        .await;

        let failure = match output {
            Ok(out) if out.status.success() => match find_artifact(workspace.path()).await {
                Ok(Some((path, size_bytes))) => {
                    tracing::info!(
                        pass = pass.as_str(),
                        size_bytes,
                        elapsed_ms = (time::OffsetDateTime::now_utc() - workspace.created_at())
                            .whole_milliseconds() as i64,
                        "downloader produced artifact"
                    );
                    let title = title_from_path(&path);
                    return Ok(ProducedFile {
                        workspace,
                        path,
                        size_bytes,
                        title,
                    });
                }
                Ok(None) => PassFailure::plain(DownloadError::ArtifactMissing(
                    "downloader exited successfully but left no media file".to_string(),
                )),
                Err(e) => PassFailure::plain(DownloadError::ArtifactMissing(format!(
                    "Failed to list workspace: {}",
                    e
                ))),
            },
            Ok(out) => {
                // Keep scratch paths out of diagnostics
                let stderr = String::from_utf8_lossy(&out.stderr)
                    .replace(&*workspace.path().to_string_lossy(), "<workspace>");
                let status = out
                    .status
                    .code()
                    .map_or_else(|| "a signal".to_string(), |c| format!("status {}", c));
                PassFailure {
                    reason: diagnose_error(&stderr),
                    error: DownloadError::ToolInvocation(format!(
                        "downloader exited with {}: {}",
                        status,
                        stderr_preview(&stderr)
                    )),
                }
            }
            Err(e) => PassFailure {
                reason: diagnose_error(&e),
                error: DownloadError::ToolInvocation(e),
            },
        };

        let _ = workspace.release().await;
        Err(failure)
    }
}

#[async_trait]
impl RetrievalStrategy for LocalToolStrategy {
    fn name(&self) -> &str {
        LOCAL_TOOL_STRATEGY
    }

    async fn attempt(&self, request: &RetrievalRequest) -> StrategyOutcome {
        let primary = match self.run_pass(request, SelectorPass::Primary).await {
            Ok(file) => return StrategyOutcome::FileProduced(file),
            Err(failure) => failure,
        };

        tracing::warn!(
            pass = "primary",
            error = %primary.error,
            reason = primary.reason.map(|r| r.description()),
            "downloader attempt failed"
        );

        if primary.reason.map_or(false, |r| r.is_permanent()) {
            return StrategyOutcome::Failed(
                StrategyFailure::from_error(self.name(), primary.error)
                    .with_hint(primary.reason.map(|r| r.description())),
            );
        }

        match self.run_pass(request, SelectorPass::Fallback).await {
            Ok(file) => StrategyOutcome::FileProduced(file),
            Err(fallback) => {
                let hint = fallback.reason.or(primary.reason).map(|r| r.description());
                StrategyOutcome::Failed(
                    StrategyFailure::from_error(self.name(), fallback.error).with_hint(hint),
                )
            }
        }
    }
}

fn is_side_artifact(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.starts_with('.') || name.contains(".temp.") {
        return true;
    }

    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .map_or(false, |e| SIDE_ARTIFACT_EXTENSIONS.contains(&e.as_str()))
}

/// First media file in name order, with its size
async fn find_artifact(dir: &Path) -> std::io::Result<Option<(PathBuf, u64)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut candidates: Vec<(PathBuf, u64)> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        let path = entry.path();
        if metadata.is_file() && !is_side_artifact(&path) {
            candidates.push((path, metadata.len()));
        }
    }

    candidates.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(candidates.into_iter().next())
}

fn title_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::downloader::errors::FailureKind;
    use crate::test_support::{dir_entries, FakeTool};
    use tempfile::TempDir;

    struct Fixture {
        _tool_dir: TempDir,
        temp_root: TempDir,
        tool: FakeTool,
        workspaces: WorkspaceManager,
    }

    impl Fixture {
        fn new(body: &str) -> Self {
            let tool_dir = TempDir::new().unwrap();
            let temp_root = TempDir::new().unwrap();
            let tool = FakeTool::new(tool_dir.path(), body);
            let workspaces = WorkspaceManager::new(temp_root.path());
            Self {
                _tool_dir: tool_dir,
                temp_root,
                tool,
                workspaces,
            }
        }

        fn strategy(&self, timeout: Duration) -> LocalToolStrategy {
            LocalToolStrategy::new(self.tool.command.clone(), self.workspaces.clone(), timeout)
        }
    }

    fn audio_request() -> RetrievalRequest {
        RetrievalRequest::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ", true).unwrap()
    }

    #[tokio::test]
    async fn produces_first_media_file_and_skips_side_artifacts() {
        let fixture = Fixture::new(
            r#"printf 'ID3-audio-bytes' > "$dir/title.mp3"
printf '{}' > "$dir/title.info.json"
printf 'jpg' > "$dir/title.jpg""#,
        );
        let strategy = fixture.strategy(Duration::from_secs(10));

        let file = match strategy.attempt(&audio_request()).await {
            StrategyOutcome::FileProduced(file) => file,
            other => panic!("expected a file, got {:?}", other),
        };

        assert_eq!(file.title.as_deref(), Some("title"));
        assert_eq!(file.size_bytes, "ID3-audio-bytes".len() as u64);
        assert!(file.path.ends_with("title.mp3"));
        assert!(file.path.starts_with(fixture.temp_root.path()));
        assert_eq!(fixture.tool.invocations().len(), 1);

        let workspace_dir = file.workspace.path().to_path_buf();
        drop(file);
        assert!(!workspace_dir.exists());
        assert_eq!(fixture.workspaces.live(), 0);
    }

    #[tokio::test]
    async fn primary_invocation_selects_audio_format() {
        let fixture = Fixture::new(r#"printf 'a' > "$dir/song.mp3""#);
        let strategy = fixture.strategy(Duration::from_secs(10));

        let _ = strategy.attempt(&audio_request()).await;

        let args = &fixture.tool.invocations()[0];
        assert!(args.starts_with("-f bestaudio/best -x --audio-format mp3"));
        assert!(args.contains("-o %(title)s.%(ext)s"));
        assert!(args.ends_with("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
    }

    #[tokio::test]
    async fn fallback_runs_with_looser_selector_in_fresh_workspace() {
        let fixture = Fixture::new(
            r#"if [ "$fmt" = "best" ]; then
  printf 'video' > "$dir/clip.mp4"
  exit 0
fi
echo "ERROR: Requested format is not available" >&2
exit 1"#,
        );
        let strategy = fixture.strategy(Duration::from_secs(10));
        let request = RetrievalRequest::new("https://vimeo.com/76979871", false).unwrap();

        match strategy.attempt(&request).await {
            StrategyOutcome::FileProduced(file) => {
                assert_eq!(file.title.as_deref(), Some("clip"));
                // Primary workspace is already gone; only the artifact's remains
                assert_eq!(dir_entries(fixture.temp_root.path()), vec![file.workspace.path().to_path_buf()]);
            }
            other => panic!("expected a file, got {:?}", other),
        }

        let invocations = fixture.tool.invocations();
        assert_eq!(invocations.len(), 2);
        assert!(invocations[0].starts_with("-f bv*+ba/best"));
        assert!(invocations[1].starts_with("-f best "));
    }

    #[tokio::test]
    async fn failure_after_both_passes_leaves_no_workspace() {
        let fixture = Fixture::new(
            r#"echo "ERROR: [youtube] dQw4w9WgXcQ: HTTP Error 403: Forbidden" >&2
exit 1"#,
        );
        let strategy = fixture.strategy(Duration::from_secs(10));

        match strategy.attempt(&audio_request()).await {
            StrategyOutcome::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::ToolInvocation);
                assert_eq!(failure.hint, Some("access denied (HTTP 403)"));
                assert!(failure.reason.contains("status 1"));
            }
            other => panic!("expected failure, got {:?}", other),
        }

        assert_eq!(fixture.tool.invocations().len(), 2);
        assert!(dir_entries(fixture.temp_root.path()).is_empty());
        assert_eq!(fixture.workspaces.live(), 0);
    }

    #[tokio::test]
    async fn success_without_media_is_artifact_missing() {
        let fixture = Fixture::new(r#"printf '{}' > "$dir/title.info.json""#);
        let strategy = fixture.strategy(Duration::from_secs(10));

        match strategy.attempt(&audio_request()).await {
            StrategyOutcome::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::ArtifactMissing);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(fixture.tool.invocations().len(), 2);
        assert!(dir_entries(fixture.temp_root.path()).is_empty());
    }

    #[tokio::test]
    async fn timeout_is_a_failure_and_cleans_up() {
        let fixture = Fixture::new("exec sleep 5");
        let strategy = fixture.strategy(Duration::from_millis(200));

        match strategy.attempt(&audio_request()).await {
            StrategyOutcome::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::ToolInvocation);
                assert_eq!(failure.hint, Some("timed out"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(dir_entries(fixture.temp_root.path()).is_empty());
    }

    #[tokio::test]
    async fn permanent_failure_skips_fallback() {
        let fixture = Fixture::new(
            r#"echo "ERROR: Unsupported URL: https://example.com/page" >&2
exit 1"#,
        );
        let strategy = fixture.strategy(Duration::from_secs(10));
        let request = RetrievalRequest::new("https://example.com/page", false).unwrap();

        match strategy.attempt(&request).await {
            StrategyOutcome::Failed(failure) => assert_eq!(failure.hint, Some("unsupported URL")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(fixture.tool.invocations().len(), 1);
    }

    #[tokio::test]
    async fn proxy_is_forwarded() {
        let fixture = Fixture::new(r#"printf 'a' > "$dir/a.mp4""#);
        let strategy = fixture
            .strategy(Duration::from_secs(10))
            .with_proxy(Some("socks5h://127.0.0.1:1080".to_string()));
        let request = RetrievalRequest::new("https://youtu.be/dQw4w9WgXcQ", false).unwrap();

        let _ = strategy.attempt(&request).await;
        assert!(fixture.tool.invocations()[0].contains("--proxy socks5h://127.0.0.1:1080"));
    }

    #[tokio::test]
    async fn artifact_choice_is_name_ordered() {
        let dir = TempDir::new().unwrap();
        for name in ["b.mp4", "a.mp4", "a.jpg", ".hidden", "c.f137.temp.mp4"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("0-subdir")).unwrap();

        let (path, size) = find_artifact(dir.path()).await.unwrap().unwrap();
        assert!(path.ends_with("a.mp4"));
        assert_eq!(size, 1);
    }

    #[test]
    fn side_artifacts_are_recognized() {
        for name in ["x.info.json", "x.WEBP", "x.mp4.part", "x.description", "x.en.vtt"] {
            assert!(is_side_artifact(Path::new(name)), "{}", name);
        }
        for name in ["x.mp3", "x.mp4", "x.m4a", "x.webm"] {
            assert!(!is_side_artifact(Path::new(name)), "{}", name);
        }
    }
}
