// Error types for the retrieval pipeline

use std::fmt;

/// Client-safe category of a single strategy failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Downloader exited nonzero, timed out, or could not be spawned
    ToolInvocation,
    /// Downloader succeeded but left no usable media file
    ArtifactMissing,
    /// No remote endpoint produced a usable link
    RemoteResolution,
}

impl FailureKind {
    pub fn summary(&self) -> &'static str {
        match self {
            Self::ToolInvocation => "download tool failed",
            Self::ArtifactMissing => "no artifact produced",
            Self::RemoteResolution => "no remote link resolved",
        }
    }
}

/// One failed strategy attempt.
///
/// `reason` is for logs only: it may carry tool stderr or local paths and is
/// never written to a client. `hint` is a static, client-safe description.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: String,
    pub kind: FailureKind,
    pub reason: String,
    pub hint: Option<&'static str>,
}

impl StrategyFailure {
    pub fn new(strategy: impl Into<String>, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            kind,
            reason: reason.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: Option<&'static str>) -> Self {
        self.hint = hint;
        self
    }

    /// Fold a strategy-internal error into a recorded failure
    pub fn from_error(strategy: impl Into<String>, err: DownloadError) -> Self {
        let kind = match &err {
            DownloadError::ArtifactMissing(_) => FailureKind::ArtifactMissing,
            DownloadError::RemoteResolution(_) => FailureKind::RemoteResolution,
            _ => FailureKind::ToolInvocation,
        };
        Self::new(strategy, kind, err.to_string())
    }

    /// `<strategy>: <category>` line safe to show a client
    pub fn client_summary(&self) -> String {
        match self.hint {
            Some(hint) => format!("{}: {}, {}", self.strategy, self.kind.summary(), hint),
            None => format!("{}: {}", self.strategy, self.kind.summary()),
        }
    }
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.strategy, self.kind.summary(), self.reason)
    }
}

#[derive(Debug, Clone)]
pub enum DownloadError {
    /// Missing or unparseable source URL; no strategy was attempted
    InvalidInput(String),

    /// Nonzero exit, spawn failure, or timeout of the external tool
    ToolInvocation(String),

    /// Tool succeeded but produced no media file
    ArtifactMissing(String),

    /// Remote API error, timeout, or missing link field
    RemoteResolution(String),

    /// Every configured strategy failed
    AggregateFailure(Vec<StrategyFailure>),

    /// Workspace removal failed (logged, never surfaced)
    Cleanup(String),
}

impl DownloadError {
    /// Short diagnostic for clients; never contains local paths or tool output
    pub fn client_details(&self) -> Option<String> {
        match self {
            Self::AggregateFailure(failures) if !failures.is_empty() => Some(
                failures
                    .iter()
                    .map(StrategyFailure::client_summary)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "{}", msg),
            Self::ToolInvocation(msg) => write!(f, "Tool invocation failed: {}", msg),
            Self::ArtifactMissing(msg) => write!(f, "No artifact produced: {}", msg),
            Self::RemoteResolution(msg) => write!(f, "Remote resolution failed: {}", msg),
            Self::AggregateFailure(failures) => {
                write!(f, "All retrieval strategies failed")?;
                for failure in failures {
                    write!(f, "\n  - {}", failure)?;
                }
                Ok(())
            }
            Self::Cleanup(msg) => write!(f, "Workspace cleanup failed: {}", msg),
        }
    }
}

impl std::error::Error for DownloadError {}
