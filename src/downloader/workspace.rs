// Scratch directories for local-tool attempts
//
// Every workspace is owned by exactly one attempt. Names carry a UUID v4 so
// concurrent requests sharing a temp root never collide; removal happens once,
// either through `release()` or when the guard is dropped.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use super::errors::DownloadError;

const WORKSPACE_PREFIX: &str = "clipfetch-";

/// Creates and tracks per-attempt workspaces under a shared temp root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    live: Arc<AtomicUsize>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of workspaces acquired and not yet released
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub async fn acquire(&self) -> Result<Workspace, DownloadError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            DownloadError::ToolInvocation(format!("Failed to create temp root: {}", e))
        })?;

        let path = self
            .root
            .join(format!("{}{}", WORKSPACE_PREFIX, Uuid::new_v4().simple()));

        // create_dir (not create_dir_all) fails if the name somehow exists
        tokio::fs::create_dir(&path).await.map_err(|e| {
            DownloadError::ToolInvocation(format!("Failed to create workspace: {}", e))
        })?;

        self.live.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(workspace = %path.display(), "workspace acquired");

        Ok(Workspace {
            path,
            created_at: OffsetDateTime::now_utc(),
            released: false,
            live: Arc::clone(&self.live),
        })
    }
}

/// A scratch directory removed on release or drop
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    created_at: OffsetDateTime,
    released: bool,
    live: Arc<AtomicUsize>,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Recursively delete the directory. Safe to call more than once.
    ///
    /// A failed removal is logged and reported as `Cleanup`; callers are not
    /// expected to act on it beyond logging.
    pub async fn release(&mut self) -> Result<(), DownloadError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.live.fetch_sub(1, Ordering::SeqCst);

        let result = tokio::fs::remove_dir_all(&self.path).await;
        self.finish_release(result)
    }

    fn finish_release(&self, result: io::Result<()>) -> Result<(), DownloadError> {
        match result {
            Ok(()) => {
                tracing::debug!(
                    workspace = %self.path.display(),
                    age_ms = (OffsetDateTime::now_utc() - self.created_at).whole_milliseconds() as i64,
                    "workspace released"
                );
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::warn!(workspace = %self.path.display(), error = %e, "workspace cleanup failed");
                Err(DownloadError::Cleanup(e.to_string()))
            }
        }
    }
}

// Reached when `release()` was skipped: a cancelled request, a panic, or a
// streamed artifact body that finished or was abandoned. The removal is
// synchronous and covers one small directory on the calling worker thread.
impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.live.fetch_sub(1, Ordering::SeqCst);

        let result = std::fs::remove_dir_all(&self.path);
        let _ = self.finish_release(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn acquire_creates_unique_directories() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let mut a = manager.acquire().await.unwrap();
        let mut b = manager.acquire().await.unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir());
        assert!(b.path().is_dir());
        assert!(a.path().starts_with(root.path()));
        assert_eq!(manager.live(), 2);

        std::fs::write(a.path().join("title.mp3"), b"a").unwrap();
        assert!(!b.path().join("title.mp3").exists());
        assert_eq!(std::fs::read_dir(b.path()).unwrap().count(), 0);

        a.release().await.unwrap();
        b.release().await.unwrap();
        assert_eq!(manager.live(), 0);
    }

    #[tokio::test]
    async fn concurrent_acquires_never_share_a_path() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());

        let (a, b) = tokio::join!(manager.acquire(), manager.acquire());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn release_is_idempotent_and_recursive() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let mut ws = manager.acquire().await.unwrap();

        let nested = ws.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("file.part"), b"partial").unwrap();

        ws.release().await.unwrap();
        assert!(!ws.path().exists());
        ws.release().await.unwrap();
        assert_eq!(manager.live(), 0);
    }

    #[tokio::test]
    async fn release_tolerates_already_removed_directory() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let mut ws = manager.acquire().await.unwrap();

        std::fs::remove_dir_all(ws.path()).unwrap();
        assert!(ws.release().await.is_ok());
    }

    #[tokio::test]
    async fn drop_removes_unreleased_workspace() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path());
        let path = {
            let ws = manager.acquire().await.unwrap();
            std::fs::write(ws.path().join("video.mp4"), b"x").unwrap();
            ws.path().to_path_buf()
        };

        assert!(!path.exists());
        assert_eq!(manager.live(), 0);
    }

    #[tokio::test]
    async fn acquire_creates_missing_root() {
        let root = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(root.path().join("a/b"));
        let ws = manager.acquire().await.unwrap();
        assert!(ws.path().is_dir());
    }
}
