//! Scheduled removal of generated files from the scratch directory.
//!
//! Each path has at most one pending removal task. Scheduling again (a
//! download shortening the safety-net expiry to the grace delay) cancels
//! the earlier task through its [`CancellationToken`], and an immediate
//! removal cancels any pending one, so a file is never deleted twice by
//! racing timers. Existence is checked before deleting; a file already
//! gone is not an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug)]
struct Pending {
    id: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct Inner {
    pending: Mutex<HashMap<PathBuf, Pending>>,
    next_id: AtomicU64,
}

/// Handle to the per-path removal tasks. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CleanupScheduler {
    inner: Arc<Inner>,
}

impl CleanupScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<PathBuf, Pending>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remove `path` after `delay`, replacing any removal already scheduled for it.
    pub fn schedule(&self, path: PathBuf, delay: Duration) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        if let Some(previous) = self.pending().insert(
            path.clone(),
            Pending {
                id,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }
        debug!("Scheduled removal of {} in {:?}", path.display(), delay);

        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Removal of {} superseded", path.display());
                }
                _ = tokio::time::sleep(delay) => {
                    remove_if_exists(&path).await;
                    scheduler.forget(&path, id);
                }
            }
        });
    }

    /// Cancel the pending removal of `path` and delete it now.
    pub async fn remove_now(&self, path: &Path) {
        self.cancel(path);
        remove_if_exists(path).await;
    }

    /// Cancel the pending removal of `path`; true if one was pending.
    pub fn cancel(&self, path: &Path) -> bool {
        match self.pending().remove(path) {
            Some(p) => {
                p.token.cancel();
                true
            }
            None => false,
        }
    }

    /// True if a removal is scheduled for `path`.
    pub fn is_scheduled(&self, path: &Path) -> bool {
        self.pending().contains_key(path)
    }

    /// Number of paths with a scheduled removal.
    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the entry for `path` only if it still belongs to task `id`.
    fn forget(&self, path: &Path, id: u64) {
        let mut pending = self.pending();
        if pending.get(path).is_some_and(|p| p.id == id) {
            pending.remove(path);
        }
    }
}

/// Delete `path` if present; a missing file is fine.
pub async fn remove_if_exists(path: &Path) {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
