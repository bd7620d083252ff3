//! File watching for the built-in file strategy.

use crate::error::{HotloadError, Result};
use ::notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

fn watch_error(msg: String) -> HotloadError {
    HotloadError::WatchFailure(msg.into())
}

/// Watches individual files for changes.
///
/// The watcher subscribes to each file's parent directory rather than the file
/// itself, so writers that replace the file by renaming a temporary over it are
/// still seen. Bursts of events are coalesced: one signal is sent after the
/// debounce window following the first event of a burst.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload::notify::FileWatcher;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (watcher, mut rx) = FileWatcher::new(Duration::from_millis(100))?;
/// watcher.watch("/etc/app/dsn.txt").await?;
///
/// while let Some(()) = rx.recv().await {
///     println!("dsn.txt changed");
/// }
/// # Ok(())
/// # }
/// ```
pub struct FileWatcher {
    watcher: Arc<tokio::sync::Mutex<RecommendedWatcher>>,
    /// Files whose events are forwarded.
    targets: Arc<RwLock<HashSet<PathBuf>>>,
    /// Directories registered with the OS watcher.
    directories: Arc<tokio::sync::Mutex<HashSet<PathBuf>>>,
}

impl FileWatcher {
    /// Create a new file watcher.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying OS watcher cannot be created.
    pub fn new(debounce_duration: Duration) -> Result<(Self, mpsc::Receiver<()>)> {
        let (tx, rx) = mpsc::channel(16);
        let targets: Arc<RwLock<HashSet<PathBuf>>> = Arc::default();

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let filter = Arc::clone(&targets);
        let watcher = ::notify::recommended_watcher(move |res: ::notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            let targets = filter.read();
            if event.paths.iter().any(|p| targets.contains(p)) {
                let _ = event_tx.send(event);
            }
        })
        .map_err(|e| watch_error(format!("Failed to create file watcher: {}", e)))?;

        let debounce = debounce_duration;
        tokio::spawn(async move {
            while event_rx.recv().await.is_some() {
                sleep(debounce).await;
                while event_rx.try_recv().is_ok() {}

                if tx.send(()).await.is_err() {
                    // Receiver dropped, exit
                    break;
                }
            }
        });

        Ok((
            Self {
                watcher: Arc::new(tokio::sync::Mutex::new(watcher)),
                targets,
                directories: Arc::default(),
            },
            rx,
        ))
    }

    /// Start watching a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or its directory cannot be watched.
    pub async fn watch(&self, path: impl AsRef<Path>) -> Result<()> {
        let (directory, target) = resolve(path.as_ref())?;

        let mut directories = self.directories.lock().await;
        if !directories.contains(&directory) {
            self.watcher
                .lock()
                .await
                .watch(&directory, RecursiveMode::NonRecursive)
                .map_err(|e| watch_error(format!("Failed to watch path: {}", e)))?;
            directories.insert(directory);
        }

        self.targets.write().insert(target);
        Ok(())
    }
}

/// Resolve a file to its canonical parent directory and the path events will carry.
///
/// Only the directory is canonicalized; the file itself may be a symlink that is
/// repointed on update.
fn resolve(path: &Path) -> Result<(PathBuf, PathBuf)> {
    if !path.exists() {
        return Err(watch_error(format!("File not found: {}", path.display())));
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| watch_error(format!("Not a file path: {}", path.display())))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let directory = parent
        .canonicalize()
        .map_err(|e| watch_error(format!("Failed to resolve path: {}", e)))?;

    let target = directory.join(file_name);
    Ok((directory, target))
}
