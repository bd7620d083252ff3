//! File-backed strategy.

use super::{QueryParams, Strategy, Watched};
use crate::core::FileWatchSettings;
use crate::error::BoxError;
use crate::notify::FileWatcher;
use async_trait::async_trait;
use std::future::pending;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Strategy that reads the connection string from a file and follows its changes.
///
/// The dispatch address path is the file path:
/// `fsnotify://postgres/etc/app/dsn.txt` reads `/etc/app/dsn.txt`.
///
/// # Examples
///
/// ```rust,no_run
/// use hotload::core::{FileWatchSettings, Registry};
/// use hotload::sources::FileStrategy;
///
/// let registry = Registry::new();
/// registry.register_strategy("fsnotify", FileStrategy::new(FileWatchSettings::default()));
/// ```
pub struct FileStrategy {
    settings: FileWatchSettings,
}

impl FileStrategy {
    /// Create a file strategy.
    pub fn new(settings: FileWatchSettings) -> Self {
        Self { settings }
    }

    /// The settings in use.
    pub fn settings(&self) -> &FileWatchSettings {
        &self.settings
    }
}

impl Default for FileStrategy {
    fn default() -> Self {
        Self::new(FileWatchSettings::default())
    }
}

async fn read_value(path: &Path, trim: bool) -> std::io::Result<String> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(if trim {
        contents.trim().to_string()
    } else {
        contents
    })
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

async fn tick(poll: &mut Option<Interval>) {
    match poll {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending::<()>().await,
    }
}

#[async_trait]
impl Strategy for FileStrategy {
    async fn watch(
        &self,
        scope: CancellationToken,
        path: &str,
        _params: &QueryParams,
    ) -> Result<Watched, BoxError> {
        let path = PathBuf::from(path);
        let trim = self.settings.trim;

        let initial = read_value(&path, trim)
            .await
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

        let (watcher, mut signals) = FileWatcher::new(self.settings.debounce())?;
        watcher.watch(&path).await?;

        let mut poll = self.settings.poll_interval().map(|period| {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });
        let mut last_modified = modified(&path).await;

        let (tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        tokio::spawn(async move {
            // Dropping the watcher unregisters it from the OS.
            let _watcher = watcher;
            loop {
                tokio::select! {
                    _ = scope.cancelled() => break,
                    signal = signals.recv() => {
                        if signal.is_none() {
                            break;
                        }
                    }
                    _ = tick(&mut poll) => {
                        let current = modified(&path).await;
                        if current == last_modified {
                            continue;
                        }
                        debug!(path = %path.display(), "modification time changed");
                    }
                }

                last_modified = modified(&path).await;
                match read_value(&path, trim).await {
                    Ok(value) => {
                        if tx.send(value).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to re-read watched file")
                    }
                }
            }
            debug!(path = %path.display(), "file watch stopped");
        });

        Ok((initial, rx))
    }
}
