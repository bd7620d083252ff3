//! File-backed targets driven through the dispatcher.

#![cfg(feature = "file-watch")]

mod common;

use common::{RecordingDriver, swap_events};
use hotload::core::{FileWatchSettings, HotloadSettings};
use hotload::prelude::*;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn file_dispatcher(driver: &RecordingDriver) -> Dispatcher {
    let registry = Arc::new(Registry::new());
    registry.register_driver_with_options(
        "postgres",
        driver.clone(),
        [("application_name", "svc")],
    );

    Dispatcher::builder()
        .with_registry(registry)
        .with_settings(HotloadSettings {
            file_watch: FileWatchSettings {
                debounce_ms: 20,
                ..Default::default()
            },
        })
        .with_file_strategy("fsnotify")
        .build()
}

#[tokio::test]
async fn test_file_change_swaps_target() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dsn.txt");
    fs::write(&path, "postgres://db-a/orders\n").unwrap();

    let driver = RecordingDriver::default();
    let dispatcher = file_dispatcher(&driver);
    let (_handle, mut events) = swap_events(&dispatcher);
    let address = format!("fsnotify://postgres{}?sslmode=disable", path.display());

    let first = dispatcher.open(&address).await.unwrap();
    assert_eq!(
        first.connection_string(),
        "postgres://db-a/orders?application_name=svc&sslmode=disable"
    );

    fs::write(&path, "postgres://db-b/orders\n").unwrap();
    let event = events.next().await;
    assert_eq!(event.address, address);
    assert_eq!(event.invalidated, 1);

    let second = dispatcher.open(&address).await.unwrap();
    assert_eq!(
        second.connection_string(),
        "postgres://db-b/orders?application_name=svc&sslmode=disable"
    );
    assert!(!first.is_valid());
    assert_eq!(
        dispatcher.current_value(&address).await.as_deref().map(String::as_str),
        Some("postgres://db-b/orders")
    );
}

#[tokio::test]
async fn test_address_option_overrides_driver_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("dsn.txt");
    fs::write(&path, "postgres://db-a/orders").unwrap();

    let driver = RecordingDriver::default();
    let dispatcher = file_dispatcher(&driver);
    let address = format!("fsnotify://postgres{}?application_name=batch", path.display());

    let conn = dispatcher.open(&address).await.unwrap();
    assert_eq!(conn.connection_string(), "postgres://db-a/orders?application_name=batch");
}

#[tokio::test]
async fn test_missing_file_is_a_watch_failure() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.txt");

    let dispatcher = file_dispatcher(&RecordingDriver::default());
    let address = format!("fsnotify://postgres{}", path.display());

    let err = dispatcher.open(&address).await.unwrap_err();
    assert!(matches!(err, HotloadError::WatchFailure(_)));
    assert!(dispatcher.targets().await.is_empty());
}
