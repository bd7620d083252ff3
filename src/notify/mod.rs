//! Change notification.
//!
//! Provides swap subscribers and, with the `file-watch` feature, the file watcher
//! behind the built-in file strategy.

pub mod subscriber;

#[cfg(feature = "file-watch")]
pub mod watcher;

pub use subscriber::{SubscriberRegistry, SubscriptionHandle, SwapEvent};

#[cfg(feature = "file-watch")]
pub use watcher::FileWatcher;
