//! # hotload
//!
//! Hot-swappable database connection targets driven by a watched source of truth.
//!
//! ## Overview
//!
//! Applications open connections through a *dispatch address* instead of a raw
//! connection string:
//!
//! ```text
//! fsnotify://postgres/etc/app/dsn.txt?sslmode=disable&forceKill=true
//! └──┬───┘   └──┬───┘└───────┬──────┘ └──────────────┬────────────┘
//!  strategy   driver        path          driver options / flags
//! ```
//!
//! The *strategy* watches the path and reports the current connection string.
//! When it changes, every connection opened under the old value is invalidated so
//! pools discard it on release; with `forceKill=true` they are closed immediately.
//! New opens always use the latest value.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hotload::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(postgres: impl Driver + 'static) -> Result<()> {
//! let registry = Arc::new(Registry::new());
//! registry.register_driver("postgres", postgres);
//!
//! let dispatcher = Dispatcher::builder()
//!     .with_registry(registry)
//!     .with_file_strategy("fsnotify")
//!     .build();
//!
//! let conn = dispatcher.open("fsnotify://postgres/etc/app/dsn.txt").await?;
//! conn.execute("SELECT 1").await.map_err(HotloadError::Driver)?;
//!
//! if !conn.is_valid() {
//!     // The connection string changed; open a fresh connection.
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): the built-in [`FileStrategy`](sources::FileStrategy)
//! - `metrics`: OpenTelemetry swap and connection metrics
//!
//! ```toml
//! [dependencies]
//! hotload = { version = "0.1", features = ["metrics"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod driver;
pub mod error;
pub mod notify;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{Dispatcher, DispatcherBuilder, Registry, SettingsLoader};
    pub use crate::driver::{Connection, Driver, HotConnection};
    pub use crate::error::{HotloadError, Result};
    pub use crate::notify::SwapEvent;
    pub use crate::sources::{ManualStrategy, Strategy};

    #[cfg(feature = "file-watch")]
    pub use crate::sources::FileStrategy;
}
