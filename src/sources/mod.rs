//! Watch strategies: where connection strings come from.

#[cfg(feature = "file-watch")]
mod file;
mod manual;
mod strategy;

#[cfg(feature = "file-watch")]
pub use file::FileStrategy;
pub use manual::ManualStrategy;
pub use strategy::{QueryParams, Strategy, Watched};
