//! Dispatch addresses, the registry, target monitors and the dispatcher.

mod address;
mod builder;
mod dispatcher;
mod loader;
mod monitor;
mod options;
mod registry;
mod settings;

pub use address::{DispatchAddress, FORCE_KILL};
pub use builder::DispatcherBuilder;
pub use dispatcher::Dispatcher;
pub use loader::SettingsLoader;
pub(crate) use monitor::TargetMonitor;
pub use options::merge_connection_options;
pub use registry::{DriverEntry, Registry};
pub use settings::{FileWatchSettings, HotloadSettings};
