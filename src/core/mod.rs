//! Configuration: the snapshot type, how it is loaded and validated, and
//! the reloader that keeps it live.

mod builder;
mod changes;
mod loader;
mod reloader;
mod settings;
mod validation;

pub use builder::{DEFAULT_DEBOUNCE, ReloaderBuilder};
pub use changes::ChangeSet;
pub use loader::ConfigLoader;
pub use reloader::{ConfigReloader, ReloadOutcome};
pub use settings::{
    CheckSettings, DeliverySettings, GitHubSettings, LogFormat, LogLevel, LoggingSettings,
    ProviderKind, ProviderSettings, ServerSettings, Settings, StorageKind, StorageSettings,
};
pub use validation::{MAX_PERIOD_SECS, Validate};
