//! Change notification: the file watcher feeding the reloader and the
//! ordered callbacks it runs before a new snapshot goes live.

mod subscriber;
#[cfg(feature = "file-watch")]
mod watcher;

pub use subscriber::{CallbackRegistry, CallbackResult, ReloadEvent};
#[cfg(feature = "file-watch")]
pub use watcher::ConfigWatcher;
