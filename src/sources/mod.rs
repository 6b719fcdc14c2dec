//! Configuration source implementations.

mod config_source;
mod env;
mod file;
mod inline;

pub use config_source::ConfigSource;
pub use env::{EnvSource, STANDARD_ALIASES};
pub use file::FileSource;
pub use inline::InlineSource;
