//! Which hot-reloadable facets differ between two snapshots.

use super::Settings;

/// Differences between the outgoing and incoming configuration.
///
/// Only facets the running service can adopt without a restart are
/// tracked. Server, storage and log format edits leave the set empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// The monitored repository list.
    pub entities: bool,
    /// The check interval.
    pub cadence: bool,
    /// Token, timeout, API root or upstream retry tuning.
    pub credentials: bool,
    /// Provider list or delivery tuning.
    pub providers: bool,
    /// Log verbosity.
    pub log_level: bool,
}

impl ChangeSet {
    /// Compare two snapshots.
    pub fn between(old: &Settings, new: &Settings) -> Self {
        Self {
            entities: old.repositories != new.repositories,
            cadence: old.check.interval_minutes != new.check.interval_minutes,
            credentials: old.github != new.github,
            providers: old.notifications != new.notifications || old.delivery != new.delivery,
            log_level: old.logging.level != new.logging.level,
        }
    }

    /// True when nothing hot-reloadable changed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the changed facets, for logging.
    pub fn facets(&self) -> Vec<&'static str> {
        [
            (self.entities, "entities"),
            (self.cadence, "cadence"),
            (self.credentials, "credentials"),
            (self.providers, "providers"),
            (self.log_level, "log_level"),
        ]
        .into_iter()
        .filter_map(|(changed, name)| changed.then_some(name))
        .collect()
    }
}

/// Differences that only take effect after a restart.
pub(crate) fn restart_only_facets(old: &Settings, new: &Settings) -> Vec<&'static str> {
    [
        (old.server != new.server, "server"),
        (old.storage != new.storage, "storage"),
        (old.logging.format != new.logging.format, "logging.format"),
    ]
    .into_iter()
    .filter_map(|(changed, name)| changed.then_some(name))
    .collect()
}
