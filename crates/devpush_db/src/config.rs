//! Bootstrap configuration.
//!
//! The protocol never reads the process environment itself: callers build a
//! [`BootstrapConfig`] explicitly or through [`BootstrapConfig::from_env`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Drop directive: wipe and recreate the working schema on start.
pub const DROP_DATABASE_ENV: &str = "DEVPUSH_DROP_DATABASE";
/// Environment mode marker (`production` suppresses auto-sync).
pub const ENVIRONMENT_ENV: &str = "DEVPUSH_ENV";
/// Set while an external versioned-migration run is active.
pub const MIGRATING_ENV: &str = "DEVPUSH_MIGRATING";

/// Environment the application runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    Production,
    #[default]
    Development,
}

impl EnvironmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentMode::Production => "production",
            EnvironmentMode::Development => "development",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, EnvironmentMode::Production)
    }
}

impl FromStr for EnvironmentMode {
    type Err = std::convert::Infallible;

    /// `production` / `prod` (any case) is Production, anything else Development.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("production") || s.eq_ignore_ascii_case("prod") {
            Ok(EnvironmentMode::Production)
        } else {
            Ok(EnvironmentMode::Development)
        }
    }
}

impl fmt::Display for EnvironmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directives that steer one bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Irreversibly drop and recreate the working schema after connecting.
    ///
    /// Honored before the mode gate, so it also fires in production.
    pub drop_on_start: bool,
    pub mode: EnvironmentMode,
    /// An external versioned-migration run is in progress.
    pub migration_in_progress: bool,
}

impl BootstrapConfig {
    /// Development defaults: no drop, no migration run.
    pub fn development() -> Self {
        Self::default()
    }

    pub fn production() -> Self {
        Self {
            mode: EnvironmentMode::Production,
            ..Self::default()
        }
    }

    pub fn with_drop_on_start(mut self, drop_on_start: bool) -> Self {
        self.drop_on_start = drop_on_start;
        self
    }

    pub fn with_migration_in_progress(mut self, in_progress: bool) -> Self {
        self.migration_in_progress = in_progress;
        self
    }

    /// Read the directives from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the directives through `lookup` (environment-like source).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            drop_on_start: lookup(DROP_DATABASE_ENV).is_some_and(|v| is_truthy(&v)),
            mode: lookup(ENVIRONMENT_ENV)
                .map(|v| v.parse().unwrap_or_default())
                .unwrap_or_default(),
            migration_in_progress: lookup(MIGRATING_ENV).is_some_and(|v| is_truthy(&v)),
        }
    }
}

/// `1`, `true` or `yes`, case-insensitive.
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value == "1" || value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_is_development() {
        let config = BootstrapConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, BootstrapConfig::development());
    }

    #[test]
    fn test_reads_all_directives() {
        let config = BootstrapConfig::from_lookup(lookup_from(&[
            (DROP_DATABASE_ENV, "true"),
            (ENVIRONMENT_ENV, "Production"),
            (MIGRATING_ENV, "1"),
        ]));
        assert!(config.drop_on_start);
        assert!(config.mode.is_production());
        assert!(config.migration_in_progress);
    }

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" TRUE "));
        assert!(is_truthy("yes"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_unknown_mode_is_development() {
        assert_eq!(
            "staging".parse::<EnvironmentMode>().unwrap(),
            EnvironmentMode::Development
        );
        assert_eq!(
            "prod".parse::<EnvironmentMode>().unwrap(),
            EnvironmentMode::Production
        );
    }
}
