//! Capture configuration.
//!
//! [`CaptureConfig`] gathers every tunable of the capture pipeline. Hosts usually embed it in
//! their own configuration and hand it over as JSON:
//!
//! ```rust
//! use std::time::Duration;
//! use callscope::config::CaptureConfig;
//!
//! let config = CaptureConfig::from_json(r#"{ "queueCapacity": 64, "defaultDuration": "PT5S" }"#)?;
//! assert_eq!(config.queue_capacity, 64);
//! assert_eq!(config.default_duration, Duration::from_secs(5));
//! assert_eq!(config.consumer_thread_name, "callscope-capture-logger");
//! # Ok::<(), callscope::Error>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{metadata::signatures::MAX_RECURSION_DEPTH, utils, Error, Result};

/// Thread name used by the background capture logger.
pub const DEFAULT_CONSUMER_THREAD_NAME: &str = "callscope-capture-logger";

/// Delivery thread of the host's console logging provider.
pub const CONSOLE_LOGGER_THREAD_NAME: &str = ".NET Console Logger";

/// Tunables of the capture pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Capacity of the background log queue
    pub queue_capacity: usize,
    /// Session length used when a request carries no duration
    #[serde(with = "utils::text")]
    pub default_duration: Duration,
    /// Longest session a request may ask for
    #[serde(with = "utils::text::option", skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<Duration>,
    /// Namespaces whose methods are never instrumented (prefix match on `.` boundaries)
    pub excluded_namespaces: Vec<String>,
    /// Threads that must not produce capture entries
    pub excluded_thread_names: Vec<String>,
    /// Name of the background logger's consumer thread
    pub consumer_thread_name: String,
    /// Minimum interval between two dropped-entry warnings
    #[serde(with = "utils::text")]
    pub drop_warning_interval: Duration,
    /// Nesting limit of the signature decoder
    pub max_recursion_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            queue_capacity: 1024,
            default_duration: Duration::from_secs(30),
            max_duration: None,
            excluded_namespaces: [
                "System.Diagnostics",
                "System.Threading",
                "System.Runtime.CompilerServices",
                "Microsoft.Extensions.Logging",
                "callscope",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            excluded_thread_names: vec![
                CONSOLE_LOGGER_THREAD_NAME.to_string(),
                DEFAULT_CONSUMER_THREAD_NAME.to_string(),
            ],
            consumer_thread_name: DEFAULT_CONSUMER_THREAD_NAME.to_string(),
            drop_warning_interval: Duration::from_secs(10),
            max_recursion_depth: MAX_RECURSION_DEPTH,
        }
    }
}

impl CaptureConfig {
    /// Parses and validates a JSON configuration; absent fields keep their defaults.
    ///
    /// # Errors
    /// Returns [`Error::Json`] for malformed JSON and [`Error::Configuration`] if validation fails.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CaptureConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the background queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the default session duration.
    #[must_use]
    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = duration;
        self
    }

    /// Caps the duration a request may ask for.
    #[must_use]
    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    /// Adds an excluded namespace.
    #[must_use]
    pub fn with_excluded_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.excluded_namespaces.push(namespace.into());
        self
    }

    /// Adds an excluded thread name.
    #[must_use]
    pub fn with_excluded_thread(mut self, name: impl Into<String>) -> Self {
        self.excluded_thread_names.push(name.into());
        self
    }

    /// Renames the consumer thread; the new name is excluded from producing entries as well.
    #[must_use]
    pub fn with_consumer_thread_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.excluded_thread_names.contains(&name) {
            self.excluded_thread_names.push(name.clone());
        }
        self.consumer_thread_name = name;
        self
    }

    /// Sets the minimum interval between dropped-entry warnings.
    #[must_use]
    pub fn with_drop_warning_interval(mut self, interval: Duration) -> Self {
        self.drop_warning_interval = interval;
        self
    }

    /// Checks the configuration for inconsistent values.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Configuration("queueCapacity must be > 0".into()));
        }
        if self.default_duration.is_zero() {
            return Err(Error::Configuration("defaultDuration must be > 0".into()));
        }
        if let Some(max) = self.max_duration {
            if self.default_duration > max {
                return Err(Error::Configuration(
                    "defaultDuration exceeds maxDuration".into(),
                ));
            }
        }
        if self.max_recursion_depth == 0 {
            return Err(Error::Configuration("maxRecursionDepth must be > 0".into()));
        }
        if self.consumer_thread_name.is_empty() {
            return Err(Error::Configuration(
                "consumerThreadName must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if `namespace` is, or is nested in, an excluded namespace.
    #[must_use]
    pub fn is_namespace_excluded(&self, namespace: &str) -> bool {
        self.excluded_namespaces.iter().any(|excluded| {
            namespace
                .strip_prefix(excluded.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }

    /// Returns `true` if a thread with this name must not produce entries.
    #[must_use]
    pub fn is_thread_excluded(&self, name: &str) -> bool {
        self.excluded_thread_names.iter().any(|excluded| excluded == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue_capacity, 1024);
        assert!(config.is_thread_excluded(CONSOLE_LOGGER_THREAD_NAME));
        assert!(config.is_thread_excluded(DEFAULT_CONSUMER_THREAD_NAME));
    }

    #[test]
    fn test_namespace_exclusion_on_boundaries() {
        let config = CaptureConfig::default();
        assert!(config.is_namespace_excluded("System.Threading"));
        assert!(config.is_namespace_excluded("System.Threading.Tasks"));
        assert!(!config.is_namespace_excluded("System.ThreadingExtras"));
        assert!(!config.is_namespace_excluded("App"));
    }

    #[test]
    fn test_json_overrides() {
        let config = CaptureConfig::from_json(
            r#"{ "maxDuration": "00:05:00", "excludedNamespaces": ["Internal"] }"#,
        )
        .unwrap();
        assert_eq!(config.max_duration, Some(Duration::from_secs(300)));
        assert_eq!(config.excluded_namespaces, vec!["Internal".to_string()]);
        assert_eq!(config.default_duration, Duration::from_secs(30));
    }

    #[test]
    fn test_validation_failures() {
        assert!(matches!(
            CaptureConfig::from_json(r#"{ "queueCapacity": 0 }"#),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            CaptureConfig::from_json(r#"{ "maxDuration": "PT1S" }"#),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            CaptureConfig::from_json(r#"{ "defaultDuration": "soon" }"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_consumer_rename_is_excluded() {
        let config = CaptureConfig::default().with_consumer_thread_name("drain");
        assert!(config.is_thread_excluded("drain"));
        assert_eq!(config.consumer_thread_name, "drain");
    }
}
