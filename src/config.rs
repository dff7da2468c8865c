//! Gate configuration.
//!
//! Every option is resolved once, when the gate is built. Precedence is
//! explicit [`GateConfig`] field, then environment value, then built-in
//! default. Empty strings count as unset.

use crate::error::GateError;
use crate::exclusion::ExcludeRule;
use crate::race::Deadline;
use crate::sdk::SdkOptions;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use url::Url;

// ============================================================================
// Defaults
// ============================================================================

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "SPYGLASSES_API_KEY";
/// Environment variable enabling debug output (exactly `"true"`).
pub const ENV_DEBUG: &str = "SPYGLASSES_DEBUG";
/// Environment variable overriding the collector endpoint.
pub const ENV_COLLECTOR_ENDPOINT: &str = "SPYGLASSES_COLLECTOR_ENDPOINT";
/// Environment variable overriding the patterns endpoint.
pub const ENV_PATTERNS_ENDPOINT: &str = "SPYGLASSES_PATTERNS_ENDPOINT";

pub const DEFAULT_COLLECT_ENDPOINT: &str = "https://www.spyglasses.io/api/collect";
pub const DEFAULT_PATTERNS_ENDPOINT: &str = "https://www.spyglasses.io/api/patterns";
pub const DEFAULT_PLATFORM_TYPE: &str = "nuxt";
/// How long a blocked response waits for its visit report.
pub const DEFAULT_BLOCKING_TIMEOUT: Duration = Duration::from_millis(2000);

// ============================================================================
// Caller-supplied options
// ============================================================================

/// Options supplied by the embedding application.
///
/// Field names follow the documented option names (`apiKey`,
/// `excludePaths`, `logging.blockingTimeout`, ...) when loaded from a file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GateConfig {
    pub api_key: Option<String>,
    pub debug: Option<bool>,
    pub collect_endpoint: Option<String>,
    pub patterns_endpoint: Option<String>,
    pub platform_type: Option<String>,
    /// Extra exclusion rules, checked in order after the built-in ones.
    pub exclude_paths: Vec<ExcludeRule>,
    pub logging: LoggingConfig,
}

/// Visit-report policy for blocked requests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Milliseconds to wait for the blocked-visit report.
    ///
    /// `None` uses [`DEFAULT_BLOCKING_TIMEOUT`]. `Some(None)` (an explicit
    /// `null`) and `Some(Some(0))` wait without a deadline.
    #[serde(deserialize_with = "explicit_null")]
    pub blocking_timeout: Option<Option<u64>>,
    /// Whether the 403 waits for the report. Defaults to `true`.
    pub await_blocked_logging: Option<bool>,
}

/// Keeps an explicit `null` distinct from a missing field.
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(Some)
}

impl GateConfig {
    /// Config with an API key and everything else unset.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Resolve against `env` and the built-in defaults.
    pub fn resolve(self, env: &EnvDefaults) -> Result<GateSettings, GateError> {
        let api_key = non_empty(self.api_key).or_else(|| env.api_key.clone());
        let debug = self.debug.unwrap_or(env.debug);

        let collect_endpoint = parse_endpoint(
            "collect",
            non_empty(self.collect_endpoint)
                .or_else(|| env.collect_endpoint.clone())
                .as_deref()
                .unwrap_or(DEFAULT_COLLECT_ENDPOINT),
        )?;
        let patterns_endpoint = parse_endpoint(
            "patterns",
            non_empty(self.patterns_endpoint)
                .or_else(|| env.patterns_endpoint.clone())
                .as_deref()
                .unwrap_or(DEFAULT_PATTERNS_ENDPOINT),
        )?;
        let platform_type =
            non_empty(self.platform_type).unwrap_or_else(|| DEFAULT_PLATFORM_TYPE.to_string());

        let blocking_timeout = match self.logging.blocking_timeout {
            None => Deadline::After(DEFAULT_BLOCKING_TIMEOUT),
            Some(ms) => Deadline::from_millis(ms),
        };

        Ok(GateSettings {
            api_key,
            debug,
            collect_endpoint,
            patterns_endpoint,
            platform_type,
            exclude_paths: self.exclude_paths,
            logging: LoggingPolicy {
                blocking_timeout,
                await_blocked_logging: self.logging.await_blocked_logging.unwrap_or(true),
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_endpoint(name: &'static str, value: &str) -> Result<Url, GateError> {
    Url::parse(value).map_err(|source| GateError::InvalidEndpoint {
        name,
        value: value.to_string(),
        source,
    })
}

// ============================================================================
// Environment
// ============================================================================

/// Environment fallbacks, captured once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvDefaults {
    pub api_key: Option<String>,
    pub debug: bool,
    pub collect_endpoint: Option<String>,
    pub patterns_endpoint: Option<String>,
}

impl EnvDefaults {
    /// Read the `SPYGLASSES_*` variables from the process environment.
    pub fn from_process() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the `SPYGLASSES_*` variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_key: non_empty(lookup(ENV_API_KEY)),
            debug: lookup(ENV_DEBUG).is_some_and(|v| v == "true"),
            collect_endpoint: non_empty(lookup(ENV_COLLECTOR_ENDPOINT)),
            patterns_endpoint: non_empty(lookup(ENV_PATTERNS_ENDPOINT)),
        }
    }
}

// ============================================================================
// Resolved settings
// ============================================================================

/// Blocked-visit report policy after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingPolicy {
    pub blocking_timeout: Deadline,
    pub await_blocked_logging: bool,
}

/// Immutable configuration of one gate instance.
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub api_key: Option<String>,
    pub debug: bool,
    pub collect_endpoint: Url,
    pub patterns_endpoint: Url,
    pub platform_type: String,
    pub exclude_paths: Vec<ExcludeRule>,
    pub logging: LoggingPolicy,
}

impl GateSettings {
    /// Options for constructing the detection SDK.
    pub fn sdk_options(&self) -> SdkOptions {
        SdkOptions {
            api_key: self.api_key.clone(),
            debug: self.debug,
            collect_endpoint: self.collect_endpoint.clone(),
            patterns_endpoint: self.patterns_endpoint.clone(),
            platform_type: self.platform_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> EnvDefaults {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvDefaults::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_env() {
        let settings = GateConfig::default().resolve(&EnvDefaults::default()).unwrap();

        assert_eq!(settings.api_key, None);
        assert!(!settings.debug);
        assert_eq!(settings.collect_endpoint.as_str(), DEFAULT_COLLECT_ENDPOINT);
        assert_eq!(settings.patterns_endpoint.as_str(), DEFAULT_PATTERNS_ENDPOINT);
        assert_eq!(settings.platform_type, "nuxt");
        assert!(settings.exclude_paths.is_empty());
        assert_eq!(
            settings.logging.blocking_timeout,
            Deadline::After(Duration::from_millis(2000))
        );
        assert!(settings.logging.await_blocked_logging);
    }

    #[test]
    fn test_env_fills_unset_fields() {
        let env = env(&[
            (ENV_API_KEY, "env-key"),
            (ENV_DEBUG, "true"),
            (ENV_COLLECTOR_ENDPOINT, "http://collector.local/collect"),
            (ENV_PATTERNS_ENDPOINT, "http://collector.local/patterns"),
        ]);
        let settings = GateConfig::default().resolve(&env).unwrap();

        assert_eq!(settings.api_key.as_deref(), Some("env-key"));
        assert!(settings.debug);
        assert_eq!(
            settings.collect_endpoint.as_str(),
            "http://collector.local/collect"
        );
        assert_eq!(
            settings.patterns_endpoint.as_str(),
            "http://collector.local/patterns"
        );
    }

    #[test]
    fn test_explicit_config_beats_env() {
        let env = env(&[(ENV_API_KEY, "env-key"), (ENV_DEBUG, "true")]);
        let config = GateConfig {
            api_key: Some("config-key".to_string()),
            debug: Some(false),
            ..GateConfig::default()
        };
        let settings = config.resolve(&env).unwrap();

        assert_eq!(settings.api_key.as_deref(), Some("config-key"));
        assert!(!settings.debug);
    }

    #[test]
    fn test_empty_api_key_falls_through_to_env() {
        let env = env(&[(ENV_API_KEY, "env-key")]);
        let settings = GateConfig::with_api_key("").resolve(&env).unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_debug_env_requires_exact_true() {
        assert!(!env(&[(ENV_DEBUG, "1")]).debug);
        assert!(!env(&[(ENV_DEBUG, "TRUE")]).debug);
        assert!(env(&[(ENV_DEBUG, "true")]).debug);
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let config = GateConfig {
            collect_endpoint: Some("collector".to_string()),
            ..GateConfig::default()
        };
        let err = config.resolve(&EnvDefaults::default()).unwrap_err();
        assert!(matches!(err, GateError::InvalidEndpoint { name: "collect", .. }));
    }

    #[test]
    fn test_blocking_timeout_from_json() {
        let absent: GateConfig = serde_json::from_str(r#"{ "logging": {} }"#).unwrap();
        let null: GateConfig =
            serde_json::from_str(r#"{ "logging": { "blockingTimeout": null } }"#).unwrap();
        let zero: GateConfig =
            serde_json::from_str(r#"{ "logging": { "blockingTimeout": 0 } }"#).unwrap();
        let short: GateConfig =
            serde_json::from_str(r#"{ "logging": { "blockingTimeout": 1 } }"#).unwrap();

        let resolve = |c: GateConfig| c.resolve(&EnvDefaults::default()).unwrap().logging;

        assert_eq!(
            resolve(absent).blocking_timeout,
            Deadline::After(DEFAULT_BLOCKING_TIMEOUT)
        );
        assert_eq!(resolve(null).blocking_timeout, Deadline::Unbounded);
        assert_eq!(resolve(zero).blocking_timeout, Deadline::Unbounded);
        assert_eq!(
            resolve(short).blocking_timeout,
            Deadline::After(Duration::from_millis(1))
        );
    }

    #[test]
    fn test_full_config_from_json() {
        let json = r#"{
            "apiKey": "test",
            "debug": true,
            "platformType": "axum",
            "excludePaths": ["/health", { "regex": "^/preview" }],
            "logging": { "blockingTimeout": 500, "awaitBlockedLogging": false }
        }"#;
        let config: GateConfig = serde_json::from_str(json).unwrap();
        let settings = config.resolve(&EnvDefaults::default()).unwrap();

        assert_eq!(settings.api_key.as_deref(), Some("test"));
        assert!(settings.debug);
        assert_eq!(settings.platform_type, "axum");
        assert_eq!(settings.exclude_paths.len(), 2);
        assert_eq!(
            settings.logging,
            LoggingPolicy {
                blocking_timeout: Deadline::After(Duration::from_millis(500)),
                await_blocked_logging: false,
            }
        );
    }

    #[test]
    fn test_sdk_options_mirror_settings() {
        let settings = GateConfig::with_api_key("k")
            .resolve(&EnvDefaults::default())
            .unwrap();
        let options = settings.sdk_options();

        assert_eq!(options.api_key.as_deref(), Some("k"));
        assert_eq!(options.platform_type, "nuxt");
        assert_eq!(options.collect_endpoint, settings.collect_endpoint);
    }
}
