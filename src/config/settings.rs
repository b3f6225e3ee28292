//! Settings read from the process environment.
//!
//! The resolver never reads the environment itself. Callers build a [`Settings`]
//! once and hand the relevant values to the routing layer.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

pub(crate) const ROLE_ENV_VAR: &str = "DEFAULT_LLM_ROLE";
pub(crate) const INFERENCE_TIMEOUT_ENV_VAR: &str = "INFERENCE_TIMEOUT";
pub(crate) const RETRY_COUNT_ENV_VAR: &str = "FALLBACK_RETRY_COUNT";
pub(crate) const PROBE_TIMEOUT_ENV_VAR: &str = "LIVE_PROBE_TIMEOUT";
pub(crate) const ALERT_WEBHOOK_ENV_VAR: &str = "DISCORD_ALERT_WEBHOOK";

const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RETRY_COUNT: usize = 3;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 6;

/// Read access to environment variables. Blank values count as absent.
pub(crate) trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the current process
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    /// Role used when the caller does not name one
    pub role: Option<String>,
    /// Upper bound for a single provider call
    pub inference_timeout: Duration,
    /// Number of re-resolutions after failed provider calls
    pub retry_count: usize,
    /// Upper bound for a single live reachability probe
    pub probe_timeout: Duration,
    pub alert_webhook: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            role: None,
            inference_timeout: Duration::from_secs(DEFAULT_INFERENCE_TIMEOUT_SECS),
            retry_count: DEFAULT_RETRY_COUNT,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            alert_webhook: None,
        }
    }
}

fn parse_or_warn<T: FromStr>(env: &dyn Environment, name: &str, default: T) -> T {
    match env.var(name) {
        Some(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "ignoring unparsable setting");
                default
            }
        },
        None => default,
    }
}

impl Settings {
    pub(crate) fn from_env(env: &dyn Environment) -> Settings {
        let defaults = Settings::default();

        Settings {
            role: env.var(ROLE_ENV_VAR),
            inference_timeout: Duration::from_secs(parse_or_warn(
                env,
                INFERENCE_TIMEOUT_ENV_VAR,
                DEFAULT_INFERENCE_TIMEOUT_SECS,
            )),
            retry_count: parse_or_warn(env, RETRY_COUNT_ENV_VAR, defaults.retry_count),
            probe_timeout: Duration::from_secs(parse_or_warn(
                env,
                PROBE_TIMEOUT_ENV_VAR,
                DEFAULT_PROBE_TIMEOUT_SECS,
            )),
            alert_webhook: env.var(ALERT_WEBHOOK_ENV_VAR),
        }
    }
}
