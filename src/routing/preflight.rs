//! Startup readiness checks.
//!
//! A preflight collects every problem it finds instead of stopping at the first one,
//! so an operator sees the whole picture at once. It never fails itself: an empty
//! issue list means the process is ready to serve traffic.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::config::settings::Environment;
use crate::providers::providers::Adapters;

use super::chain::ResolveRequest;
use super::probe::ProbeMode;
use super::resolver::Resolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum Issue {
    MissingEnv { provider: String, var: String },
    Unreachable { provider: String, reason: String },
    CredentialsRejected { provider: String, reason: String },
    RoleUnresolved { role: String, reason: String },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MissingEnv { provider, var } => {
                write!(f, "Provider '{}' enabled but missing env '{}'.", provider, var)
            }
            Issue::Unreachable { provider, reason } => {
                write!(f, "Provider '{}' is unreachable: {}", provider, reason)
            }
            Issue::CredentialsRejected { provider, reason } => {
                write!(f, "Provider '{}' rejected its credentials: {}", provider, reason)
            }
            Issue::RoleUnresolved { role, reason } => {
                write!(f, "Role '{}' failed resolution: {}", role, reason)
            }
        }
    }
}

pub(crate) struct Preflight<'a> {
    resolver: &'a Resolver,
    adapters: &'a Adapters,
    env: &'a dyn Environment,
    mode: ProbeMode,
    timeout: Duration,
    check_credentials: bool,
}

impl<'a> Preflight<'a> {
    /// `mode` should match the probe mode of `resolver`.
    pub(crate) fn new(
        resolver: &'a Resolver,
        adapters: &'a Adapters,
        env: &'a dyn Environment,
        mode: ProbeMode,
        timeout: Duration,
    ) -> Preflight<'a> {
        Preflight {
            resolver,
            adapters,
            env,
            mode,
            timeout,
            check_credentials: false,
        }
    }

    /// Also ask each remote provider to accept its credentials.
    pub(crate) fn check_credentials(mut self, check: bool) -> Preflight<'a> {
        self.check_credentials = check;
        self
    }

    pub(crate) async fn validate(&self) -> Vec<Issue> {
        let mut issues = self.check_env();

        let missing: HashSet<String> = issues
            .iter()
            .filter_map(|issue| match issue {
                Issue::MissingEnv { provider, .. } => Some(provider.clone()),
                _ => None,
            })
            .collect();

        issues.extend(self.check_providers(&missing).await);
        issues.extend(self.check_roles().await);

        issues
    }

    fn check_env(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        for (provider, entry) in self.resolver.catalog().enabled_providers() {
            for var in entry.env_refs() {
                if self.env.var(var).is_none() {
                    issues.push(Issue::MissingEnv {
                        provider: provider.to_string(),
                        var: var.to_string(),
                    });
                }
            }
        }

        issues
    }

    /// Providers already missing configuration are not contacted.
    async fn check_providers(&self, missing: &HashSet<String>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for (provider, _) in self.resolver.catalog().enabled_providers() {
            if missing.contains(provider) {
                continue;
            }

            let adapter = match self.adapters.get(provider) {
                Some(adapter) => adapter,
                None => continue,
            };

            let live = adapter.requires_live_probe();

            let wanted = if live {
                self.mode == ProbeMode::Live
            } else {
                self.check_credentials
            };

            if !wanted {
                continue;
            }

            if let Err(err) = adapter.verify(self.timeout).await {
                let provider = provider.to_string();
                let reason = err.to_string();

                issues.push(if live {
                    Issue::Unreachable { provider, reason }
                } else {
                    Issue::CredentialsRejected { provider, reason }
                });
            }
        }

        issues
    }

    async fn check_roles(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        for role in self.resolver.catalog().roles.keys() {
            if let Err(err) = self.resolver.resolve(&ResolveRequest::role(role)).await {
                issues.push(Issue::RoleUnresolved {
                    role: role.clone(),
                    reason: err.to_string(),
                });
            }
        }

        issues
    }
}
