//! Two-tier availability check for a single candidate.
//!
//! The static tier only consults the catalog. The live tier additionally asks the
//! provider's adapter, and only for providers whose adapter requires it (local
//! runtimes that may simply not be running).

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::catalog::{Candidate, Catalog};
use crate::providers::providers::Adapters;

/// Outcome of probing one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub(crate) enum Availability {
    Usable,
    /// The catalog has no entry for the provider
    UnknownProvider,
    Disabled,
    /// The provider does not list the model
    NotListed,
    Unreachable(String),
    /// Skipped because a call to it already failed for this request
    Excluded,
}

impl Availability {
    pub(crate) fn is_usable(&self) -> bool {
        matches!(self, Availability::Usable)
    }

    pub(crate) fn status(&self) -> &'static str {
        match self {
            Availability::Usable => "usable",
            Availability::UnknownProvider => "unknown_provider",
            Availability::Disabled => "disabled",
            Availability::NotListed => "not_listed",
            Availability::Unreachable(_) => "unreachable",
            Availability::Excluded => "excluded",
        }
    }

    pub(crate) fn reason(&self) -> Option<&str> {
        match self {
            Availability::Unreachable(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Usable => write!(f, "usable"),
            Availability::UnknownProvider => write!(f, "unknown provider"),
            Availability::Disabled => write!(f, "provider disabled"),
            Availability::NotListed => write!(f, "model not listed"),
            Availability::Unreachable(reason) => write!(f, "unreachable: {}", reason),
            Availability::Excluded => write!(f, "excluded after a failed call"),
        }
    }
}

#[async_trait]
pub(crate) trait Probe: Send + Sync {
    async fn check(&self, candidate: &Candidate) -> Availability;
}

/// Catalog-only tier: the provider exists, is enabled and lists the model.
pub(crate) fn check_static(catalog: &Catalog, candidate: &Candidate) -> Availability {
    match catalog.provider(&candidate.provider) {
        None => Availability::UnknownProvider,
        Some(entry) if !entry.enabled => Availability::Disabled,
        Some(entry) if !entry.lists(&candidate.model) => Availability::NotListed,
        Some(_) => Availability::Usable,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeMode {
    /// Never touch the network
    Static,
    /// Confirm reachability for adapters that require it
    Live,
}

/// The production probe, backed by the catalog and the adapter table.
pub(crate) struct CatalogProbe {
    catalog: Arc<Catalog>,
    adapters: Arc<Adapters>,
    mode: ProbeMode,
    timeout: Duration,
}

impl CatalogProbe {
    pub(crate) fn new(
        catalog: Arc<Catalog>,
        adapters: Arc<Adapters>,
        mode: ProbeMode,
        timeout: Duration,
    ) -> CatalogProbe {
        CatalogProbe {
            catalog,
            adapters,
            mode,
            timeout,
        }
    }

    async fn check_live(&self, candidate: &Candidate) -> Availability {
        let adapter = match self.adapters.get(&candidate.provider) {
            Some(adapter) if adapter.requires_live_probe() => adapter,
            _ => return Availability::Usable,
        };

        // The adapter bounds its own requests; this also bounds adapters that don't.
        let probe = adapter.probe(&candidate.model, self.timeout);

        match tokio::time::timeout(self.timeout, probe).await {
            Ok(Ok(())) => Availability::Usable,
            Ok(Err(err)) => Availability::Unreachable(err.to_string()),
            Err(_) => Availability::Unreachable(format!(
                "no response within {}s",
                self.timeout.as_secs_f32()
            )),
        }
    }
}

#[async_trait]
impl Probe for CatalogProbe {
    async fn check(&self, candidate: &Candidate) -> Availability {
        let availability = check_static(&self.catalog, candidate);

        if !availability.is_usable() || self.mode == ProbeMode::Static {
            return availability;
        }

        self.check_live(candidate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture_catalog, FakeAdapter};

    fn probe_with(adapter: FakeAdapter, mode: ProbeMode) -> CatalogProbe {
        let mut adapters = Adapters::new();
        adapters.insert("ollama", Arc::new(adapter));

        CatalogProbe::new(
            Arc::new(fixture_catalog()),
            Arc::new(adapters),
            mode,
            Duration::from_millis(200),
        )
    }

    #[test]
    fn test_static_tier() {
        let catalog = fixture_catalog();

        assert_eq!(
            check_static(&catalog, &Candidate::new("anthropic", "claude-x")),
            Availability::Disabled
        );
        assert_eq!(
            check_static(&catalog, &Candidate::new("ollama", "qwen")),
            Availability::Usable
        );
        assert_eq!(
            check_static(&catalog, &Candidate::new("ollama", "llama")),
            Availability::NotListed
        );
        assert_eq!(
            check_static(&catalog, &Candidate::new("zhipu", "glm")),
            Availability::UnknownProvider
        );
    }

    #[tokio::test]
    async fn test_live_tier_reports_unreachable() {
        let probe = probe_with(FakeAdapter::local().unreachable(), ProbeMode::Live);

        let availability = probe.check(&Candidate::new("ollama", "qwen")).await;

        assert_eq!(availability.status(), "unreachable");
        assert!(availability.reason().is_some());
    }

    #[tokio::test]
    async fn test_static_mode_skips_live_tier() {
        let probe = probe_with(FakeAdapter::local().unreachable(), ProbeMode::Static);

        assert!(probe.check(&Candidate::new("ollama", "qwen")).await.is_usable());
    }

    #[tokio::test]
    async fn test_static_failure_short_circuits() {
        let adapter = FakeAdapter::local();
        let probes = adapter.probes();
        let probe = probe_with(adapter, ProbeMode::Live);

        let availability = probe.check(&Candidate::new("ollama", "llama")).await;

        assert_eq!(availability, Availability::NotListed);
        assert_eq!(probes.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_slow_probe_is_bounded() {
        let probe = probe_with(
            FakeAdapter::local().probe_delay(Duration::from_secs(5)),
            ProbeMode::Live,
        );

        let availability = probe.check(&Candidate::new("ollama", "qwen")).await;

        assert_eq!(availability.status(), "unreachable");
    }

    #[test]
    fn test_availability_serialization() {
        assert_eq!(
            serde_json::to_value(Availability::Unreachable("down".to_string())).unwrap(),
            serde_json::json!({ "status": "unreachable", "reason": "down" })
        );
        assert_eq!(
            serde_json::to_value(Availability::NotListed).unwrap(),
            serde_json::json!({ "status": "not_listed" })
        );
    }
}
