//! Fakes shared by the unit tests of several modules.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::alert::{Alert, AlertSink};
use crate::config::catalog::{Candidate, Catalog};
use crate::config::{parse_catalog, Format};
use crate::providers::providers::ProviderKind;
use crate::providers::{Error, ErrorKind, ProviderAdapter};
use crate::routing::chain::ResolveRequest;
use crate::routing::observer::ResolveObserver;
use crate::routing::probe::{Availability, Probe};
use crate::routing::resolver::ResolvedTarget;
use crate::routing::{Attempt, ExhaustedError};

/// Anthropic is disabled, Ollama serves `qwen`, OpenAI serves `gpt-4o-mini`.
pub(crate) const FIXTURE_CATALOG: &str = r#"
[providers.anthropic]
enabled = false
models = ["claude-x"]
requires_key_env = "ANTHROPIC_API_KEY"

[providers.ollama]
enabled = true
models = ["qwen"]

[providers.openai]
enabled = true
models = ["gpt-4o-mini"]
requires_key_env = "OPENAI_API_KEY"

[roles.ace]
primary = { provider = "anthropic", model = "claude-x" }
fallbacks = [{ provider = "ollama", model = "qwen" }]

[roles.worker]
primary = { provider = "openai", model = "gpt-4o-mini" }
fallbacks = [
  { provider = "ollama", model = "qwen" },
  { provider = "ollama", model = "qwen" },
  { provider = "anthropic", model = "claude-x" },
]

[aliases.fast]
provider = "ollama"
model = "qwen"

[aliases.smart]
provider = "anthropic"
model = "claude-x"

[defaults]
role = "ace"
"#;

impl ResolveRequest {
    pub(crate) fn explicit(provider: &str, model: &str) -> ResolveRequest {
        ResolveRequest::new(None, Some(provider.to_string()), Some(model.to_string()), None)
    }

    pub(crate) fn alias(alias: &str) -> ResolveRequest {
        ResolveRequest::new(None, None, None, Some(alias.to_string()))
    }

    pub(crate) fn with_role(self, role: &str) -> ResolveRequest {
        ResolveRequest::new(Some(role.to_string()), self.provider, self.model, self.alias)
    }
}

pub(crate) fn catalog_from_toml(raw: &str) -> Catalog {
    parse_catalog(raw, Format::Toml, Path::new("test.toml")).unwrap()
}

pub(crate) fn fixture_catalog() -> Catalog {
    catalog_from_toml(FIXTURE_CATALOG)
}

/// Scriptable adapter that counts what it is asked to do
#[derive(Clone)]
pub(crate) struct FakeAdapter {
    kind: ProviderKind,
    live: bool,
    reachable: bool,
    probe_delay: Option<Duration>,
    reply: Result<String, ErrorKind>,
    verify: Result<(), ErrorKind>,
    probes: Arc<AtomicUsize>,
    invocations: Arc<Mutex<Vec<String>>>,
}

impl FakeAdapter {
    /// A local runtime that needs a live probe
    pub(crate) fn local() -> FakeAdapter {
        FakeAdapter {
            kind: ProviderKind::Ollama,
            live: true,
            reachable: true,
            probe_delay: None,
            reply: Ok("ok".to_string()),
            verify: Ok(()),
            probes: Arc::new(AtomicUsize::new(0)),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn remote(kind: ProviderKind) -> FakeAdapter {
        FakeAdapter {
            kind,
            live: false,
            ..FakeAdapter::local()
        }
    }

    pub(crate) fn unreachable(mut self) -> FakeAdapter {
        self.reachable = false;
        self.verify = Err(ErrorKind::Connection);
        self
    }

    pub(crate) fn probe_delay(mut self, delay: Duration) -> FakeAdapter {
        self.probe_delay = Some(delay);
        self
    }

    pub(crate) fn reply(mut self, text: &str) -> FakeAdapter {
        self.reply = Ok(text.to_string());
        self
    }

    pub(crate) fn failing(mut self, kind: ErrorKind) -> FakeAdapter {
        self.reply = Err(kind);
        self
    }

    pub(crate) fn rejecting_credentials(mut self) -> FakeAdapter {
        self.verify = Err(ErrorKind::Authentication);
        self
    }

    pub(crate) fn probes(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.probes)
    }

    pub(crate) fn invocations(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.invocations)
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn requires_live_probe(&self) -> bool {
        self.live
    }

    async fn probe(&self, _model: &str, _timeout: Duration) -> Result<(), Error> {
        self.probes.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }

        if self.reachable {
            Ok(())
        } else {
            Err(Error::from_source(
                ErrorKind::Connection,
                "connection refused".into(),
            ))
        }
    }

    async fn verify(&self, _timeout: Duration) -> Result<(), Error> {
        self.verify.map_err(Error::from_kind)
    }

    async fn invoke(&self, model: &str, _prompt: &str, _timeout: Duration) -> Result<String, Error> {
        self.invocations.lock().unwrap().push(model.to_string());

        self.reply.clone().map_err(Error::from_kind)
    }
}

/// Probe answering from a fixed table; anything not in the table is usable.
#[derive(Default)]
pub(crate) struct ScriptedProbe {
    answers: HashMap<Candidate, Availability>,
    probed: Mutex<Vec<Candidate>>,
}

impl ScriptedProbe {
    pub(crate) fn with(mut self, provider: &str, model: &str, availability: Availability) -> Self {
        self.answers
            .insert(Candidate::new(provider, model), availability);
        self
    }

    pub(crate) fn probed(&self) -> Vec<Candidate> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn check(&self, candidate: &Candidate) -> Availability {
        self.probed.lock().unwrap().push(candidate.clone());

        self.answers
            .get(candidate)
            .cloned()
            .unwrap_or(Availability::Usable)
    }
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ResolveObserver for RecordingObserver {
    fn probed(&self, _role: Option<&str>, index: usize, attempt: &Attempt) {
        self.record(format!("probed {} {} {}", index, attempt.candidate, attempt.availability.status()));
    }

    fn resolved(&self, target: &ResolvedTarget) {
        self.record(format!("resolved {} {}", target.candidate(), target.source));
    }

    fn exhausted(&self, err: &ExhaustedError) {
        self.record(format!("exhausted {}", err.attempts.len()));
    }
}

pub(crate) struct RecordingSink {
    delivered: bool,
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingSink {
    pub(crate) fn new(delivered: bool) -> RecordingSink {
        RecordingSink {
            delivered,
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn notify(&self, alert: &Alert) -> bool {
        self.alerts.lock().unwrap().push(alert.clone());
        self.delivered
    }
}
