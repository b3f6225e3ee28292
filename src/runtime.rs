//! Live-call fallback for message-driven callers.
//!
//! Resolution only says which candidate *should* work. The [`Dispatcher`] actually
//! calls it, and when the call fails it excludes that candidate and re-resolves,
//! until a call succeeds, the chain runs dry or the retry budget is spent.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::alert::{exhaustion_alert, Alert, AlertSink};
use crate::config::catalog::Candidate;
use crate::config::settings::Settings;
use crate::providers::providers::{Adapters, ProviderKind};
use crate::providers::{Error as ProviderError, ErrorKind};
use crate::routing::chain::ResolveRequest;
use crate::routing::probe::Availability;
use crate::routing::resolver::{ResolvedTarget, Resolver};
use crate::routing::{self, Attempt, ExhaustedError};

/// A provider call that failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CallFailure {
    pub candidate: Candidate,
    pub error: String,
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.candidate, self.error)
    }
}

fn display_failures(failures: &[CallFailure]) -> String {
    let failures: Vec<String> = failures.iter().map(|f| f.to_string()).collect();

    failures.join("; ")
}

#[derive(Debug, Clone)]
pub(crate) struct Completion {
    pub text: String,
    pub target: ResolvedTarget,
    /// Calls that failed before `target` answered
    pub failures: Vec<CallFailure>,
}

#[derive(Error, Debug)]
pub(crate) enum DispatchError {
    #[error(transparent)]
    Resolution(#[from] routing::Error),
    #[error(
        "every provider call failed for role \"{}\": {}",
        .role.as_deref().unwrap_or("default"),
        display_failures(.failures)
    )]
    CallsFailed {
        role: Option<String>,
        failures: Vec<CallFailure>,
    },
    #[error("dispatch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub(crate) struct Dispatcher {
    resolver: Resolver,
    adapters: Arc<Adapters>,
    sink: Arc<dyn AlertSink>,
    inference_timeout: Duration,
    retry_count: usize,
}

impl Dispatcher {
    pub(crate) fn new(
        resolver: Resolver,
        adapters: Arc<Adapters>,
        sink: Arc<dyn AlertSink>,
        settings: &Settings,
    ) -> Dispatcher {
        Dispatcher {
            resolver,
            adapters,
            sink,
            inference_timeout: settings.inference_timeout,
            retry_count: settings.retry_count,
        }
    }

    async fn invoke(&self, target: &ResolvedTarget, prompt: &str) -> Result<String, ProviderError> {
        let adapter = self.adapters.get(&target.provider).ok_or_else(|| {
            ProviderError::from_source(
                ErrorKind::Unsupported,
                format!(
                    "unsupported provider \"{}\" (adapters exist for {})",
                    target.provider,
                    ProviderKind::supported()
                )
                .into(),
            )
        })?;

        adapter
            .invoke(&target.model, prompt, self.inference_timeout)
            .await
    }

    async fn alert(&self, err: &ExhaustedError, failures: &[CallFailure]) {
        let call_errors: Vec<String> = failures.iter().map(|f| f.to_string()).collect();
        let alert: Alert = exhaustion_alert(err, &call_errors);

        if !self.sink.notify(&alert).await {
            tracing::debug!(title = %alert.title, "alert not delivered");
        }
    }

    /// Send `prompt` to the first candidate that answers.
    ///
    /// Each failed call excludes its candidate for the rest of this request. At most
    /// `retry_count` re-resolutions follow the first attempt. When the request gives
    /// up after probing or calling, the alert sink receives exactly one alert.
    pub(crate) async fn complete(
        &self,
        request: &ResolveRequest,
        prompt: &str,
    ) -> Result<Completion, DispatchError> {
        let mut excluded = HashSet::new();
        let mut failures: Vec<CallFailure> = Vec::new();

        let mut target = match self.resolver.resolve(request).await {
            Ok(target) => target,
            Err(routing::Error::Exhausted(err)) => {
                self.alert(&err, &failures).await;
                return Err(routing::Error::Exhausted(err).into());
            }
            Err(err) => return Err(err.into()),
        };

        loop {
            match self.invoke(&target, prompt).await {
                Ok(text) => {
                    return Ok(Completion {
                        text,
                        target,
                        failures,
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        candidate = %target.candidate(),
                        kind = ?err.kind(),
                        error = %err,
                        "provider call failed"
                    );

                    failures.push(CallFailure {
                        candidate: target.candidate(),
                        error: err.to_string(),
                    });
                    excluded.insert(target.candidate());
                }
            }

            if failures.len() > self.retry_count {
                let err = ExhaustedError {
                    role: target.role.clone(),
                    attempts: failures
                        .iter()
                        .map(|f| Attempt {
                            candidate: f.candidate.clone(),
                            availability: Availability::Excluded,
                        })
                        .collect(),
                };
                self.alert(&err, &failures).await;

                return Err(DispatchError::CallsFailed {
                    role: err.role,
                    failures,
                });
            }

            target = match self.resolver.resolve_excluding(request, &excluded).await {
                Ok(next) => next,
                Err(routing::Error::Exhausted(err)) => {
                    self.alert(&err, &failures).await;

                    return Err(DispatchError::CallsFailed {
                        role: err.role,
                        failures,
                    });
                }
                Err(err) => return Err(err.into()),
            };
        }
    }

    /// Run [`Dispatcher::complete`] on a background task.
    pub(crate) fn spawn_complete(
        self: &Arc<Self>,
        request: ResolveRequest,
        prompt: String,
    ) -> JoinHandle<Result<Completion, DispatchError>> {
        let dispatcher = Arc::clone(self);

        tokio::spawn(async move { dispatcher.complete(&request, &prompt).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::providers::ProviderKind;
    use crate::routing::probe::{CatalogProbe, ProbeMode};
    use crate::routing::resolver::Source;
    use crate::testing::{fixture_catalog, FakeAdapter, RecordingSink};

    struct Harness {
        dispatcher: Arc<Dispatcher>,
        sink: Arc<RecordingSink>,
    }

    fn harness(ollama: Option<FakeAdapter>, openai: Option<FakeAdapter>, retry_count: usize) -> Harness {
        let catalog = Arc::new(fixture_catalog());

        let mut adapters = Adapters::new();
        if let Some(ollama) = ollama {
            adapters.insert("ollama", Arc::new(ollama));
        }
        if let Some(openai) = openai {
            adapters.insert("openai", Arc::new(openai));
        }
        let adapters = Arc::new(adapters);

        let probe = CatalogProbe::new(
            catalog.clone(),
            adapters.clone(),
            ProbeMode::Live,
            Duration::from_secs(1),
        );
        let resolver = Resolver::new(catalog, Arc::new(probe));

        let sink = Arc::new(RecordingSink::new(true));
        let settings = Settings {
            retry_count,
            ..Settings::default()
        };

        Harness {
            dispatcher: Arc::new(Dispatcher::new(resolver, adapters, sink.clone(), &settings)),
            sink,
        }
    }

    fn openai() -> FakeAdapter {
        FakeAdapter::remote(ProviderKind::OpenAI)
    }

    #[tokio::test]
    async fn test_primary_answers() {
        let h = harness(Some(FakeAdapter::local()), Some(openai().reply("hello")), 3);

        let completion = h
            .dispatcher
            .complete(&ResolveRequest::role("worker"), "hi")
            .await
            .unwrap();

        assert_eq!(completion.text, "hello");
        assert_eq!(completion.target.source, Source::Primary);
        assert!(completion.failures.is_empty());
        assert!(h.sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_failed_call_moves_to_next_candidate() {
        let ollama = FakeAdapter::local().reply("from qwen");
        let h = harness(
            Some(ollama),
            Some(openai().failing(ErrorKind::ApiOverloaded)),
            3,
        );

        let completion = h
            .dispatcher
            .complete(&ResolveRequest::role("worker"), "hi")
            .await
            .unwrap();

        assert_eq!(completion.text, "from qwen");
        assert_eq!(completion.target.candidate(), Candidate::new("ollama", "qwen"));
        assert_eq!(completion.target.source, Source::RetryFallback);
        assert_eq!(completion.failures.len(), 1);
        assert_eq!(completion.failures[0].candidate, Candidate::new("openai", "gpt-4o-mini"));
        assert!(h.sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_adapter_counts_as_failed_call() {
        let h = harness(Some(FakeAdapter::local().reply("from qwen")), None, 3);

        let completion = h
            .dispatcher
            .complete(&ResolveRequest::role("worker"), "hi")
            .await
            .unwrap();

        assert_eq!(completion.text, "from qwen");
        assert!(completion.failures[0].error.contains("unsupported provider"));
    }

    #[tokio::test]
    async fn test_every_call_failing_alerts_once() {
        let ollama = FakeAdapter::local().failing(ErrorKind::InternalError);
        let openai = openai().failing(ErrorKind::TimedOut);
        let ollama_calls = ollama.invocations();
        let openai_calls = openai.invocations();
        let h = harness(Some(ollama), Some(openai), 3);

        let err = h
            .dispatcher
            .complete(&ResolveRequest::role("worker"), "hi")
            .await
            .unwrap_err();

        match err {
            DispatchError::CallsFailed { role, failures } => {
                assert_eq!(role.as_deref(), Some("worker"));
                assert_eq!(failures.len(), 2);
            }
            err => panic!("unexpected error: {}", err),
        }

        assert_eq!(ollama_calls.lock().unwrap().len(), 1);
        assert_eq!(openai_calls.lock().unwrap().len(), 1);

        let alerts = h.sink.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Open Fall Triggered");
        assert_eq!(
            alerts[0].details["attempted"],
            serde_json::json!(["openai/gpt-4o-mini", "ollama/qwen", "anthropic/claude-x"])
        );
        assert_eq!(alerts[0].details["call_errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_budget_is_honored() {
        let ollama = FakeAdapter::local();
        let ollama_calls = ollama.invocations();
        let h = harness(Some(ollama), Some(openai().failing(ErrorKind::TimedOut)), 0);

        let err = h
            .dispatcher
            .complete(&ResolveRequest::role("worker"), "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::CallsFailed { ref failures, .. } if failures.len() == 1));
        assert!(ollama_calls.lock().unwrap().is_empty());
        assert_eq!(h.sink.alerts().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_resolution_alerts_without_calling() {
        let ollama = FakeAdapter::local().unreachable();
        let ollama_calls = ollama.invocations();
        let h = harness(Some(ollama), Some(openai()), 3);

        let err = h
            .dispatcher
            .complete(&ResolveRequest::role("ace"), "hi")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Resolution(routing::Error::Exhausted(_))
        ));
        assert!(ollama_calls.lock().unwrap().is_empty());
        assert_eq!(h.sink.alerts().len(), 1);
        assert_eq!(h.sink.alerts()[0].details["role"], "ace");
    }

    #[tokio::test]
    async fn test_caller_input_error_does_not_alert() {
        let h = harness(Some(FakeAdapter::local()), Some(openai()), 3);

        let err = h
            .dispatcher
            .complete(&ResolveRequest::alias("slow"), "hi")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Resolution(routing::Error::Input(_))
        ));
        assert!(h.sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_complete() {
        let h = harness(Some(FakeAdapter::local().reply("background")), Some(openai()), 3);

        let handle = h
            .dispatcher
            .spawn_complete(ResolveRequest::explicit("ollama", "qwen"), "hi".to_string());

        let completion = handle.await.unwrap().unwrap();

        assert_eq!(completion.text, "background");
        assert_eq!(completion.target.source, Source::Explicit);
    }
}
