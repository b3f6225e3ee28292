use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::config::catalog::{Candidate, Catalog};

use super::chain::{self, CandidateChain, ResolveRequest};
use super::observer::{ResolveObserver, TracingObserver};
use super::probe::{Availability, Probe};
use super::{Attempt, Error, ExhaustedError};

/// Where a resolved target came from. The string forms are part of the CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    Explicit,
    Primary,
    /// 1-based position in the role's declared fallbacks
    Fallback(usize),
    /// Chosen after a provider call failed
    RetryFallback,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Explicit => write!(f, "explicit"),
            Source::Primary => write!(f, "primary"),
            Source::Fallback(n) => write!(f, "fallback_{}", n),
            Source::RetryFallback => write!(f, "retry_fallback"),
        }
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ResolvedTarget {
    pub provider: String,
    pub model: String,
    pub role: Option<String>,
    pub source: Source,
}

impl ResolvedTarget {
    pub(crate) fn candidate(&self) -> Candidate {
        Candidate::new(self.provider.as_str(), self.model.as_str())
    }
}

/// Walks candidate chains. Cheap to clone and safe to share between tasks; it holds
/// no per-request state.
#[derive(Clone)]
pub(crate) struct Resolver {
    catalog: Arc<Catalog>,
    probe: Arc<dyn Probe>,
    observer: Arc<dyn ResolveObserver>,
}

impl Resolver {
    pub(crate) fn new(catalog: Arc<Catalog>, probe: Arc<dyn Probe>) -> Resolver {
        Resolver {
            catalog,
            probe,
            observer: Arc::new(TracingObserver),
        }
    }

    pub(crate) fn with_observer(mut self, observer: Arc<dyn ResolveObserver>) -> Resolver {
        self.observer = observer;
        self
    }

    pub(crate) fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The chain `request` would walk, without probing anything
    pub(crate) fn chain(&self, request: &ResolveRequest) -> Result<CandidateChain, Error> {
        chain::build(&self.catalog, request)
    }

    /// Return the first usable candidate of the request's chain.
    pub(crate) async fn resolve(&self, request: &ResolveRequest) -> Result<ResolvedTarget, Error> {
        let chain = self.chain(request)?;

        self.walk(&chain, &HashSet::new()).await
    }

    /// Like [`Resolver::resolve`], but treat the `excluded` candidates as unusable.
    /// Used after a call to a resolved target failed; a target found this way is
    /// tagged [`Source::RetryFallback`].
    pub(crate) async fn resolve_excluding(
        &self,
        request: &ResolveRequest,
        excluded: &HashSet<Candidate>,
    ) -> Result<ResolvedTarget, Error> {
        let chain = self.chain(request)?;

        self.walk(&chain, excluded).await
    }

    async fn walk(
        &self,
        chain: &CandidateChain,
        excluded: &HashSet<Candidate>,
    ) -> Result<ResolvedTarget, Error> {
        let mut attempts = Vec::with_capacity(chain.entries().len());

        for entry in chain.entries() {
            let availability = if excluded.contains(&entry.candidate) {
                Availability::Excluded
            } else {
                self.probe.check(&entry.candidate).await
            };

            let attempt = Attempt {
                candidate: entry.candidate.clone(),
                availability,
            };

            self.observer.probed(chain.role(), entry.index, &attempt);

            let usable = attempt.availability.is_usable();
            attempts.push(attempt);

            if usable {
                let source = if excluded.is_empty() {
                    chain.source_of(entry)
                } else {
                    Source::RetryFallback
                };

                let target = ResolvedTarget {
                    provider: entry.candidate.provider.clone(),
                    model: entry.candidate.model.clone(),
                    role: chain.role().map(|r| r.to_string()),
                    source,
                };

                self.observer.resolved(&target);

                return Ok(target);
            }
        }

        let err = ExhaustedError {
            role: chain.role().map(|r| r.to_string()),
            attempts,
        };

        self.observer.exhausted(&err);

        Err(err.into())
    }
}
