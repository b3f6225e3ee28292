//! Role-aware resolution of a (provider, model) pair.
//!
//! A caller asks for a role (`ace`, `worker`, ...), an alias, or an explicit
//! provider/model pair. The [`chain`] module turns the request into an ordered
//! candidate chain: the requested candidate first, followed by the fallbacks the
//! operator declared for the role. The [`resolver::Resolver`] walks the chain in
//! order, asks a [`probe::Probe`] whether each candidate is usable, and returns the
//! first usable one tagged with where it came from:
//!
//! ```text
//! explicit       the pair the caller named (directly or through an alias)
//! primary        the role's primary, or the catalog's default pair
//! fallback_N     the N-th declared fallback of the role
//! retry_fallback chosen after a live provider call failed
//! ```
//!
//! The chain order encodes operator preference and is never reordered. When every
//! candidate is unusable the resolver reports [`ExhaustedError`] with the list of
//! attempts; alerting operators is left to the caller.
//!
//! [`preflight::Preflight`] runs the same machinery for every declared role, without
//! raising, to decide whether the process is ready to serve traffic.

pub(crate) mod chain;
pub(crate) mod observer;
pub(crate) mod preflight;
pub(crate) mod probe;
pub(crate) mod resolver;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use thiserror::Error;

use crate::config::catalog::Candidate;
use crate::config::ConfigError;

use self::probe::Availability;

/// The request itself is incomplete or refers to something that does not exist.
/// Rejected before any candidate is probed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallerInputError {
    #[error("provide both a provider and a model when selecting a model explicitly")]
    PartialExplicit,
    #[error("unknown alias \"{0}\"")]
    UnknownAlias(String),
    #[error("unknown role \"{0}\"")]
    UnknownRole(String),
}

/// One visited entry of a candidate chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attempt {
    pub candidate: Candidate,
    pub availability: Availability,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.candidate, self.availability)
    }
}

impl Serialize for Attempt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Attempt", 4)?;
        state.serialize_field("provider", &self.candidate.provider)?;
        state.serialize_field("model", &self.candidate.model)?;
        state.serialize_field("status", self.availability.status())?;
        state.serialize_field("reason", &self.availability.reason())?;
        state.end()
    }
}

/// Every candidate in the chain was unusable or excluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExhaustedError {
    pub role: Option<String>,
    pub attempts: Vec<Attempt>,
}

impl ExhaustedError {
    pub(crate) fn attempted(&self) -> impl Iterator<Item = &Candidate> {
        self.attempts.iter().map(|a| &a.candidate)
    }
}

impl fmt::Display for ExhaustedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.role {
            Some(role) => write!(f, "all candidates exhausted for role \"{}\"", role)?,
            None => write!(f, "all candidates exhausted")?,
        }

        let attempts: Vec<String> = self.attempts.iter().map(|a| a.to_string()).collect();

        write!(f, ": {}", attempts.join(", "))
    }
}

impl std::error::Error for ExhaustedError {}

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] CallerInputError),
    #[error(transparent)]
    Exhausted(#[from] ExhaustedError),
    /// Neither the request nor the catalog names anything to resolve
    #[error("no role selected, and the catalog declares no default role or default provider/model")]
    NoTarget,
}
