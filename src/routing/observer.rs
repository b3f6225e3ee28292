//! Hook for observing a resolution as it walks the chain.

use super::resolver::ResolvedTarget;
use super::{Attempt, ExhaustedError};

/// Receives one event per visited chain entry and one terminal event.
pub(crate) trait ResolveObserver: Send + Sync {
    fn probed(&self, _role: Option<&str>, _index: usize, _attempt: &Attempt) {}

    fn resolved(&self, _target: &ResolvedTarget) {}

    fn exhausted(&self, _err: &ExhaustedError) {}
}

/// Emits resolution events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingObserver;

impl ResolveObserver for TracingObserver {
    fn probed(&self, role: Option<&str>, index: usize, attempt: &Attempt) {
        if attempt.availability.is_usable() {
            tracing::debug!(
                role = role.unwrap_or("-"),
                index,
                candidate = %attempt.candidate,
                "candidate usable"
            );
        } else {
            tracing::info!(
                role = role.unwrap_or("-"),
                index,
                candidate = %attempt.candidate,
                status = attempt.availability.status(),
                reason = attempt.availability.reason().unwrap_or(""),
                "candidate unavailable, trying next"
            );
        }
    }

    fn resolved(&self, target: &ResolvedTarget) {
        tracing::info!(
            role = target.role.as_deref().unwrap_or("-"),
            provider = %target.provider,
            model = %target.model,
            source = %target.source,
            "resolved model"
        );
    }

    fn exhausted(&self, err: &ExhaustedError) {
        tracing::warn!(
            role = err.role.as_deref().unwrap_or("-"),
            attempts = err.attempts.len(),
            "{}",
            err
        );
    }
}
