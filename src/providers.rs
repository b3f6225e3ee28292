//! Provider adapters: the only code that talks to a model vendor.
//!
//! Each vendor (e.g., Anthropic or Ollama) implements the [`ProviderAdapter`] trait.
//! Adapters are selected by provider name through the [`providers::Adapters`] lookup
//! table, so adding a vendor means adding one adapter and one
//! [`providers::ProviderKind`] variant. An adapter supports three operations:
//! - Probe: a cheap, bounded check that the provider can serve a model right now. Only
//!   adapters for local runtimes require this before a request is routed to them.
//! - Verify: a check that the endpoint is reachable and the credentials are accepted,
//!   used by preflight validation.
//! - Invoke: send a single prompt to a model and return the generated text.
//!
//! ## Error Handling
//!
//! Each API has its own bespoke error systems. Providers each have their own error
//! types. These are encapsulated in [`Error`], and the [`ErrorKind`] enum provides an
//! indication of the category of error that was raised.

mod anthropic;
mod apireq;
mod google;
mod ollama;
mod openai;

pub(crate) mod providers;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use self::providers::ProviderKind;

pub(crate) use self::ollama::OllamaProvider;

/// This is a list specifying general categories of errors that
/// can be returned by a [`ProviderAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// Failed to connect to the underlying API service.
    /// This could be due to network issues like DNS
    /// resolution, connectivity issues, or routing problems.
    Connection,
    /// A request timed out.
    TimedOut,
    /// An API key was not provided or service-specific
    /// permissions are needed.
    Authentication,
    /// A rate limit was reached or a quota was exceeded.
    ExcessUsage,
    /// The servers are overloaded. This is non-fatal
    /// and indicates that a retry may be needed later.
    ApiOverloaded,
    /// The requested resource was not found. This likely means that
    /// the model requested by the user was not found.
    NotFound,
    /// The request was malformed or is otherwise improper.
    BadRequest,
    /// The server encountered an error.
    InternalError,
    /// An API response was unable to be deserialized, malformed,
    /// or otherwise violated the assumptions of the client.
    UnexpectedResponse,
    /// No adapter exists for the named provider.
    Unsupported,
    /// An error that does not fit into any of the other categories.
    UnspecifiedError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub(crate) fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            source: Some(source),
        }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Connection => "failed to connect to the API service",
            ErrorKind::TimedOut => "request timed out",
            ErrorKind::Authentication => "authentication failed or not provided",
            ErrorKind::ExcessUsage => "rate limit exceeded or quota crossed",
            ErrorKind::ApiOverloaded => "API server(s) are currently overloaded",
            ErrorKind::NotFound => "the requested resource was not found",
            ErrorKind::BadRequest => "the request was bad or malformed",
            ErrorKind::InternalError => "the server encountered an internal error",
            ErrorKind::UnexpectedResponse => "API response was unexpected or malformed",
            ErrorKind::Unsupported => "no adapter exists for this provider",
            ErrorKind::UnspecifiedError => "an unspecified error occurred",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message(), source),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

/// A trait implemented by all provider adapters.
#[async_trait]
pub(crate) trait ProviderAdapter: Send + Sync {
    /// Returns the provider kind.
    fn kind(&self) -> ProviderKind;

    /// Whether a reachable endpoint must be confirmed before routing to this
    /// provider.
    fn requires_live_probe(&self) -> bool {
        false
    }

    /// Confirms that `model` can be served right now. Adapters that do not need
    /// a live probe accept every model the catalog lists.
    async fn probe(&self, _model: &str, _timeout: Duration) -> Result<(), Error> {
        Ok(())
    }

    /// Confirms the endpoint is reachable and accepts the configured credentials.
    async fn verify(&self, timeout: Duration) -> Result<(), Error>;

    /// Sends `prompt` to `model` and returns the generated text.
    async fn invoke(&self, model: &str, prompt: &str, timeout: Duration) -> Result<String, Error>;
}

/// Collapses the text blocks of a response into a single reply.
pub(crate) fn join_text<'a, I: IntoIterator<Item = &'a str>>(blocks: I) -> String {
    let blocks: Vec<&str> = blocks.into_iter().filter(|b| !b.is_empty()).collect();
    let joined = blocks.join("\n");
    let joined = joined.trim();

    if joined.is_empty() {
        "(No content returned.)".to_string()
    } else {
        joined.to_string()
    }
}
