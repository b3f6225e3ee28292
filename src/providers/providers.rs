//! Concrete provider kinds and the adapter lookup table

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::config::catalog::{Catalog, ProviderEntry};
use crate::config::settings::Environment;

use super::anthropic::AnthropicProvider;
use super::google::GoogleProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAIProvider;
use super::{Error, ProviderAdapter};

/// The `ProviderKind` identifies a vendor for which an adapter exists. The catalog
/// refers to providers by name; names that parse to a `ProviderKind` get an
/// adapter, any other name can still be resolved but not invoked.
///
/// The `to_string` and `FromStr` are part of the catalog format and should remain
/// stable.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub(crate) enum ProviderKind {
    Anthropic,
    Google,
    Ollama,
    OpenAI,
}

impl ProviderKind {
    /// Names of every kind with an adapter, comma separated
    pub(crate) fn supported() -> String {
        ProviderKind::iter()
            .map(|kind| kind.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Conventional name of the variable holding the API key
    pub(crate) fn key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Google => Some("GOOGLE_API_KEY"),
            ProviderKind::Ollama => None,
            ProviderKind::OpenAI => Some("OPENAI_API_KEY"),
        }
    }

    /// Conventional name of the variable overriding the API base
    pub(crate) fn base_url_env(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_BASE_URL",
            ProviderKind::Google => "GOOGLE_BASE_URL",
            ProviderKind::Ollama => "OLLAMA_BASE_URL",
            ProviderKind::OpenAI => "OPENAI_BASE_URL",
        }
    }

    /// API base override, read from the variable `entry` declares or else the
    /// conventional one
    pub(crate) fn api_base(&self, entry: Option<&ProviderEntry>, env: &dyn Environment) -> Option<String> {
        lookup(
            env,
            entry.and_then(|e| e.base_url_env.as_ref()),
            Some(self.base_url_env()),
        )
    }
}

fn lookup(env: &dyn Environment, declared: Option<&String>, conventional: Option<&str>) -> Option<String> {
    declared
        .map(|s| s.as_str())
        .or(conventional)
        .and_then(|name| env.var(name))
}

fn build_adapter(
    kind: ProviderKind,
    entry: &ProviderEntry,
    env: &dyn Environment,
) -> Result<Arc<dyn ProviderAdapter>, Error> {
    let api_key = lookup(env, entry.requires_key_env.as_ref(), kind.key_env());
    let api_base = kind.api_base(Some(entry), env);

    let adapter: Arc<dyn ProviderAdapter> = match kind {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(api_key, api_base)?),
        ProviderKind::Google => Arc::new(GoogleProvider::new(api_key, api_base)?),
        ProviderKind::Ollama => match api_base {
            Some(api_base) => Arc::new(OllamaProvider::with_api_base(&api_base)?),
            None => Arc::new(OllamaProvider::new()),
        },
        ProviderKind::OpenAI => Arc::new(OpenAIProvider::new(api_key, api_base)?),
    };

    Ok(adapter)
}

/// Adapters keyed on (lowercased) catalog provider name.
#[derive(Default, Clone)]
pub(crate) struct Adapters {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl Adapters {
    pub(crate) fn new() -> Adapters {
        Adapters::default()
    }

    pub(crate) fn insert(&mut self, name: &str, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(name.to_lowercase(), adapter);
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(&name.to_lowercase())
    }

    /// Build an adapter for every catalog provider with a known kind, reading
    /// credentials and API bases from the variables the catalog names.
    pub(crate) fn from_catalog(catalog: &Catalog, env: &dyn Environment) -> Adapters {
        let mut adapters = Adapters::new();

        for (name, entry) in &catalog.providers {
            let kind = match ProviderKind::from_str(name) {
                Ok(kind) => kind,
                Err(_) => {
                    tracing::debug!(
                        provider = %name,
                        supported = %ProviderKind::supported(),
                        "no adapter for provider"
                    );
                    continue;
                }
            };

            match build_adapter(kind, entry, env) {
                Ok(adapter) => {
                    tracing::debug!(provider = %name, kind = %adapter.kind(), "adapter ready");
                    adapters.insert(name, adapter)
                }
                Err(err) => crate::warn!("provider \"{}\" is not usable: {}", name, err),
            }
        }

        adapters
    }
}
