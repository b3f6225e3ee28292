//! Typed view over the provider/role catalog.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A concrete (provider, model) pair.
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
}

impl Candidate {
    pub(crate) fn new<P: Into<String>, M: Into<String>>(provider: P, model: M) -> Candidate {
        Candidate {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Both halves of the pair are present
    pub(crate) fn is_complete(&self) -> bool {
        !self.provider.trim().is_empty() && !self.model.trim().is_empty()
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct ProviderEntry {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub models: BTreeSet<String>,
    #[serde(default)]
    pub requires_key_env: Option<String>,
    #[serde(default)]
    pub base_url_env: Option<String>,
    #[serde(default)]
    pub auth_env: Vec<String>,
}

impl ProviderEntry {
    pub(crate) fn lists(&self, model: &str) -> bool {
        self.models.contains(model)
    }

    /// Every environment variable this entry refers to, in declaration order
    pub(crate) fn env_refs(&self) -> impl Iterator<Item = &str> {
        self.requires_key_env
            .iter()
            .chain(self.base_url_env.iter())
            .chain(self.auth_env.iter())
            .map(|s| s.as_str())
    }
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct RolePolicy {
    #[serde(default)]
    pub primary: Candidate,
    #[serde(default)]
    pub fallbacks: Vec<Candidate>,
}

fn default_explicit_fallbacks() -> bool {
    true
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub(crate) struct Defaults {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Whether explicit and aliased requests inherit the role's fallbacks
    #[serde(default = "default_explicit_fallbacks")]
    pub explicit_fallbacks: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            role: None,
            provider: None,
            model: None,
            explicit_fallbacks: default_explicit_fallbacks(),
        }
    }
}

impl Defaults {
    pub(crate) fn candidate(&self) -> Option<Candidate> {
        match (&self.provider, &self.model) {
            (Some(provider), Some(model)) => {
                let candidate = Candidate::new(provider.as_str(), model.as_str());

                candidate.is_complete().then_some(candidate)
            }
            _ => None,
        }
    }
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub(crate) struct Catalog {
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderEntry>,
    #[serde(default)]
    pub roles: BTreeMap<String, RolePolicy>,
    #[serde(default)]
    pub aliases: BTreeMap<String, Candidate>,
    #[serde(default)]
    pub defaults: Defaults,
}

impl Catalog {
    pub(crate) fn provider(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers.get(name)
    }

    pub(crate) fn role(&self, name: &str) -> Option<&RolePolicy> {
        self.roles.get(name)
    }

    pub(crate) fn alias(&self, name: &str) -> Option<&Candidate> {
        self.aliases.get(name)
    }

    pub(crate) fn enabled_providers(&self) -> impl Iterator<Item = (&str, &ProviderEntry)> {
        self.providers
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(name, entry)| (name.as_str(), entry))
    }
}
