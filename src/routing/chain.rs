//! Construction of the ordered candidate chain for a request.

use std::collections::HashSet;

use crate::config::catalog::{Candidate, Catalog, RolePolicy};
use crate::config::ConfigError;

use super::resolver::Source;
use super::{CallerInputError, Error};

/// What the caller asked for. Blank strings count as absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ResolveRequest {
    pub role: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub alias: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ResolveRequest {
    pub(crate) fn new(
        role: Option<String>,
        provider: Option<String>,
        model: Option<String>,
        alias: Option<String>,
    ) -> ResolveRequest {
        ResolveRequest {
            role: non_blank(role),
            provider: non_blank(provider),
            model: non_blank(model),
            alias: non_blank(alias),
        }
    }

    pub(crate) fn role(role: &str) -> ResolveRequest {
        ResolveRequest::new(Some(role.to_string()), None, None, None)
    }

    /// An alias wins over everything else. A model without a provider is read as
    /// an alias name. A provider without a model is always rejected.
    fn target(&self) -> Result<Target<'_>, CallerInputError> {
        match (&self.provider, &self.model, &self.alias) {
            (_, _, Some(alias)) => Ok(Target::Alias(alias)),
            (Some(provider), Some(model), None) => {
                Ok(Target::Explicit(Candidate::new(provider.as_str(), model.as_str())))
            }
            (None, Some(alias), None) => Ok(Target::Alias(alias)),
            (None, None, None) => Ok(Target::Role),
            (Some(_), None, None) => Err(CallerInputError::PartialExplicit),
        }
    }
}

enum Target<'a> {
    Explicit(Candidate),
    Alias(&'a str),
    Role,
}

/// How the first chain entry was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    /// Named by the caller, directly or through an alias
    Explicit,
    /// A role's primary
    Primary,
    /// The catalog's default pair
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChainEntry {
    /// 0 for the requested candidate, otherwise the 1-based position in the role's
    /// declared fallbacks
    pub index: usize,
    pub candidate: Candidate,
}

/// The requested candidate followed by its deduplicated fallbacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CandidateChain {
    role: Option<String>,
    kind: RequestKind,
    entries: Vec<ChainEntry>,
}

impl CandidateChain {
    fn assemble<'c, I>(role: Option<&str>, kind: RequestKind, requested: Candidate, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = &'c Candidate>,
    {
        let mut seen = HashSet::new();
        seen.insert(requested.clone());

        let mut entries = vec![ChainEntry {
            index: 0,
            candidate: requested,
        }];

        for (i, fallback) in fallbacks.into_iter().enumerate() {
            if !fallback.is_complete() {
                tracing::debug!(index = i + 1, "skipping incomplete fallback");
                continue;
            }

            if seen.insert(fallback.clone()) {
                entries.push(ChainEntry {
                    index: i + 1,
                    candidate: fallback.clone(),
                });
            }
        }

        CandidateChain {
            role: role.map(|r| r.to_string()),
            kind,
            entries,
        }
    }

    pub(crate) fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub(crate) fn kind(&self) -> RequestKind {
        self.kind
    }

    pub(crate) fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub(crate) fn source_of(&self, entry: &ChainEntry) -> Source {
        match (entry.index, self.kind) {
            (0, RequestKind::Explicit) => Source::Explicit,
            (0, _) => Source::Primary,
            (n, _) => Source::Fallback(n),
        }
    }
}

#[derive(Clone, Copy)]
enum RoleOrigin {
    Request,
    Default,
}

fn effective_role<'r>(catalog: &'r Catalog, request: &'r ResolveRequest) -> Option<(&'r str, RoleOrigin)> {
    match (&request.role, &catalog.defaults.role) {
        (Some(role), _) => Some((role.as_str(), RoleOrigin::Request)),
        (None, Some(role)) => Some((role.as_str(), RoleOrigin::Default)),
        (None, None) => None,
    }
}

fn policy<'c>(catalog: &'c Catalog, name: &str, origin: RoleOrigin) -> Result<&'c RolePolicy, Error> {
    catalog.role(name).ok_or_else(|| match origin {
        RoleOrigin::Request => CallerInputError::UnknownRole(name.to_string()).into(),
        RoleOrigin::Default => ConfigError::UnknownDefaultRole(name.to_string()).into(),
    })
}

fn explicit_chain(
    catalog: &Catalog,
    request: &ResolveRequest,
    requested: Candidate,
) -> Result<CandidateChain, Error> {
    let role = effective_role(catalog, request);

    let fallbacks: &[Candidate] = match role {
        Some((name, origin)) => {
            let policy = policy(catalog, name, origin)?;
            if catalog.defaults.explicit_fallbacks {
                &policy.fallbacks[..]
            } else {
                &[]
            }
        }
        None => &[],
    };

    Ok(CandidateChain::assemble(
        role.map(|(name, _)| name),
        RequestKind::Explicit,
        requested,
        fallbacks,
    ))
}

/// Build the chain for `request`.
///
/// Precedence: an alias, then an explicit pair, then the requested (or default)
/// role's primary, then the catalog's default pair. A requested role must exist
/// even when explicit pairs do not inherit its fallbacks.
pub(crate) fn build(catalog: &Catalog, request: &ResolveRequest) -> Result<CandidateChain, Error> {
    match request.target()? {
        Target::Explicit(candidate) => explicit_chain(catalog, request, candidate),
        Target::Alias(name) => {
            let candidate = catalog
                .alias(name)
                .ok_or_else(|| CallerInputError::UnknownAlias(name.to_string()))?;

            if !candidate.is_complete() {
                return Err(ConfigError::InvalidAlias(name.to_string()).into());
            }

            explicit_chain(catalog, request, candidate.clone())
        }
        Target::Role => {
            if let Some((name, origin)) = effective_role(catalog, request) {
                let policy = policy(catalog, name, origin)?;

                if !policy.primary.is_complete() {
                    return Err(ConfigError::InvalidRole(name.to_string()).into());
                }

                return Ok(CandidateChain::assemble(
                    Some(name),
                    RequestKind::Primary,
                    policy.primary.clone(),
                    &policy.fallbacks,
                ));
            }

            match catalog.defaults.candidate() {
                Some(candidate) => Ok(CandidateChain::assemble(
                    None,
                    RequestKind::Default,
                    candidate,
                    &[],
                )),
                None => Err(Error::NoTarget),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{catalog_from_toml, fixture_catalog};

    fn candidates(chain: &CandidateChain) -> Vec<(usize, String)> {
        chain
            .entries()
            .iter()
            .map(|e| (e.index, e.candidate.to_string()))
            .collect()
    }

    #[test]
    fn test_role_chain_drops_duplicates_but_keeps_indices() {
        let chain = build(&fixture_catalog(), &ResolveRequest::role("worker")).unwrap();

        assert_eq!(chain.kind(), RequestKind::Primary);
        assert_eq!(chain.role(), Some("worker"));
        assert_eq!(
            candidates(&chain),
            [
                (0, "openai/gpt-4o-mini".to_string()),
                (1, "ollama/qwen".to_string()),
                (3, "anthropic/claude-x".to_string()),
            ]
        );
        assert_eq!(chain.source_of(&chain.entries()[2]), Source::Fallback(3));
    }

    #[test]
    fn test_default_role_is_used() {
        let chain = build(&fixture_catalog(), &ResolveRequest::default()).unwrap();

        assert_eq!(chain.role(), Some("ace"));
        assert_eq!(&chain.entries()[0].candidate, &Candidate::new("anthropic", "claude-x"));
    }

    #[test]
    fn test_explicit_pair_inherits_role_fallbacks() {
        let request = ResolveRequest::explicit("openai", "gpt-4o-mini").with_role("ace");
        let chain = build(&fixture_catalog(), &request).unwrap();

        assert_eq!(chain.kind(), RequestKind::Explicit);
        assert_eq!(chain.source_of(&chain.entries()[0]), Source::Explicit);
        assert_eq!(
            candidates(&chain),
            [
                (0, "openai/gpt-4o-mini".to_string()),
                (1, "ollama/qwen".to_string()),
            ]
        );
    }

    #[test]
    fn test_explicit_pair_dedupes_against_fallbacks() {
        let chain = build(&fixture_catalog(), &ResolveRequest::explicit("ollama", "qwen")).unwrap();

        assert_eq!(candidates(&chain), [(0, "ollama/qwen".to_string())]);
    }

    #[test]
    fn test_explicit_fallbacks_can_be_disabled() {
        let mut catalog = fixture_catalog();
        catalog.defaults.explicit_fallbacks = false;

        let chain = build(&catalog, &ResolveRequest::alias("smart")).unwrap();

        assert_eq!(candidates(&chain), [(0, "anthropic/claude-x".to_string())]);
    }

    #[test]
    fn test_alias_wins_over_explicit_pair() {
        let request = ResolveRequest::new(
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            Some("fast".to_string()),
        );
        let chain = build(&fixture_catalog(), &request).unwrap();

        assert_eq!(chain.kind(), RequestKind::Explicit);
        assert_eq!(&chain.entries()[0].candidate, &Candidate::new("ollama", "qwen"));
        assert!(!chain
            .entries()
            .iter()
            .any(|e| e.candidate == Candidate::new("openai", "gpt-4o-mini")));
    }

    #[test]
    fn test_unknown_role_is_rejected_without_explicit_fallbacks() {
        let mut catalog = fixture_catalog();
        catalog.defaults.explicit_fallbacks = false;

        let request = ResolveRequest::explicit("ollama", "qwen").with_role("janitor");
        assert!(matches!(
            build(&catalog, &request),
            Err(Error::Input(CallerInputError::UnknownRole(name))) if name == "janitor"
        ));

        let known = ResolveRequest::explicit("ollama", "qwen").with_role("worker");
        let chain = build(&catalog, &known).unwrap();
        assert_eq!(chain.role(), Some("worker"));
        assert_eq!(candidates(&chain), [(0, "ollama/qwen".to_string())]);
    }

    #[test]
    fn test_model_only_is_an_alias() {
        let request = ResolveRequest::new(None, None, Some("fast".to_string()), None);
        let chain = build(&fixture_catalog(), &request).unwrap();

        assert_eq!(&chain.entries()[0].candidate, &Candidate::new("ollama", "qwen"));
    }

    #[test]
    fn test_caller_input_errors() {
        let catalog = fixture_catalog();

        let partial = ResolveRequest::new(None, Some("ollama".to_string()), None, None);
        assert!(matches!(
            build(&catalog, &partial),
            Err(Error::Input(CallerInputError::PartialExplicit))
        ));

        let blank_model = ResolveRequest::new(
            None,
            Some("ollama".to_string()),
            Some("  ".to_string()),
            None,
        );
        assert!(matches!(
            build(&catalog, &blank_model),
            Err(Error::Input(CallerInputError::PartialExplicit))
        ));

        assert!(matches!(
            build(&catalog, &ResolveRequest::alias("slow")),
            Err(Error::Input(CallerInputError::UnknownAlias(name))) if name == "slow"
        ));

        assert!(matches!(
            build(&catalog, &ResolveRequest::role("janitor")),
            Err(Error::Input(CallerInputError::UnknownRole(name))) if name == "janitor"
        ));
    }

    #[test]
    fn test_config_errors_are_lazy() {
        let catalog = catalog_from_toml(
            r#"
[roles.broken]
primary = { provider = "ollama" }

[roles.fine]
primary = { provider = "ollama", model = "qwen" }

[aliases.half]
model = "qwen"

[defaults]
role = "ghost"
"#,
        );

        assert!(build(&catalog, &ResolveRequest::role("fine")).is_ok());
        assert!(matches!(
            build(&catalog, &ResolveRequest::role("broken")),
            Err(Error::Config(ConfigError::InvalidRole(name))) if name == "broken"
        ));
        assert!(matches!(
            build(&catalog, &ResolveRequest::alias("half").with_role("fine")),
            Err(Error::Config(ConfigError::InvalidAlias(name))) if name == "half"
        ));
        assert!(matches!(
            build(&catalog, &ResolveRequest::default()),
            Err(Error::Config(ConfigError::UnknownDefaultRole(name))) if name == "ghost"
        ));
    }

    #[test]
    fn test_default_pair_without_roles() {
        let catalog = catalog_from_toml(
            r#"
[defaults]
provider = "ollama"
model = "qwen"
"#,
        );

        let chain = build(&catalog, &ResolveRequest::default()).unwrap();

        assert_eq!(chain.kind(), RequestKind::Default);
        assert_eq!(chain.role(), None);
        assert_eq!(chain.source_of(&chain.entries()[0]), Source::Primary);
        assert_eq!(candidates(&chain), [(0, "ollama/qwen".to_string())]);
    }

    #[test]
    fn test_nothing_to_resolve() {
        assert!(matches!(
            build(&Catalog::default(), &ResolveRequest::default()),
            Err(Error::NoTarget)
        ));
    }
}
