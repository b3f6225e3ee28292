//! Loading of the provider/role catalog.
//!
//! The catalog is a TOML document (or JSON, for files ending in `.json`) with four
//! sections: `providers`, `roles`, `aliases` and `defaults`. It is read once per
//! process and is read-only afterwards. Inconsistencies between sections (a role
//! without a primary, an alias without a model) are not detected here; they surface
//! when the offending role or alias is actually used.

pub(crate) mod catalog;
pub(crate) mod settings;

use std::path::{Path, PathBuf};
use thiserror::Error;

use self::catalog::Catalog;
use self::settings::Environment;

pub(crate) const CONFIG_ENV_VAR: &str = "ROLECALL_CONFIG";

#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    /// None of the candidate paths exist
    #[error("no provider catalog found (searched {})", display_paths(.0))]
    NotFound(Vec<PathBuf>),
    #[error("failed to read catalog \"{}\": {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog \"{}\" is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
    /// A role's primary is missing its provider or model
    #[error("role \"{0}\" is missing a valid primary model")]
    InvalidRole(String),
    #[error("alias \"{0}\" does not name a complete provider/model pair")]
    InvalidAlias(String),
    #[error("defaults.role names the undeclared role \"{0}\"")]
    UnknownDefaultRole(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();

    paths.join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Toml,
    Json,
}

impl Format {
    pub(crate) fn of(path: &Path) -> Format {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

/// Paths searched for a catalog, most specific first
pub(crate) fn search_paths(env: &dyn Environment) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(path) = env.var(CONFIG_ENV_VAR) {
        paths.push(PathBuf::from(path));
    }

    paths.push(PathBuf::from("config/providers.toml"));
    paths.push(PathBuf::from("config/providers.json"));

    if let Some(home) = env.var("HOME") {
        paths.push(PathBuf::from(home).join(".config/rolecall/providers.toml"));
    }

    paths.push(PathBuf::from("/etc/rolecall/providers.toml"));

    paths
}

fn locate(explicit: Option<PathBuf>, env: &dyn Environment) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok(path)
        } else {
            Err(ConfigError::NotFound(vec![path]))
        };
    }

    let candidates = search_paths(env);

    match candidates.iter().find(|p| p.exists()) {
        Some(path) => Ok(path.clone()),
        None => Err(ConfigError::NotFound(candidates)),
    }
}

fn parse_value<S: serde::de::DeserializeOwned>(
    raw: &str,
    format: Format,
    path: &Path,
) -> Result<S, ConfigError> {
    let malformed = |reason: String| ConfigError::Malformed {
        path: path.to_path_buf(),
        reason,
    };

    match format {
        Format::Toml => toml::from_str(raw).map_err(|e| malformed(e.to_string().trim().to_string())),
        Format::Json => serde_json::from_str(raw).map_err(|e| malformed(e.to_string())),
    }
}

fn extra_fields_helper(
    path: &mut Vec<String>,
    user: &serde_json::Value,
    known: &serde_json::Value,
    extra: &mut Vec<String>,
) {
    let (user, known) = match (user, known) {
        (serde_json::Value::Object(user), serde_json::Value::Object(known)) => (user, known),
        _ => return,
    };

    for (user_key, user_value) in user {
        path.push(user_key.clone());

        match known.get(user_key) {
            Some(known_value) => extra_fields_helper(path, user_value, known_value, extra),
            None => extra.push(path.join(".")),
        }

        path.pop();
    }
}

/// Dotted paths of keys present in the document but unknown to the catalog model
pub(crate) fn extra_fields(catalog: &Catalog, user: &serde_json::Value) -> Vec<String> {
    let known = match serde_json::to_value(catalog) {
        Ok(known) => known,
        Err(_) => return Vec::new(),
    };

    let mut extra = Vec::new();

    extra_fields_helper(&mut Vec::new(), user, &known, &mut extra);

    extra
}

/// Parse a catalog document, warning about keys that will be ignored
pub(crate) fn parse_catalog(raw: &str, format: Format, path: &Path) -> Result<Catalog, ConfigError> {
    let catalog: Catalog = parse_value(raw, format, path)?;
    let user: serde_json::Value = parse_value(raw, format, path)?;

    for key in extra_fields(&catalog, &user) {
        crate::warn!("catalog contains extraneous key \"{}\", ignoring", key);
    }

    Ok(catalog)
}

/// Locate and load the catalog. An explicit path takes precedence over the search
/// path.
pub(crate) fn read_catalog(
    explicit: Option<PathBuf>,
    env: &dyn Environment,
) -> Result<Catalog, ConfigError> {
    let path = locate(explicit, env)?;

    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "loading provider catalog");

    parse_catalog(&raw, Format::of(&path), &path)
}
