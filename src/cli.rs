use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;

use crate::alert::{sink_for, AlertSink};
use crate::config::catalog::Catalog;
use crate::config::read_catalog;
use crate::config::settings::{ProcessEnv, Settings};
use crate::providers::providers::Adapters;
use crate::routing::chain::ResolveRequest;
use crate::routing::probe::{CatalogProbe, ProbeMode};
use crate::routing::resolver::Resolver;
use crate::{RequestedColorMode, TargetArgs};

pub(crate) mod ask;
pub(crate) mod health;
pub(crate) mod list;
pub(crate) mod preflight;
pub(crate) mod resolve;

#[derive(Clone, Copy, strum_macros::Display)]
pub(crate) enum ColorMode {
    On,
    Off,
}

impl ColorMode {
    /// Returns whether ANSI color should be used
    /// If the user has specified a preference, this is honored. This preference
    /// can be specified through the command line or the "NO_COLOR" environment
    /// variable. If the user hasn't stated a preference, color is enabled if the
    /// output is a terminal.
    pub(crate) fn resolve_auto(cm: RequestedColorMode) -> ColorMode {
        match cm {
            RequestedColorMode::Auto => {
                let disable_color =
                    std::env::var_os("NO_COLOR").is_some() || !io::stdout().is_terminal();

                if disable_color {
                    ColorMode::Off
                } else {
                    ColorMode::On
                }
            }
            RequestedColorMode::On => ColorMode::On,
            RequestedColorMode::Off => ColorMode::Off,
        }
    }
}

/// Everything a command needs, loaded once at startup
pub(crate) struct Context {
    pub catalog: Arc<Catalog>,
    pub settings: Settings,
    pub adapters: Arc<Adapters>,
}

impl Context {
    /// Exits with an error when no usable catalog can be loaded.
    pub(crate) fn load(config: Option<&Path>) -> Context {
        let catalog = match read_catalog(config.map(Path::to_path_buf), &ProcessEnv) {
            Ok(catalog) => Arc::new(catalog),
            Err(err) => crate::die!("{}", err),
        };

        let adapters = Arc::new(Adapters::from_catalog(&catalog, &ProcessEnv));

        Context {
            catalog,
            settings: Settings::from_env(&ProcessEnv),
            adapters,
        }
    }

    pub(crate) fn resolver(&self, mode: ProbeMode) -> Resolver {
        let probe = CatalogProbe::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.adapters),
            mode,
            self.settings.probe_timeout,
        );

        Resolver::new(Arc::clone(&self.catalog), Arc::new(probe))
    }

    pub(crate) fn sink(&self) -> Arc<dyn AlertSink> {
        sink_for(self.settings.alert_webhook.as_deref())
    }
}

impl TargetArgs {
    /// The request these arguments describe; DEFAULT_LLM_ROLE stands in for a missing
    /// --role.
    pub(crate) fn request(&self, settings: &Settings) -> ResolveRequest {
        ResolveRequest::new(
            self.role.clone().or_else(|| settings.role.clone()),
            self.provider.clone(),
            self.model.clone(),
            self.alias.clone(),
        )
    }
}

pub(crate) fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(output) => println!("{}", output),
        Err(err) => crate::die!("failed to serialize output: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_role_fills_missing_role() {
        let settings = Settings {
            role: Some("worker".to_string()),
            ..Settings::default()
        };

        let implicit = TargetArgs::default().request(&settings);
        assert_eq!(implicit.role.as_deref(), Some("worker"));

        let explicit = TargetArgs {
            role: Some("ace".to_string()),
            ..TargetArgs::default()
        }
        .request(&settings);
        assert_eq!(explicit.role.as_deref(), Some("ace"));
    }
}
