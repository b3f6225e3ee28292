use serde::Serialize;
use std::time::Duration;

use crate::config::settings::ProcessEnv;
use crate::providers::providers::ProviderKind;
use crate::providers::OllamaProvider;
use crate::routing::chain::ResolveRequest;
use crate::routing::probe::ProbeMode;
use crate::routing::resolver::{ResolvedTarget, Resolver};
use crate::utils::errors::DEFAULT_EXIT_CODE;
use crate::HealthArgs;

use super::{print_json, Context};

const RECOMMENDATION: &str =
    "Do not expose the Ollama port (11434) publicly; keep it bound to localhost or a private network.";

/// Model pulls download gigabytes
const PULL_TIMEOUT: Duration = Duration::from_secs(1800);

#[derive(Serialize, Debug, Default)]
struct OllamaHealth {
    ok: bool,
    reachable: bool,
    message: String,
    api_base: String,
    required_models: Vec<String>,
    missing_models: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pulled_models: Vec<String>,
}

/// Outcome of resolving the default target or one alias
#[derive(Serialize, Debug)]
struct TargetHealth {
    name: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<ResolvedTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize, Debug)]
struct HealthReport {
    ok: bool,
    ollama: OllamaHealth,
    targets: Vec<TargetHealth>,
    recommendation: &'static str,
}

/// Resolve the default target and then every declared alias, in name order.
async fn check_targets(resolver: &Resolver, default_role: Option<&str>) -> Vec<TargetHealth> {
    let mut requests = vec![(
        "default".to_string(),
        ResolveRequest::new(default_role.map(str::to_string), None, None, None),
    )];

    for alias in resolver.catalog().aliases.keys() {
        requests.push((
            format!("alias {}", alias),
            ResolveRequest::new(None, None, None, Some(alias.clone())),
        ));
    }

    let mut targets = Vec::with_capacity(requests.len());

    for (name, request) in requests {
        let health = match resolver.resolve(&request).await {
            Ok(target) => TargetHealth {
                name,
                ok: true,
                resolved: Some(target),
                error: None,
            },
            Err(err) => TargetHealth {
                name,
                ok: false,
                resolved: None,
                error: Some(err.to_string()),
            },
        };

        targets.push(health);
    }

    targets
}

async fn check(provider: &OllamaProvider, required: &[String], timeout: Duration) -> OllamaHealth {
    let mut health = OllamaHealth {
        api_base: provider.api_base().to_string(),
        required_models: required.to_vec(),
        ..OllamaHealth::default()
    };

    match provider
        .missing_models(required.iter().map(|m| m.as_str()), timeout)
        .await
    {
        Ok(missing) if missing.is_empty() => {
            health.ok = true;
            health.reachable = true;
            health.message = "Ollama reachable; all required models present.".to_string();
        }
        Ok(missing) => {
            health.reachable = true;
            health.message = format!("Ollama reachable; missing models: {}", missing.join(", "));
            health.missing_models = missing;
        }
        Err(err) => {
            health.message = format!("Ollama unreachable: {}", err);
            health.missing_models = required.to_vec();
        }
    }

    health
}

async fn pull_missing(provider: &OllamaProvider, missing: &[String]) -> Vec<String> {
    let mut pulled = Vec::new();

    for model in missing {
        eprintln!("pulling {} ...", model);

        match provider.pull(model, PULL_TIMEOUT).await {
            Ok(()) => pulled.push(model.clone()),
            Err(err) => crate::error!("failed to pull \"{}\": {}", model, err),
        }
    }

    pulled
}

pub(crate) async fn health_cmd(ctx: &Context, args: &HealthArgs) -> i32 {
    let entry = ctx.catalog.provider("ollama");

    let provider = match ProviderKind::Ollama.api_base(entry, &ProcessEnv) {
        Some(api_base) => match OllamaProvider::with_api_base(&api_base) {
            Ok(provider) => provider,
            Err(err) => crate::die!("invalid Ollama API base \"{}\": {}", api_base, err),
        },
        None => OllamaProvider::new(),
    };

    let required: Vec<String> = entry
        .map(|e| e.models.iter().cloned().collect())
        .unwrap_or_default();

    let timeout = ctx.settings.probe_timeout;

    let mut health = check(&provider, &required, timeout).await;

    if args.pull && health.reachable && !health.missing_models.is_empty() {
        let pulled = pull_missing(&provider, &health.missing_models).await;

        health = check(&provider, &required, timeout).await;
        health.pulled_models = pulled;
    }

    let targets = check_targets(&ctx.resolver(ProbeMode::Live), ctx.settings.role.as_deref()).await;

    let report = HealthReport {
        ok: health.ok && targets.iter().all(|t| t.ok),
        ollama: health,
        targets,
        recommendation: RECOMMENDATION,
    };

    match serde_json::to_value(&report) {
        Ok(value) => print_json(&value),
        Err(err) => crate::die!("failed to serialize health report: {}", err),
    }

    if report.ok {
        0
    } else {
        DEFAULT_EXIT_CODE
    }
}
