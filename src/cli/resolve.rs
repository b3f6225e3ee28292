use serde_json::json;

use crate::alert::notify_exhausted;
use crate::color::{MaybePaint, FAIL_INDICATOR, PASS_INDICATOR, TARGET_TEXT};
use crate::routing::chain::{CandidateChain, RequestKind};
use crate::routing::probe::ProbeMode;
use crate::routing::resolver::ResolvedTarget;
use crate::routing::Error;
use crate::utils::errors::{DEFAULT_EXIT_CODE, USAGE_EXIT_CODE};
use crate::{OutputFormat, ResolveArgs};

use super::{print_json, Context};

fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Input(_) => USAGE_EXIT_CODE,
        _ => DEFAULT_EXIT_CODE,
    }
}

fn target_line(target: &ResolvedTarget) -> String {
    format!(
        "role={} provider={} model={} source={}",
        target.role.as_deref().unwrap_or("none"),
        target.provider,
        target.model,
        target.source
    )
}

fn target_json(target: &ResolvedTarget, retry_count: usize) -> serde_json::Value {
    json!({
        "ok": true,
        "role": target.role,
        "provider": target.provider,
        "model": target.model,
        "source": target.source,
        "retry_count": retry_count,
    })
}

fn chain_json(chain: &CandidateChain) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = chain
        .entries()
        .iter()
        .map(|entry| {
            json!({
                "provider": entry.candidate.provider,
                "model": entry.candidate.model,
                "source": chain.source_of(entry),
            })
        })
        .collect();

    serde_json::Value::Array(entries)
}

fn print_chain(chain: &CandidateChain) {
    let origin = match chain.kind() {
        RequestKind::Explicit => "explicit",
        RequestKind::Primary => "role",
        RequestKind::Default => "catalog default",
    };

    println!(
        "CHAIN: role={} request={}",
        chain.role().unwrap_or("none"),
        origin
    );

    for entry in chain.entries() {
        println!(
            "  {}  {}",
            chain.source_of(entry),
            TARGET_TEXT.maybe_paint(entry.candidate.to_string().as_str())
        );
    }
}

fn report_failure(err: &Error, format: OutputFormat) -> i32 {
    match format {
        OutputFormat::Text => {
            eprintln!("{} {}", FAIL_INDICATOR.maybe_paint("RESOLVE FAILED:"), err);
        }
        OutputFormat::Json => print_json(&json!({ "ok": false, "error": err.to_string() })),
    }

    exit_code(err)
}

pub(crate) async fn resolve_cmd(ctx: &Context, args: &ResolveArgs) -> i32 {
    let request = args.target.request(&ctx.settings);

    let mode = if args.static_only {
        ProbeMode::Static
    } else {
        ProbeMode::Live
    };

    let resolver = ctx.resolver(mode);

    let chain = if args.explain {
        match resolver.chain(&request) {
            Ok(chain) => Some(chain),
            Err(err) => return report_failure(&err, args.format),
        }
    } else {
        None
    };

    let target = match resolver.resolve(&request).await {
        Ok(target) => target,
        Err(err) => {
            if let Error::Exhausted(exhausted) = &err {
                notify_exhausted(ctx.sink().as_ref(), exhausted, &[]).await;
            }

            return report_failure(&err, args.format);
        }
    };

    match args.format {
        OutputFormat::Text => {
            if let Some(chain) = &chain {
                print_chain(chain);
            }

            println!(
                "{} {}",
                PASS_INDICATOR.maybe_paint("RESOLVED:"),
                target_line(&target)
            );
        }
        OutputFormat::Json => {
            let mut output = target_json(&target, ctx.settings.retry_count);

            if let Some(chain) = &chain {
                output["chain"] = chain_json(chain);
            }

            print_json(&output);
        }
    }

    0
}
