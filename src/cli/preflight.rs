use serde_json::json;

use crate::color::{MaybePaint, FAIL_INDICATOR, PASS_INDICATOR};
use crate::config::settings::ProcessEnv;
use crate::routing::preflight::{Issue, Preflight};
use crate::routing::probe::ProbeMode;
use crate::utils::errors::DEFAULT_EXIT_CODE;
use crate::{OutputFormat, PreflightArgs};

use super::{print_json, Context};

fn report_json(issues: &[Issue]) -> serde_json::Value {
    let failures: Vec<String> = issues.iter().map(|i| i.to_string()).collect();

    json!({
        "ok": issues.is_empty(),
        "failures": failures,
        "issues": issues,
    })
}

fn report_text(issues: &[Issue]) {
    if issues.is_empty() {
        println!(
            "{} startup checks passed.",
            PASS_INDICATOR.maybe_paint("PREFLIGHT OK:")
        );
        return;
    }

    println!("{}", FAIL_INDICATOR.maybe_paint("PREFLIGHT FAILED:"));

    for issue in issues {
        println!("- {}", issue);
    }
}

pub(crate) async fn preflight_cmd(ctx: &Context, args: &PreflightArgs) -> i32 {
    let mode = if args.static_only {
        ProbeMode::Static
    } else {
        ProbeMode::Live
    };

    let resolver = ctx.resolver(mode);

    let issues = Preflight::new(
        &resolver,
        &ctx.adapters,
        &ProcessEnv,
        mode,
        ctx.settings.probe_timeout,
    )
    .check_credentials(args.check_credentials)
    .validate()
    .await;

    match args.format {
        OutputFormat::Text => report_text(&issues),
        OutputFormat::Json => print_json(&report_json(&issues)),
    }

    if issues.is_empty() {
        0
    } else {
        DEFAULT_EXIT_CODE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json() {
        let issues = [Issue::MissingEnv {
            provider: "openai".to_string(),
            var: "OPENAI_API_KEY".to_string(),
        }];

        let report = report_json(&issues);

        assert_eq!(report["ok"], false);
        assert_eq!(
            report["failures"],
            json!(["Provider 'openai' enabled but missing env 'OPENAI_API_KEY'."])
        );
        assert_eq!(report["issues"][0]["kind"], "missing_env");
        assert_eq!(report_json(&[])["ok"], true);
    }
}
