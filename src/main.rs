mod alert;
mod cli;
mod color;
mod config;
mod providers;
mod routing;
mod runtime;
#[cfg(test)]
mod testing;
mod utils;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cli::{
    ask::ask_cmd, health::health_cmd, list::list_cmd, preflight::preflight_cmd,
    resolve::resolve_cmd, ColorMode, Context,
};
use tracing_subscriber::EnvFilter;

#[derive(Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "rolecall")]
#[command(
    about = "Resolve which model a role should use, with ordered fallback",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Read the provider catalog from this file instead of searching for one
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a role, alias or explicit pair to a usable provider and model
    Resolve(ResolveArgs),
    /// Check that the environment and every role are ready to serve traffic
    Preflight(PreflightArgs),
    /// Report Ollama reachability and missing models
    Health(HealthArgs),
    /// Send a single prompt through the fallback chain
    Ask(AskArgs),
    /// List catalog entries
    List(ListArgs),
}

/// What to resolve. Without any of these, the default role is used.
#[derive(Args, Default, Clone)]
pub(crate) struct TargetArgs {
    /// Role to resolve (defaults to DEFAULT_LLM_ROLE, then the catalog default)
    #[arg(short, long)]
    role: Option<String>,
    /// Provider of an explicit pair; requires --model
    #[arg(short, long)]
    provider: Option<String>,
    /// Model of an explicit pair, or an alias when given alone
    #[arg(short, long)]
    model: Option<String>,
    /// Alias declared in the catalog
    #[arg(short, long)]
    alias: Option<String>,
}

#[derive(ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum OutputFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// A single JSON document
    Json,
}

#[derive(Args)]
pub(crate) struct ResolveArgs {
    #[command(flatten)]
    target: TargetArgs,
    #[arg(short, long, default_value_t = OutputFormat::default())]
    format: OutputFormat,
    /// Only consult the catalog; never contact a provider
    #[arg(long)]
    static_only: bool,
    /// Also print the candidate chain
    #[arg(long)]
    explain: bool,
}

#[derive(Args)]
pub(crate) struct PreflightArgs {
    #[arg(short, long, default_value_t = OutputFormat::default())]
    format: OutputFormat,
    /// Only consult the catalog and environment; never contact a provider
    #[arg(long)]
    static_only: bool,
    /// Ask each remote provider to accept its credentials
    #[arg(long)]
    check_credentials: bool,
}

#[derive(Args)]
pub(crate) struct HealthArgs {
    /// Pull required models that are missing
    #[arg(long)]
    pull: bool,
}

#[derive(Args)]
pub(crate) struct AskArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// The prompt to send
    prompt: String,
}

/// Possible listings
#[derive(Subcommand, Clone, Copy)]
pub(crate) enum ListObject {
    /// Providers and the models they serve
    Providers,
    /// Roles with their primary and fallbacks; the default role is marked with `*`
    Roles,
    /// Aliases and their targets
    Aliases,
}

/// Output formats
#[derive(ValueEnum, Default, Clone, Copy, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    HeaderlessTable,
}

#[derive(Args)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
    /// List the specified object
    #[command(subcommand)]
    object: ListObject,
}

/// Diagnostics go to stderr; LOG_LEVEL takes precedence over RUST_LOG.
fn init_logging() {
    let directive = std::env::var("LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .map(|level| level.to_lowercase())
        .unwrap_or_else(|_| "warn".to_string());

    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| {
        crate::warn!("invalid log filter \"{}\", using \"warn\"", directive);
        EnvFilter::new("warn")
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(matches!(color::color_mode(), ColorMode::On))
        .init();
}

#[tokio::main]
async fn main() {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    color::configure_color(ColorMode::resolve_auto(cli.color));

    init_logging();

    let ctx = Context::load(cli.config.as_deref());

    let code = match &cli.command {
        Commands::Resolve(args) => resolve_cmd(&ctx, args).await,
        Commands::Preflight(args) => preflight_cmd(&ctx, args).await,
        Commands::Health(args) => health_cmd(&ctx, args).await,
        Commands::Ask(args) => ask_cmd(&ctx, args).await,
        Commands::List(args) => list_cmd(&ctx.catalog, args),
    };

    std::process::exit(code);
}
