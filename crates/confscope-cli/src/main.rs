//! Confscope - scoped settings synchronizer
//!
//! Usage:
//!   confscope rules [--sync]           # List output filter rules per scope
//!   confscope get <key>                # Show a setting
//!   confscope set <key> <json>         # Write a setting
//!   confscope clear <namespace> <sec>  # Remove a section from both scopes
//!   confscope theme apply              # Re-derive the theme customizations

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{Value, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use confscope_core::config::UpdateOutcome;
use confscope_core::context::AppContext;
use confscope_core::host::JsonFileStore;
use confscope_core::host::memory::{NoticeLevel, RecordingNotifier};
use confscope_core::rules::{self, RuleRecord};
use confscope_core::settings::{Settings, load_settings};
use confscope_core::types::{ConfigScope, SectionRef};

#[derive(Parser)]
#[command(name = "confscope")]
#[command(about = "Scoped settings synchronizer", long_about = None)]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PathArgs {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// confscope.toml to load (defaults to ~/.config/confscope/confscope.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// User settings.json (defaults to ~/.config/confscope/settings.json)
    #[arg(long, global = true)]
    user_settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List output filter rules per scope
    Rules {
        /// Normalize the stored rules through the cascading update first
        #[arg(long)]
        sync: bool,
    },

    /// Show a setting
    Get {
        /// Full settings key, e.g. outputFilter.rules
        key: String,

        #[arg(long, default_value = "effective")]
        scope: ReadScope,
    },

    /// Write a setting
    Set {
        key: String,
        /// JSON value; `null` removes the key
        value: String,

        #[arg(long, default_value = "global")]
        scope: WriteScope,
    },

    /// Remove a section from both the global and workspace scopes
    Clear { namespace: String, section: String },

    /// Theme color customizations
    Theme(ThemeArgs),
}

#[derive(Args)]
struct ThemeArgs {
    #[command(subcommand)]
    command: ThemeSubcommand,
}

#[derive(Subcommand)]
enum ThemeSubcommand {
    /// Rebuild the theme block of the color customizations in each scope
    Apply,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReadScope {
    Global,
    Workspace,
    Effective,
}

#[derive(Clone, Copy, ValueEnum)]
enum WriteScope {
    Global,
    Workspace,
}

impl From<WriteScope> for ConfigScope {
    fn from(scope: WriteScope) -> Self {
        match scope {
            WriteScope::Global => ConfigScope::Global,
            WriteScope::Workspace => ConfigScope::Workspace,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confscope=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let notifier = Arc::new(RecordingNotifier::new());
    let ctx = build_context(&cli.paths, Arc::clone(&notifier))?;

    match cli.command {
        Commands::Rules { sync } => run_rules(&ctx, sync, cli.format).await?,
        Commands::Get { key, scope } => run_get(&ctx, &key, scope, cli.format)?,
        Commands::Set { key, value, scope } => {
            run_set(&ctx, &key, &value, scope.into(), cli.format).await?
        }
        Commands::Clear { namespace, section } => {
            run_clear(&ctx, SectionRef::new(namespace, section), cli.format).await?
        }
        Commands::Theme(args) => match args.command {
            ThemeSubcommand::Apply => run_theme_apply(&ctx, cli.format).await?,
        },
    }

    report_notices(&notifier)
}

fn build_context(paths: &PathArgs, notifier: Arc<RecordingNotifier>) -> Result<AppContext> {
    let settings_path = match &paths.settings {
        Some(path) => path.clone(),
        None => Settings::default_path()?,
    };
    let settings = load_settings(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    settings.validate().context("Invalid confscope settings")?;

    let project = match &paths.project {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Failed to resolve current directory")?,
    };
    let store = match &paths.user_settings {
        Some(path) => JsonFileStore::from_paths(path.clone(), Some(project)),
        None => JsonFileStore::from_defaults(Some(project))?,
    };

    Ok(AppContext::new(Arc::new(store), notifier).with_settings(settings))
}

/// Prints recorded notifications; failed writes make the command fail.
fn report_notices(notifier: &RecordingNotifier) -> Result<()> {
    for warning in notifier.messages(NoticeLevel::Warning) {
        eprintln!("⚠ {}", warning);
    }
    let errors = notifier.messages(NoticeLevel::Error);
    for error in &errors {
        eprintln!("✗ {}", error);
    }
    if !errors.is_empty() {
        anyhow::bail!("{} settings write(s) failed", errors.len());
    }
    Ok(())
}

async fn run_rules(ctx: &AppContext, sync: bool, format: OutputFormat) -> Result<()> {
    let filter = ctx.output_filter();
    let synced = if sync {
        Some(filter.refresh_rules().await)
    } else {
        None
    };
    if let (OutputFormat::Table, Some(outcome)) = (format, &synced) {
        print_outcome(outcome, format)?;
    }

    let values = ctx.store().inspect(&filter.section().key());
    let scoped: Vec<(ConfigScope, BTreeMap<String, RuleRecord>)> =
        ConfigScope::WRITABLE
            .into_iter()
            .map(|scope| {
                let parsed = match values.get(scope) {
                    Some(Value::Object(raw)) => rules::validate(rules::parse(raw)),
                    _ => Default::default(),
                };
                (scope, parsed)
            })
            .collect();

    match format {
        OutputFormat::Table => {
            if scoped.iter().all(|(_, parsed)| parsed.is_empty()) {
                println!("No output filter rules configured.");
                println!(
                    "Add one with: confscope set {} '{{\"main:Main\": \"warning, error\"}}'",
                    filter.section().key()
                );
                return Ok(());
            }
            println!("{:<10} {:<20} {:<24} Rule", "Scope", "Channel", "Name");
            println!("{}", "-".repeat(70));
            for (scope, parsed) in &scoped {
                for (channel, record) in parsed {
                    println!(
                        "{:<10} {:<20} {:<24} {}",
                        scope.to_string(),
                        channel,
                        record.display_name,
                        rules::serialize(record)
                    );
                }
            }
        }
        OutputFormat::Json => {
            let output = rules_json(synced.as_ref(), scoped);
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

/// One JSON document for `rules`; with `--sync` the outcome sits next to
/// the rules instead of being printed separately.
fn rules_json(
    synced: Option<&UpdateOutcome>,
    scoped: Vec<(ConfigScope, BTreeMap<String, RuleRecord>)>,
) -> Value {
    let by_scope: serde_json::Map<String, Value> = scoped
        .into_iter()
        .map(|(scope, parsed)| (scope.to_string(), json!(parsed)))
        .collect();
    match synced {
        Some(outcome) => json!({ "sync": outcome_json(outcome), "rules": by_scope }),
        None => Value::Object(by_scope),
    }
}

fn run_get(ctx: &AppContext, key: &str, scope: ReadScope, format: OutputFormat) -> Result<()> {
    let value = match scope {
        ReadScope::Global => ctx.store().inspect(key).global,
        ReadScope::Workspace => ctx.store().inspect(key).workspace,
        ReadScope::Effective => ctx.store().get(key),
    };

    match (format, value) {
        (OutputFormat::Table, Some(value)) => println!("{}", serde_json::to_string_pretty(&value)?),
        (OutputFormat::Table, None) => println!("{} is not set", key),
        (OutputFormat::Json, value) => {
            let output = json!({ "key": key, "value": value });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

async fn run_set(
    ctx: &AppContext,
    key: &str,
    raw: &str,
    scope: ConfigScope,
    format: OutputFormat,
) -> Result<()> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("Value for {} is not valid JSON", key))?;
    let section = SectionRef::root(key);
    let manager = ctx.configuration_manager(&section.namespace);
    manager.write(&section, scope, value).await;

    match format {
        OutputFormat::Table => println!("✓ Wrote {} ({})", key, scope),
        OutputFormat::Json => {
            let output = json!({ "key": key, "scope": scope });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

async fn run_clear(ctx: &AppContext, section: SectionRef, format: OutputFormat) -> Result<()> {
    let manager = ctx.configuration_manager(&section.namespace);
    let cleared = manager.clear_scoped_value(&section).await;

    match format {
        OutputFormat::Table if cleared => println!("✓ Cleared {}", section),
        OutputFormat::Table => println!("• {} is busy, nothing cleared", section.namespace),
        OutputFormat::Json => {
            let output = json!({ "section": section.key(), "cleared": cleared });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

async fn run_theme_apply(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let session = ctx.theme_session();
    print_outcome(&session.apply_composite().await, format)
}

fn print_outcome(outcome: &UpdateOutcome, format: OutputFormat) -> Result<()> {
    match (format, outcome.report()) {
        (OutputFormat::Table, None) => println!("• Update skipped, namespace busy"),
        (OutputFormat::Table, Some(report)) => {
            let scopes: Vec<String> = report.persisted.iter().map(ToString::to_string).collect();
            if scopes.is_empty() {
                println!("• Nothing to persist");
            } else {
                println!("✓ Persisted to {}", scopes.join(", "));
            }
            if report.fallback {
                println!("  Workspace value was empty; global value re-applied");
            }
        }
        (OutputFormat::Json, _) => {
            println!("{}", serde_json::to_string_pretty(&outcome_json(outcome))?);
        }
    }
    Ok(())
}

fn outcome_json(outcome: &UpdateOutcome) -> Value {
    let report = outcome.report();
    json!({
        "skipped": outcome.is_skipped(),
        "persisted": report.map(|r| r.persisted.clone()).unwrap_or_default(),
        "fallback": report.is_some_and(|r| r.fallback),
    })
}
