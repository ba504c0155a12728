use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use nsxt_reconcile::apply::Outcome;
use nsxt_reconcile::config::{resolve_config, ConfigOverrides};
use nsxt_reconcile::model::{load_desired, DesiredResource};
use nsxt_reconcile::reconcile::reconcile;
use nsxt_reconcile::report::{render_outcome, render_plan, render_validation};
use nsxt_reconcile::transport::HttpTransport;
use nsxt_reconcile::validate::{validate, validation_issues};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{ApplyArgs, Cli, Command, ManagerArgs, OutputFormat, PlanArgs, ValidateArgs};

const DEFAULT_CONFIG: &str = "nsxt.toml";

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Apply(args) => run_apply(&cli.manager, args),
        Command::Plan(args) => run_plan(&cli.manager, args),
        Command::Validate(args) => run_validate(args),
    }
}

/// Logs go to stderr so stdout stays parseable; RUST_LOG wins over -v.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_apply(manager: &ManagerArgs, args: ApplyArgs) -> Result<()> {
    let outcome = run_pipeline(manager, &args.file, args.check)?;
    match args.format {
        OutputFormat::Text => println!("{}", render_outcome(&outcome)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }
    Ok(())
}

fn run_plan(manager: &ManagerArgs, args: PlanArgs) -> Result<()> {
    let outcome = run_pipeline(manager, &args.file, true)?;
    match args.format {
        OutputFormat::Text => println!("{}", render_plan(&outcome)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<()> {
    let desired = load(&args.file)?;
    let label = desired.label();
    let issues = validation_issues(&desired);

    match args.format {
        OutputFormat::Text => println!("{}", render_validation(&label, &issues)),
        OutputFormat::Json => {
            let report = serde_json::json!({
                "resource": label,
                "valid": issues.is_empty(),
                "issues": issues,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if !issues.is_empty() {
        bail!("validation failed: {} issue(s) in {}", issues.len(), args.file.display());
    }
    Ok(())
}

fn run_pipeline(manager: &ManagerArgs, file: &Path, check: bool) -> Result<Outcome> {
    let desired = load(file)?;
    let label = desired.label();
    // Input errors surface before the config is needed.
    validate(&desired).with_context(|| format!("invalid desired state in {}", file.display()))?;

    let config_path = manager
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let overrides = ConfigOverrides {
        hostname: manager.hostname.clone(),
        username: manager.username.clone(),
        password: manager.password.clone(),
        insecure: manager.insecure,
    };
    let config = resolve_config(&config_path, manager.config.is_some(), &overrides)
        .context("failed to load manager configuration")?;
    let transport = HttpTransport::new(&config).context("failed to set up manager connection")?;

    reconcile(&transport, desired, check).with_context(|| format!("failed to reconcile {label}"))
}

fn load(file: &Path) -> Result<DesiredResource> {
    load_desired(file).context("failed to load desired state")
}
