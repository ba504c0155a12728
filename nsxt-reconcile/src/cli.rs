use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "nsxt-reconcile")]
#[command(about = "Reconcile NSX-T firewall sections and Tier-0 gateways with a desired state file")]
pub struct Cli {
    #[command(flatten)]
    pub manager: ManagerArgs,
    /// Raise log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Bring the manager in line with a desired state file.
    Apply(ApplyArgs),
    /// Show what apply would do, including why the resource differs.
    Plan(PlanArgs),
    /// Check a desired state file without contacting the manager.
    Validate(ValidateArgs),
}

/// Manager connection settings; each overrides the config file.
#[derive(Args, Debug)]
pub struct ManagerArgs {
    /// Manager config file. Defaults to nsxt.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, env = "NSXT_HOSTNAME", global = true)]
    pub hostname: Option<String>,
    #[arg(long, env = "NSXT_USERNAME", global = true)]
    pub username: Option<String>,
    #[arg(long, env = "NSXT_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,
    /// Skip TLS certificate verification.
    #[arg(long, global = true)]
    pub insecure: bool,
}

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// Desired state file (TOML, or JSON with a .json extension).
    pub file: PathBuf,
    /// Run the full pipeline but report the request instead of sending it.
    #[arg(long)]
    pub check: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    pub file: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    pub file: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
