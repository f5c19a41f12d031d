use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use forgeline_deploy::Document;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "forgeline")]
#[command(
    author,
    version,
    about = "Deploy smart contracts one after another and keep track of where they live"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "FORGELINE_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the settings file. Defaults to `Forgeline.toml` in the current directory.
    #[arg(short, long, global = true, env = "FORGELINE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    Deploy(DeployArgs),
    Record(RecordArgs),
    Get(GetArgs),
    Set(SetArgs),
    /// List the known networks.
    Networks,
}

/// Deploy every step of a plan, in order, stopping at the first failure.
#[derive(Args)]
pub struct DeployArgs {
    /// Target network (`local`, `polygon-amoy`, `sepolia`, `polygon`, `ethereum` or an alias).
    #[arg(short, long, env = "FORGELINE_NETWORK")]
    pub network: String,

    /// TOML deployment plan. Defaults to the factory plan
    /// (`GovernanceFactory`, then `TokenFactory`).
    #[arg(short, long, env = "FORGELINE_PLAN")]
    pub plan: Option<PathBuf>,

    /// Verify sources on the block explorer after each deployment.
    #[arg(long)]
    pub verify: bool,
}

/// Record a contract that is on-chain but missing from the registry.
#[derive(Args)]
pub struct RecordArgs {
    /// Contract name, used to read the ABI from the build artifacts.
    #[arg(long)]
    pub contract: String,

    /// Deployed address.
    #[arg(long)]
    pub address: Address,

    /// Registry section. Defaults to the contract name in SHOUTY_SNAKE_CASE.
    #[arg(long)]
    pub section: Option<String>,
}

/// Print a registry section, or one of its fields, as JSON.
#[derive(Args)]
pub struct GetArgs {
    /// Registry document.
    #[arg(short, long, default_value_t = Document::Contracts)]
    pub document: Document,

    #[arg(short, long)]
    pub section: String,

    /// Field to print. The whole section is printed when omitted.
    #[arg(short, long)]
    pub field: Option<String>,
}

/// Write one registry field.
#[derive(Args)]
pub struct SetArgs {
    /// Registry document.
    #[arg(short, long, default_value_t = Document::Initializer)]
    pub document: Document,

    #[arg(short, long)]
    pub section: String,

    #[arg(short, long)]
    pub field: String,

    /// Value to store. Parsed as JSON when valid, stored as a string otherwise.
    #[arg(long)]
    pub value: String,
}
