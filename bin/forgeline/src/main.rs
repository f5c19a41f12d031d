//! forgeline deploys smart contracts in a fixed order and records each address
//! and ABI in a JSON registry.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use serde_json::Value;
use strum::IntoEnumIterator;

use cli::{Cli, Command, DeployArgs, GetArgs, RecordArgs, SetArgs};
use forgeline_deploy::{
    ConfigSource, Deployment, DeploymentPlan, DeploymentStep, ForgeDeployer, GasPolicy, NetworkId,
    NetworkProfile, Registry, RegistryLock, RunReport, Settings, record_existing,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so that stdout only carries command output.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Deploy(args) => deploy(settings, args).await,
        Command::Record(args) => record(settings, args),
        Command::Get(args) => get(settings, args),
        Command::Set(args) => set(settings, args),
        Command::Networks => {
            networks();
            Ok(())
        }
    }
}

async fn deploy(settings: Settings, args: DeployArgs) -> Result<()> {
    let config = ConfigSource::from_env()?;
    let profile = NetworkProfile::for_network_with_port(
        NetworkId::parse(&args.network)?,
        &config,
        settings.local_fork_port,
    )?;

    let plan = match &args.plan {
        Some(path) => DeploymentPlan::load_from_file(path)?,
        None => DeploymentPlan::builtin(),
    };

    let report = Deployment {
        settings,
        profile,
        plan,
        verify: args.verify,
    }
    .run()
    .await?;

    print_report(&report);
    Ok(())
}

fn record(settings: Settings, args: RecordArgs) -> Result<()> {
    let _lock = RegistryLock::acquire(&settings.registry_dir)?;
    let mut registry = Registry::open(&settings)?;
    let deployer = ForgeDeployer::new(&settings)?;

    let mut step = DeploymentStep::new(args.contract);
    if let Some(section) = args.section {
        step = step.section(section);
    }

    let section = record_existing(&mut registry, &deployer, &step, args.address)?;
    println!("{section}");
    Ok(())
}

fn get(settings: Settings, args: GetArgs) -> Result<()> {
    let registry = Registry::open(&settings)?;
    let store = registry.store(args.document);

    let value = match &args.field {
        Some(field) => store.get(&args.section, field)?.clone(),
        None => store
            .document()
            .section(&args.section)
            .map(|section| Value::Object(section.clone()))
            .with_context(|| {
                format!(
                    "no section `{}` in {}",
                    args.section,
                    store.path().display()
                )
            })?,
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn set(settings: Settings, args: SetArgs) -> Result<()> {
    let _lock = RegistryLock::acquire(&settings.registry_dir)?;
    let mut registry = Registry::open(&settings)?;

    let value = serde_json::from_str(&args.value).unwrap_or(Value::String(args.value));
    registry
        .set(args.document, &args.section, &args.field, value)
        .with_context(|| {
            format!(
                "Failed to write `{}.{}` to {}",
                args.section,
                args.field,
                registry.store(args.document).path().display()
            )
        })?;

    tracing::info!(document = %args.document, section = %args.section, field = %args.field, "Value written");
    Ok(())
}

fn networks() {
    let mut table = Table::new();
    table.set_header(vec!["Network", "Chain ID", "Signer", "Gas", "RPC"]);

    for id in NetworkId::iter() {
        let gas = match id.gas_policy() {
            GasPolicy::Auto => "auto".to_string(),
            GasPolicy::Fixed(price) => format!("{price} wei"),
        };
        let rpc = match id {
            NetworkId::Local => format!("fork of {}", id.rpc_env()),
            _ => id.rpc_env().to_string(),
        };
        table.add_row(vec![
            id.to_string(),
            id.chain_id().to_string(),
            id.signer_source().to_string(),
            gas,
            rpc,
        ]);
    }

    println!("{table}");
}

fn print_report(report: &RunReport) {
    let mut table = Table::new();
    table.set_header(vec!["Section", "Contract", "Address", "Transaction"]);

    for deployment in &report.deployments {
        table.add_row(vec![
            deployment.section.clone(),
            deployment.result.contract_name.clone(),
            deployment.result.address.to_checksum(None),
            deployment.result.tx_hash.to_string(),
        ]);
    }

    println!("Deployed to {}:\n{table}", report.network);
}
