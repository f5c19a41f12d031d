//! Sequential deployment runs.

use alloy_core::primitives::Address;
use serde::Serialize;

use crate::{
    config::Settings,
    deployer::{ContractDeployer, DeploymentResult},
    error::{DeployError, DeployResult},
    network::{NetworkId, NetworkProfile},
    plan::DeploymentPlan,
    registry::{Document, Registry, RegistryLock},
    services::{AnvilHandler, ForgeDeployer},
    step::{DeploymentStep, StepFailure},
};

/// One step that completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedDeployment {
    pub section: String,
    #[serde(flatten)]
    pub result: DeploymentResult,
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub network: NetworkId,
    pub deployments: Vec<RecordedDeployment>,
}

/// Runs the steps of a plan one at a time, in declared order.
///
/// The first failing step ends the run. Steps after it never start, and
/// records written by the steps before it are left in place.
pub struct Orchestrator<'a, D> {
    registry: &'a mut Registry,
    deployer: &'a D,
    profile: &'a NetworkProfile,
}

impl<'a, D: ContractDeployer> Orchestrator<'a, D> {
    pub fn new(registry: &'a mut Registry, deployer: &'a D, profile: &'a NetworkProfile) -> Self {
        Self {
            registry,
            deployer,
            profile,
        }
    }

    pub async fn run(&mut self, plan: &DeploymentPlan) -> Result<RunReport, StepFailure> {
        let total = plan.len();
        let mut deployments = Vec::with_capacity(total);

        for (index, step) in plan.steps.iter().enumerate() {
            tracing::info!(step = index + 1, total, contract = %step.contract, "Running step");

            match step.run(&mut *self.registry, self.deployer, self.profile).await {
                Ok(result) => deployments.push(RecordedDeployment {
                    section: step.section_name(),
                    result,
                }),
                Err(failure) => {
                    let skipped: Vec<&str> = plan.steps[index + 1..]
                        .iter()
                        .map(|s| s.contract.as_str())
                        .collect();
                    tracing::error!(
                        contract = %failure.contract,
                        stage = %failure.stage,
                        completed = deployments.len(),
                        ?skipped,
                        "Deployment run aborted"
                    );
                    return Err(failure);
                }
            }
        }

        tracing::info!(network = %self.profile.id, deployed = deployments.len(), "Deployment run complete");

        Ok(RunReport {
            network: self.profile.id,
            deployments,
        })
    }
}

/// Everything needed for one run against one network.
///
/// Holds the registry lock for the whole run and, for the `local` profile,
/// keeps the fork alive until the last step has finished.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub settings: Settings,
    pub profile: NetworkProfile,
    pub plan: DeploymentPlan,
    /// Verify sources on the block explorer.
    pub verify: bool,
}

impl Deployment {
    /// Run the plan with `forge`.
    pub async fn run(self) -> anyhow::Result<RunReport> {
        let deployer = ForgeDeployer::new(&self.settings)?.verify(self.verify);
        self.run_with(&deployer).await
    }

    /// Run the plan with an arbitrary deployer.
    pub async fn run_with<D: ContractDeployer>(self, deployer: &D) -> anyhow::Result<RunReport> {
        self.plan.validate()?;

        tracing::info!(
            network = %self.profile.id,
            chain_id = self.profile.chain_id,
            steps = self.plan.len(),
            "Starting deployment run..."
        );

        let _lock = RegistryLock::acquire(&self.settings.registry_dir)?;
        let mut registry = Registry::open(&self.settings)?;

        let fork = AnvilHandler::start_for(&self.settings.anvil_bin, &self.profile).await?;

        let result = Orchestrator::new(&mut registry, deployer, &self.profile)
            .run(&self.plan)
            .await;

        if let Some(fork) = fork {
            fork.stop().await;
        }

        Ok(result?)
    }
}

/// Record a contract deployed outside of a run, typically after a
/// [`DeployError::PersistenceError`].
///
/// The ABI comes from the contract's build artifact.
pub fn record_existing<D: ContractDeployer>(
    registry: &mut Registry,
    deployer: &D,
    step: &DeploymentStep,
    address: Address,
) -> DeployResult<String> {
    let abi = deployer.abi(&step.contract)?;
    let section = step.section_name();
    let path = registry.store(Document::Contracts).path().to_path_buf();

    registry
        .record_deployment(&section, address, &abi)
        .map_err(|e| DeployError::Registry {
            path,
            reason: e.to_string(),
        })?;

    tracing::info!(contract = %step.contract, %section, %address, "Deployment recorded");
    Ok(section)
}
