//! A deployment step: read inputs from the registry, deploy one contract,
//! record the result.

use heck::ToShoutySnakeCase;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    deployer::{ContractDeployer, DeploymentResult},
    error::{DeployError, DeployResult},
    network::NetworkProfile,
    registry::{Document, Registry},
};

/// Where a step is in its lifecycle.
///
/// `Pending -> ReadingDependencies -> Deploying -> Persisting -> Done`, or
/// `Failed` from any state but `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StepState {
    Pending,
    #[strum(serialize = "reading dependencies")]
    ReadingDependencies,
    Deploying,
    Persisting,
    Done,
    Failed,
}

/// A registry entry used as a constructor input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryRef {
    #[serde(default)]
    pub document: Document,
    pub section: String,
    pub field: String,
}

impl RegistryRef {
    pub fn new(document: Document, section: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            document,
            section: section.into(),
            field: field.into(),
        }
    }

    /// The `ADDRESS` of a previously deployed contract.
    pub fn address_of(section: impl Into<String>) -> Self {
        Self::new(Document::Contracts, section, crate::registry::ADDRESS_FIELD)
    }
}

/// One constructor argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstructorArg {
    Literal(String),
    Registry(RegistryRef),
}

impl From<&str> for ConstructorArg {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<RegistryRef> for ConstructorArg {
    fn from(value: RegistryRef) -> Self {
        Self::Registry(value)
    }
}

/// A step that failed, and the state it failed in.
#[derive(Debug, thiserror::Error)]
#[error("deployment of `{contract}` failed while {stage}: {source}")]
pub struct StepFailure {
    pub contract: String,
    pub stage: StepState,
    #[source]
    pub source: DeployError,
}

/// Deploys one contract and records it under its section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentStep {
    /// Contract name, as known to the build toolchain.
    pub contract: String,
    /// Registry section; defaults to the contract name in SHOUTY_SNAKE_CASE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ConstructorArg>,
}

impl DeploymentStep {
    pub fn new(contract: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            section: None,
            args: Vec::new(),
        }
    }

    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<ConstructorArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Section the step's result is recorded under.
    pub fn section_name(&self) -> String {
        self.section
            .clone()
            .unwrap_or_else(|| self.contract.to_shouty_snake_case())
    }

    /// Registry entries this step reads.
    pub fn dependencies(&self) -> impl Iterator<Item = &RegistryRef> {
        self.args.iter().filter_map(|arg| match arg {
            ConstructorArg::Registry(dep) => Some(dep),
            ConstructorArg::Literal(_) => None,
        })
    }

    /// Resolve every argument; a missing registry entry is a hard failure.
    pub fn resolve_args(&self, registry: &Registry) -> DeployResult<Vec<String>> {
        self.args
            .iter()
            .map(|arg| match arg {
                ConstructorArg::Literal(value) => Ok(value.clone()),
                ConstructorArg::Registry(dep) => {
                    let value = registry.get(dep.document, &dep.section, &dep.field)?;
                    Ok(arg_from_value(value))
                }
            })
            .collect()
    }

    /// Run the step against `registry` and `deployer`.
    ///
    /// Nothing is submitted unless every dependency resolves. A failure to
    /// record the result is reported as [`DeployError::PersistenceError`]: the
    /// contract is on-chain but not in the registry.
    pub async fn run<D: ContractDeployer>(
        &self,
        registry: &mut Registry,
        deployer: &D,
        profile: &NetworkProfile,
    ) -> Result<DeploymentResult, StepFailure> {
        let section = self.section_name();
        let mut state = StepState::Pending;

        tracing::info!(contract = %self.contract, %section, network = %profile.id, "Deploying...");

        self.advance(&mut state, StepState::ReadingDependencies);
        let args = self
            .resolve_args(registry)
            .map_err(|e| self.fail(&mut state, e))?;

        self.advance(&mut state, StepState::Deploying);
        let result = deployer
            .deploy(&self.contract, &args, profile)
            .await
            .map_err(|e| self.fail(&mut state, e))?;

        self.advance(&mut state, StepState::Persisting);
        if let Err(source) = registry.record_deployment(&section, result.address, &result.abi) {
            tracing::error!(
                contract = %self.contract,
                %section,
                address = %result.address,
                tx_hash = %result.tx_hash,
                "Contract deployed but NOT recorded; record it manually with `forgeline record`"
            );
            return Err(self.fail(
                &mut state,
                DeployError::PersistenceError {
                    contract: self.contract.clone(),
                    address: result.address,
                    tx_hash: result.tx_hash,
                    source,
                },
            ));
        }

        self.advance(&mut state, StepState::Done);
        tracing::info!(contract = %self.contract, %section, address = %result.address, "Deployed");

        Ok(result)
    }

    fn advance(&self, state: &mut StepState, next: StepState) {
        tracing::debug!(contract = %self.contract, from = %state, to = %next, "Step transition");
        *state = next;
    }

    fn fail(&self, state: &mut StepState, source: DeployError) -> StepFailure {
        let stage = *state;
        self.advance(state, StepState::Failed);
        StepFailure {
            contract: self.contract.clone(),
            stage,
            source,
        }
    }
}

/// Render a registry value as a `forge` constructor argument.
fn arg_from_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
