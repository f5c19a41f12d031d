//! The seam between a deployment step and whatever puts contracts on-chain.

use std::future::Future;

use alloy_core::primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::DeployResult, network::NetworkProfile};

/// Outcome of one confirmed deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub contract_name: String,
    pub address: Address,
    /// Interface descriptor, verbatim from the build artifact.
    pub abi: Value,
    pub tx_hash: B256,
}

/// Compiles/instantiates a contract by name and deploys it.
///
/// Implementations must only return once the deployment is confirmed, and
/// must report failures with the matching [`crate::DeployError`] kind:
/// `CompilationError`, `DeploymentTimeout` or `DeploymentReverted`.
pub trait ContractDeployer {
    /// Deploy `contract_name` with `constructor_args` under `profile`.
    fn deploy(
        &self,
        contract_name: &str,
        constructor_args: &[String],
        profile: &NetworkProfile,
    ) -> impl Future<Output = DeployResult<DeploymentResult>> + Send;

    /// The ABI of `contract_name`'s build artifact.
    fn abi(&self, contract_name: &str) -> DeployResult<Value>;
}
