//! forgeline-deploy - Sequential smart-contract deployment library.
//!
//! This crate resolves a target network, deploys the contracts of a plan one
//! at a time through the Foundry toolchain and records each deployed address
//! and ABI in a JSON registry that later steps and runs read from.

pub mod config;
mod deployer;
pub mod error;
mod fs;
pub mod network;
mod orchestrator;
pub mod plan;
pub mod registry;
pub mod rpc;
pub mod services;
pub mod step;

#[cfg(test)]
mod testing;

pub use config::{ConfigSource, Settings};
pub use deployer::{ContractDeployer, DeploymentResult};
pub use error::{DeployError, DeployResult};
pub use network::{GasPolicy, NetworkId, NetworkProfile, RpcEndpoint, SignerSource};
pub use orchestrator::{Deployment, Orchestrator, RecordedDeployment, RunReport, record_existing};
pub use plan::DeploymentPlan;
pub use registry::{Document, Registry, RegistryLock, RegistryStore};
pub use services::{AnvilHandler, ForgeDeployer};
pub use step::{ConstructorArg, DeploymentStep, RegistryRef, StepFailure, StepState};
