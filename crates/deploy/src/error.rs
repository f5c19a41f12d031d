//! Error kinds surfaced by a deployment run.
//!
//! Every variant aborts the current run: nothing in this crate catches a
//! [`DeployError`] and continues with the next step.

use std::path::PathBuf;

use alloy_core::primitives::{Address, B256};

/// Result alias used throughout the deployment library.
pub type DeployResult<T> = Result<T, DeployError>;

/// Errors that can occur while resolving, deploying or recording contracts.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The requested network identifier is not in the profile table.
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),

    /// A constructor input refers to a registry entry that was never written.
    #[error("missing dependency: no `{field}` recorded under section `{section}`")]
    MissingDependency { section: String, field: String },

    /// No usable build artifact exists for the contract.
    #[error("compilation error for `{contract}`: {reason}")]
    CompilationError { contract: String, reason: String },

    /// The deployment was not confirmed within the profile's timeout.
    #[error("deployment of `{contract}` was not confirmed within {timeout_ms}ms")]
    DeploymentTimeout { contract: String, timeout_ms: u64 },

    /// The deployment transaction was mined but rejected by the execution layer.
    #[error("deployment of `{contract}` reverted: {reason}")]
    DeploymentReverted { contract: String, reason: String },

    /// The contract exists on-chain but its record could not be written.
    ///
    /// The run is aborted; the address must be recorded manually with
    /// `forgeline record`.
    #[error(
        "URGENT: `{contract}` is deployed at {address} (tx {tx_hash}) but could not be \
         recorded in the registry: {source}"
    )]
    PersistenceError {
        contract: String,
        address: Address,
        tx_hash: B256,
        #[source]
        source: std::io::Error,
    },

    /// A required configuration value is absent.
    #[error("missing configuration value `{0}`")]
    MissingConfig(String),

    /// The configuration could not be extracted.
    #[error("failed to load configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    /// A configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The external toolchain failed before a deployment could be confirmed.
    #[error("transport error while deploying `{contract}`: {reason}")]
    Transport { contract: String, reason: String },

    /// The local fork node could not be started.
    #[error("failed to start local fork: {0}")]
    LocalFork(String),

    /// A persisted registry document could not be loaded.
    #[error("failed to load registry document {}: {reason}", path.display())]
    Registry { path: PathBuf, reason: String },

    /// Another run already holds the registry lock.
    #[error("registry at {} is locked by another run", .0.display())]
    RegistryLocked(PathBuf),

    /// The deployment plan is malformed.
    #[error("invalid deployment plan: {0}")]
    InvalidPlan(String),
}

impl From<figment::Error> for DeployError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
