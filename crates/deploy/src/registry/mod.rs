//! The deployment registry.
//!
//! Two [`RegistryStore`]s side by side, with identical merge semantics:
//! - the initializer document holds deployment-time constants,
//! - the contracts document holds one section per deployed contract with its
//!   `ADDRESS` and `ABI`.

mod lock;
mod store;

use std::{io, path::PathBuf};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use lock::{LOCK_FILENAME, RegistryLock};
pub use store::{Insertion, NotFound, RegistryDocument, RegistryStore};

use crate::{config::Settings, error::DeployResult};

/// Field holding a contract's checksummed address.
pub const ADDRESS_FIELD: &str = "ADDRESS";

/// Field holding a contract's ABI, stored verbatim from the build artifact.
pub const ABI_FIELD: &str = "ABI";

/// Which of the two registry documents an entry lives in.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Document {
    /// Deployment-time constants and initializer data.
    Initializer,
    /// Per-contract deployment records.
    #[default]
    Contracts,
}

/// Both registry documents.
#[derive(Debug)]
pub struct Registry {
    initializer: RegistryStore,
    contracts: RegistryStore,
}

impl Registry {
    /// Open both documents at the locations named by `settings`.
    pub fn open(settings: &Settings) -> DeployResult<Self> {
        Self::open_paths(settings.initializer_path(), settings.contracts_path())
    }

    pub fn open_paths(
        initializer: impl Into<PathBuf>,
        contracts: impl Into<PathBuf>,
    ) -> DeployResult<Self> {
        Ok(Self {
            initializer: RegistryStore::open(initializer)?,
            contracts: RegistryStore::open(contracts)?,
        })
    }

    pub fn store(&self, document: Document) -> &RegistryStore {
        match document {
            Document::Initializer => &self.initializer,
            Document::Contracts => &self.contracts,
        }
    }

    pub fn store_mut(&mut self, document: Document) -> &mut RegistryStore {
        match document {
            Document::Initializer => &mut self.initializer,
            Document::Contracts => &mut self.contracts,
        }
    }

    pub fn get(&self, document: Document, section: &str, field: &str) -> Result<&Value, NotFound> {
        self.store(document).get(section, field)
    }

    pub fn set(
        &mut self,
        document: Document,
        section: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> io::Result<()> {
        self.store_mut(document).set(section, field, value)
    }

    /// Record a deployed contract's address and ABI under `section`.
    ///
    /// The address is written first so that a failure on the ABI still leaves
    /// the on-chain location recorded.
    pub fn record_deployment(&mut self, section: &str, address: Address, abi: &Value) -> io::Result<()> {
        let contracts = self.store_mut(Document::Contracts);
        contracts.set(section, ADDRESS_FIELD, address.to_checksum(None))?;
        contracts.set(section, ABI_FIELD, abi.clone())?;
        Ok(())
    }

    /// Address recorded for `section` in the contracts document.
    pub fn address(&self, section: &str) -> Result<&Value, NotFound> {
        self.contracts.get(section, ADDRESS_FIELD)
    }
}
