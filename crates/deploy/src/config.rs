//! Process configuration.
//!
//! Two pieces are built once at start and passed by reference afterwards:
//! - [`Settings`]: paths and tool locations, from defaults, `Forgeline.toml`
//!   and `FORGELINE_*` environment variables.
//! - [`ConfigSource`]: the read-only mapping of endpoints and credentials taken
//!   from the process environment.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{DeployError, DeployResult},
    network::DEFAULT_FORK_PORT,
};

/// The default name of the settings file.
pub const SETTINGS_FILENAME: &str = "Forgeline.toml";

/// Prefix of environment variables overriding [`Settings`] fields.
pub const SETTINGS_ENV_PREFIX: &str = "FORGELINE_";

pub const POLYGON_RPC: &str = "POLYGON_RPC";
pub const ETHEREUM_RPC: &str = "ETHEREUM_RPC";
pub const SEPOLIA_RPC: &str = "SEPOLIA_RPC";
pub const AMOY_RPC: &str = "AMOY_RPC";
pub const ACCOUNT_PRIVATE_KEY: &str = "ACCOUNT_PRIVATE_KEY";
pub const TEST_ACCOUNT_PRIVATE_KEY: &str = "TEST_ACCOUNT_PRIVATE_KEY";
pub const POLYGONSCAN_API_KEY: &str = "POLYGONSCAN_API_KEY";
pub const ETHERSCAN_API_KEY: &str = "ETHERSCAN_API_KEY";

/// Every environment value the deployment reads.
pub const CONFIG_KEYS: [&str; 8] = [
    POLYGON_RPC,
    ETHEREUM_RPC,
    SEPOLIA_RPC,
    AMOY_RPC,
    ACCOUNT_PRIVATE_KEY,
    TEST_ACCOUNT_PRIVATE_KEY,
    POLYGONSCAN_API_KEY,
    ETHERSCAN_API_KEY,
];

/// Values never printed by `Debug`.
const SECRET_KEYS: [&str; 4] = [
    ACCOUNT_PRIVATE_KEY,
    TEST_ACCOUNT_PRIVATE_KEY,
    POLYGONSCAN_API_KEY,
    ETHERSCAN_API_KEY,
];

/// Filesystem and toolchain settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the Foundry project, used as the working directory of `forge`.
    pub project_root: PathBuf,
    /// Directory holding the build artifacts, relative to `project_root`.
    pub artifacts_dir: PathBuf,
    /// Directory holding the two registry documents.
    pub registry_dir: PathBuf,
    /// File name of the initializer-values document.
    pub initializer_file: String,
    /// File name of the deployment-records document.
    pub contracts_file: String,
    /// `forge` executable.
    pub forge_bin: String,
    /// `anvil` executable.
    pub anvil_bin: String,
    /// Port the local fork listens on.
    pub local_fork_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            artifacts_dir: PathBuf::from("out"),
            registry_dir: PathBuf::from("config"),
            initializer_file: "initializer.json".to_string(),
            contracts_file: "contract.json".to_string(),
            forge_bin: "forge".to_string(),
            anvil_bin: "anvil".to_string(),
            local_fork_port: DEFAULT_FORK_PORT,
        }
    }
}

impl Settings {
    /// Load settings from defaults, the given (or default) TOML file and the environment.
    ///
    /// A missing settings file is not an error; defaults apply.
    pub fn load(path: Option<&Path>) -> DeployResult<Self> {
        let path = path.unwrap_or_else(|| Path::new(SETTINGS_FILENAME));
        Self::from_figment(
            Figment::from(Serialized::defaults(Settings::default()))
                .merge(Toml::file(path))
                .merge(Env::prefixed(SETTINGS_ENV_PREFIX)),
        )
    }

    pub fn from_figment(figment: Figment) -> DeployResult<Self> {
        Ok(figment.extract()?)
    }

    /// Absolute location of the build artifacts.
    pub fn artifacts_path(&self) -> PathBuf {
        self.project_root.join(&self.artifacts_dir)
    }

    pub fn initializer_path(&self) -> PathBuf {
        self.registry_dir.join(&self.initializer_file)
    }

    pub fn contracts_path(&self) -> PathBuf {
        self.registry_dir.join(&self.contracts_file)
    }
}

/// Read-only mapping from configuration name to value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConfigSource {
    values: BTreeMap<String, String>,
}

impl ConfigSource {
    /// Snapshot the known configuration names from the process environment.
    ///
    /// Values are kept byte-for-byte: keys and URLs are opaque strings, so
    /// they are not run through figment's value parser. Empty values count
    /// as unset.
    pub fn from_env() -> DeployResult<Self> {
        let mut values = BTreeMap::new();

        for name in CONFIG_KEYS {
            let Some(raw) = std::env::var_os(name) else {
                continue;
            };
            let value = raw
                .into_string()
                .map_err(|_| DeployError::InvalidConfig(format!("{name} is not valid UTF-8")))?;
            if !value.is_empty() {
                values.insert(name.to_string(), value);
            }
        }

        Ok(Self { values })
    }

    /// Build the mapping from explicit pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into().to_ascii_uppercase(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Like [`ConfigSource::get`], but absence is an error.
    pub fn require(&self, name: &str) -> DeployResult<&str> {
        self.get(name)
            .ok_or_else(|| DeployError::MissingConfig(name.to_string()))
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            if SECRET_KEYS.contains(&key.as_str()) {
                map.entry(key, &"<redacted>");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}
