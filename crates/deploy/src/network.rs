//! Network profiles: which chain to deploy to, with which key, under which gas policy.

use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    config::{
        ACCOUNT_PRIVATE_KEY, AMOY_RPC, ConfigSource, ETHEREUM_RPC, ETHERSCAN_API_KEY, POLYGON_RPC,
        POLYGONSCAN_API_KEY, SEPOLIA_RPC, TEST_ACCOUNT_PRIVATE_KEY,
    },
    error::{DeployError, DeployResult},
};

/// Block at which the local profile forks Polygon mainnet.
pub const LOCAL_FORK_BLOCK: u64 = 59_462_027;

/// Chain ID of the local fork.
pub const LOCAL_CHAIN_ID: u64 = 31337;

/// First pre-funded account of a local anvil node.
pub const LOCAL_DEV_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Default port of the local fork.
pub const DEFAULT_FORK_PORT: u16 = 8545;

/// Fixed gas price used on Polygon networks (350 gwei).
pub const POLYGON_GAS_PRICE_WEI: u128 = 350_000_000_000;

const TESTNET_TIMEOUT: Duration = Duration::from_secs(600);
const TESTNET_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAINNET_TIMEOUT: Duration = Duration::from_secs(600);
const MAINNET_POLL_INTERVAL: Duration = Duration::from_secs(4);
const LOCAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Known network identifiers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkId {
    /// Rehearsal fork of Polygon mainnet at a pinned block.
    #[strum(to_string = "local", serialize = "hardhat")]
    Local,
    #[strum(to_string = "polygon-amoy", serialize = "amoy", serialize = "polygonAmoy")]
    PolygonAmoy,
    Sepolia,
    Polygon,
    #[strum(to_string = "ethereum", serialize = "mainnet")]
    Ethereum,
}

impl NetworkId {
    /// Parse an identifier or alias, case-insensitively.
    pub fn parse(network: &str) -> DeployResult<Self> {
        Self::from_str(network).map_err(|_| DeployError::UnknownNetwork(network.to_string()))
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            NetworkId::Local => LOCAL_CHAIN_ID,
            NetworkId::PolygonAmoy => 80002,
            NetworkId::Sepolia => 11155111,
            NetworkId::Polygon => 137,
            NetworkId::Ethereum => 1,
        }
    }

    /// Which credential signs deployments on this network.
    ///
    /// Only mainnets use the primary credential.
    pub fn signer_source(&self) -> SignerSource {
        match self {
            NetworkId::Local => SignerSource::LocalDev,
            NetworkId::PolygonAmoy | NetworkId::Sepolia => SignerSource::Test,
            NetworkId::Polygon | NetworkId::Ethereum => SignerSource::Primary,
        }
    }

    pub fn gas_policy(&self) -> GasPolicy {
        match self {
            NetworkId::PolygonAmoy | NetworkId::Polygon => GasPolicy::Fixed(POLYGON_GAS_PRICE_WEI),
            NetworkId::Local | NetworkId::Sepolia | NetworkId::Ethereum => GasPolicy::Auto,
        }
    }

    /// Configuration name holding the RPC endpoint.
    pub fn rpc_env(&self) -> &'static str {
        match self {
            NetworkId::Local | NetworkId::Polygon => POLYGON_RPC,
            NetworkId::PolygonAmoy => AMOY_RPC,
            NetworkId::Sepolia => SEPOLIA_RPC,
            NetworkId::Ethereum => ETHEREUM_RPC,
        }
    }

    pub fn explorer_key_env(&self) -> Option<&'static str> {
        match self {
            NetworkId::Local => None,
            NetworkId::PolygonAmoy | NetworkId::Polygon => Some(POLYGONSCAN_API_KEY),
            NetworkId::Sepolia | NetworkId::Ethereum => Some(ETHERSCAN_API_KEY),
        }
    }

    fn timeouts(&self) -> (Duration, Duration) {
        match self {
            NetworkId::Local => (TESTNET_TIMEOUT, LOCAL_POLL_INTERVAL),
            NetworkId::PolygonAmoy | NetworkId::Sepolia => {
                (TESTNET_TIMEOUT, TESTNET_POLL_INTERVAL)
            }
            NetworkId::Polygon | NetworkId::Ethereum => (MAINNET_TIMEOUT, MAINNET_POLL_INTERVAL),
        }
    }
}

/// Which credential a profile signs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SignerSource {
    /// `ACCOUNT_PRIVATE_KEY`.
    Primary,
    /// `TEST_ACCOUNT_PRIVATE_KEY`.
    Test,
    /// The pre-funded anvil development account.
    LocalDev,
}

impl SignerSource {
    fn resolve(&self, config: &ConfigSource) -> DeployResult<String> {
        match self {
            SignerSource::Primary => config.require(ACCOUNT_PRIVATE_KEY).map(str::to_string),
            SignerSource::Test => config.require(TEST_ACCOUNT_PRIVATE_KEY).map(str::to_string),
            SignerSource::LocalDev => Ok(LOCAL_DEV_PRIVATE_KEY.to_string()),
        }
    }
}

/// How the gas price of a deployment is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasPolicy {
    /// Leave estimation to the toolchain.
    Auto,
    /// Use an explicit gas price, in wei.
    Fixed(u128),
}

/// Where transactions are sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RpcEndpoint {
    /// A live node.
    Live { url: Url },
    /// A local node forking `base` at a pinned block.
    Fork {
        base: Url,
        block_number: u64,
        port: u16,
    },
}

impl RpcEndpoint {
    /// The URL transactions are actually sent to.
    pub fn url(&self) -> DeployResult<Url> {
        match self {
            RpcEndpoint::Live { url } => Ok(url.clone()),
            RpcEndpoint::Fork { port, .. } => {
                let url = format!("http://127.0.0.1:{port}/");
                Url::parse(&url).map_err(|e| DeployError::InvalidConfig(format!("{url}: {e}")))
            }
        }
    }
}

/// Connection, signing and gas parameters for one network.
#[derive(Clone, PartialEq, Eq)]
pub struct NetworkProfile {
    pub id: NetworkId,
    pub rpc_endpoint: RpcEndpoint,
    pub chain_id: u64,
    pub signer: SignerSource,
    pub signer_key: String,
    pub gas_policy: GasPolicy,
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Block-explorer API key used for source verification, if configured.
    pub explorer_api_key: Option<String>,
}

impl std::fmt::Debug for NetworkProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkProfile")
            .field("id", &self.id)
            .field("rpc_endpoint", &self.rpc_endpoint)
            .field("chain_id", &self.chain_id)
            .field("signer", &self.signer)
            .field("gas_policy", &self.gas_policy)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl NetworkProfile {
    /// Resolve a network identifier into a profile.
    ///
    /// Fails with [`DeployError::UnknownNetwork`] for identifiers outside the
    /// table, and with [`DeployError::MissingConfig`] when the endpoint or
    /// credential for a known network is not configured.
    pub fn resolve(network: &str, config: &ConfigSource) -> DeployResult<Self> {
        Self::for_network(NetworkId::parse(network)?, config)
    }

    pub fn for_network(id: NetworkId, config: &ConfigSource) -> DeployResult<Self> {
        Self::for_network_with_port(id, config, DEFAULT_FORK_PORT)
    }

    /// Like [`NetworkProfile::for_network`], with an explicit local fork port.
    pub fn for_network_with_port(
        id: NetworkId,
        config: &ConfigSource,
        fork_port: u16,
    ) -> DeployResult<Self> {
        let rpc_env = id.rpc_env();
        let rpc = config.require(rpc_env)?;
        let url = Url::parse(rpc)
            .map_err(|e| DeployError::InvalidConfig(format!("{rpc_env} is not a URL: {e}")))?;

        let rpc_endpoint = match id {
            NetworkId::Local => RpcEndpoint::Fork {
                base: url,
                block_number: LOCAL_FORK_BLOCK,
                port: fork_port,
            },
            _ => RpcEndpoint::Live { url },
        };

        let signer = id.signer_source();
        let (timeout, poll_interval) = id.timeouts();

        Ok(Self {
            id,
            rpc_endpoint,
            chain_id: id.chain_id(),
            signer,
            signer_key: signer.resolve(config)?,
            gas_policy: id.gas_policy(),
            timeout,
            poll_interval,
            explorer_api_key: id
                .explorer_key_env()
                .and_then(|name| config.get(name))
                .map(str::to_string),
        })
    }

    pub fn is_fork(&self) -> bool {
        matches!(self.rpc_endpoint, RpcEndpoint::Fork { .. })
    }
}
