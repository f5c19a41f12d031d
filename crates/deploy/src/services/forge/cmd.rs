//! Command builder for `forge create`.

use crate::network::GasPolicy;

/// Builder for `forge create` commands.
#[derive(Debug, Clone)]
pub struct ForgeCreateCmdBuilder {
    contract: String,
    rpc_url: String,
    chain_id: Option<u64>,
    gas_price: Option<u128>,
    etherscan_api_key: Option<String>,
    constructor_args: Vec<String>,
}

impl ForgeCreateCmdBuilder {
    /// Create a new builder for the given contract identifier.
    pub fn new(contract: impl Into<String>, rpc_url: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            rpc_url: rpc_url.into(),
            chain_id: None,
            gas_price: None,
            etherscan_api_key: None,
            constructor_args: Vec::new(),
        }
    }

    /// Pin the chain the transaction is signed for.
    pub fn chain(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Apply a gas policy. `Auto` leaves estimation to forge.
    pub fn gas_policy(mut self, policy: GasPolicy) -> Self {
        self.gas_price = match policy {
            GasPolicy::Auto => None,
            GasPolicy::Fixed(price) => Some(price),
        };
        self
    }

    /// Verify the source on the block explorer after deployment.
    pub fn verify(mut self, etherscan_api_key: Option<String>) -> Self {
        self.etherscan_api_key = etherscan_api_key;
        self
    }

    /// Set the constructor arguments.
    pub fn constructor_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.constructor_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Build the command as a vector of strings.
    ///
    /// The signing key is never part of the arguments; it is passed through
    /// the environment.
    pub fn build(self) -> Vec<String> {
        let mut cmd = vec![
            "create".to_string(),
            self.contract,
            "--rpc-url".to_string(),
            self.rpc_url,
            "--broadcast".to_string(),
            "--json".to_string(),
        ];

        if let Some(chain_id) = self.chain_id {
            cmd.push("--chain".to_string());
            cmd.push(chain_id.to_string());
        }

        if let Some(gas_price) = self.gas_price {
            cmd.push("--legacy".to_string());
            cmd.push("--gas-price".to_string());
            cmd.push(gas_price.to_string());
        }

        if let Some(key) = self.etherscan_api_key {
            cmd.push("--verify".to_string());
            cmd.push("--etherscan-api-key".to_string());
            cmd.push(key);
        }

        // Must come last: forge takes every following token as an argument.
        if !self.constructor_args.is_empty() {
            cmd.push("--constructor-args".to_string());
            cmd.extend(self.constructor_args);
        }

        cmd
    }
}
