//! Contract deployment through the Foundry toolchain.
//!
//! Artifacts are read from the project's `out/` directory. The endpoint's chain
//! id is checked against the profile before anything is signed, the deployment
//! transaction is submitted with `forge create`, and confirmation is checked by
//! polling the transaction receipt under the profile's timeout.

mod artifact;
mod cmd;

use std::{
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};

use alloy_core::primitives::{Address, B256};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use url::Url;

pub use artifact::Artifact;
pub use cmd::ForgeCreateCmdBuilder;

use crate::{
    config::Settings,
    deployer::{ContractDeployer, DeploymentResult},
    error::{DeployError, DeployResult},
    network::NetworkProfile,
    rpc::{self, TransactionReceipt},
};

/// Environment variable forge reads the signing key from.
const PRIVATE_KEY_ENV: &str = "ETH_PRIVATE_KEY";

/// Consecutive failed receipt queries tolerated before giving up on the endpoint.
const MAX_RPC_FAILURES: usize = 3;

/// Why a receipt poll did not yield a receipt.
#[derive(Debug, thiserror::Error)]
enum ReceiptPoll {
    #[error("transaction {0} is still pending")]
    Pending(B256),
    #[error(transparent)]
    Rpc(anyhow::Error),
}

/// JSON printed by `forge create --json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForgeCreateOutput {
    deployer: Address,
    deployed_to: Address,
    transaction_hash: B256,
}

impl ForgeCreateOutput {
    /// Forge may print progress lines before the JSON object.
    fn parse(stdout: &str) -> Option<Self> {
        stdout
            .lines()
            .rev()
            .map(str::trim)
            .filter(|line| line.starts_with('{'))
            .find_map(|line| serde_json::from_str(line).ok())
    }
}

/// [`ContractDeployer`] backed by `forge create`.
#[derive(Debug, Clone)]
pub struct ForgeDeployer {
    forge_bin: String,
    project_root: PathBuf,
    artifacts_dir: PathBuf,
    verify: bool,
    client: reqwest::Client,
}

impl ForgeDeployer {
    pub fn new(settings: &Settings) -> DeployResult<Self> {
        let client = rpc::create_client()
            .map_err(|e| DeployError::InvalidConfig(format!("{e:#}")))?;

        Ok(Self {
            forge_bin: settings.forge_bin.clone(),
            project_root: settings.project_root.clone(),
            artifacts_dir: settings.artifacts_path(),
            verify: false,
            client,
        })
    }

    /// Verify sources on the block explorer when the profile has an API key.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Refuse to sign for an endpoint that serves another chain.
    async fn check_chain(
        &self,
        contract: &str,
        rpc_url: &Url,
        profile: &NetworkProfile,
    ) -> DeployResult<()> {
        let reported = rpc::get_chain_id(&self.client, rpc_url.as_str())
            .await
            .map_err(|e| DeployError::Transport {
                contract: contract.to_string(),
                reason: format!("{e:#}"),
            })?;

        if reported != profile.chain_id {
            return Err(DeployError::InvalidConfig(format!(
                "{} reports chain id {reported}, but {} expects {}",
                rpc_url.as_str(),
                profile.id,
                profile.chain_id
            )));
        }

        tracing::debug!(contract, chain_id = reported, "Endpoint chain id matches the profile");
        Ok(())
    }

    /// Run `forge create` and return its parsed output.
    async fn submit(
        &self,
        artifact: &Artifact,
        constructor_args: &[String],
        rpc_url: &Url,
        profile: &NetworkProfile,
    ) -> DeployResult<ForgeCreateOutput> {
        let contract = artifact.contract_name.as_str();
        let transport = |reason: String| DeployError::Transport {
            contract: contract.to_string(),
            reason,
        };

        let api_key = if self.verify {
            if profile.explorer_api_key.is_none() {
                tracing::warn!(network = %profile.id, "No block-explorer API key configured, skipping verification");
            }
            profile.explorer_api_key.clone()
        } else {
            None
        };

        let args = ForgeCreateCmdBuilder::new(artifact.identifier(), rpc_url.as_str())
            .chain(profile.chain_id)
            .gas_policy(profile.gas_policy)
            .verify(api_key)
            .constructor_args(constructor_args.iter().cloned())
            .build();

        tracing::debug!(contract, ?args, "Running forge create");

        let output = Command::new(&self.forge_bin)
            .args(&args)
            .env(PRIVATE_KEY_ENV, &profile.signer_key)
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| transport(format!("failed to run `{}`: {e}", self.forge_bin)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let reason = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("forge create failed")
                .trim()
                .to_string();

            if stderr.to_ascii_lowercase().contains("revert") {
                return Err(DeployError::DeploymentReverted {
                    contract: contract.to_string(),
                    reason,
                });
            }
            return Err(transport(reason));
        }

        ForgeCreateOutput::parse(&stdout)
            .ok_or_else(|| transport(format!("unexpected forge output: {}", stdout.trim())))
    }

    /// Poll the receipt of `tx_hash` every `poll_interval` until it is mined.
    ///
    /// A pending transaction is retried indefinitely; the caller bounds the
    /// wait. Failed queries are retried [`MAX_RPC_FAILURES`] times in a row.
    async fn wait_for_receipt(
        &self,
        rpc_url: &str,
        tx_hash: B256,
        poll_interval: Duration,
    ) -> Result<TransactionReceipt, ReceiptPoll> {
        let client = &self.client;
        let mut failures = 0;

        (move || async move {
            match rpc::get_transaction_receipt(client, rpc_url, tx_hash).await {
                Ok(Some(receipt)) => Ok(receipt),
                Ok(None) => Err(ReceiptPoll::Pending(tx_hash)),
                Err(e) => Err(ReceiptPoll::Rpc(e)),
            }
        })
        .retry(
            ConstantBuilder::default()
                .with_delay(poll_interval)
                .with_max_times(usize::MAX),
        )
        .sleep(tokio::time::sleep)
        .when(|err: &ReceiptPoll| match err {
            ReceiptPoll::Pending(_) => {
                failures = 0;
                true
            }
            ReceiptPoll::Rpc(_) => {
                failures += 1;
                failures < MAX_RPC_FAILURES
            }
        })
        .notify(|err: &ReceiptPoll, _| {
            tracing::trace!(%err, "Waiting for deployment receipt...");
        })
        .await
    }

    async fn deploy_artifact(
        &self,
        artifact: Artifact,
        constructor_args: &[String],
        profile: &NetworkProfile,
    ) -> DeployResult<DeploymentResult> {
        let contract = artifact.contract_name.clone();
        let timed_out = || DeployError::DeploymentTimeout {
            contract: contract.clone(),
            timeout_ms: profile.timeout.as_millis() as u64,
        };

        let rpc_url = profile.rpc_endpoint.url()?;
        self.check_chain(&contract, &rpc_url, profile).await?;

        let started = Instant::now();
        let submitted = tokio::time::timeout(
            profile.timeout,
            self.submit(&artifact, constructor_args, &rpc_url, profile),
        )
        .await
        .map_err(|_| timed_out())??;

        tracing::info!(
            contract = %contract,
            address = %submitted.deployed_to,
            tx_hash = %submitted.transaction_hash,
            deployer = %submitted.deployer,
            "Deployment submitted, waiting for confirmation..."
        );

        let remaining = profile.timeout.saturating_sub(started.elapsed());
        let receipt = tokio::time::timeout(
            remaining,
            self.wait_for_receipt(rpc_url.as_str(), submitted.transaction_hash, profile.poll_interval),
        )
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| DeployError::Transport {
            contract: contract.clone(),
            reason: format!("{e:#}"),
        })?;

        if !receipt.succeeded() {
            return Err(DeployError::DeploymentReverted {
                contract,
                reason: format!("transaction {} has status 0x0", receipt.transaction_hash),
            });
        }

        let address = match receipt.contract_address {
            Some(address) if address != submitted.deployed_to => {
                tracing::warn!(
                    contract = %contract,
                    reported = %submitted.deployed_to,
                    receipt = %address,
                    "Forge and receipt disagree on the deployed address, using the receipt"
                );
                address
            }
            Some(address) => address,
            None => submitted.deployed_to,
        };

        Ok(DeploymentResult {
            contract_name: contract,
            address,
            abi: artifact.abi,
            tx_hash: receipt.transaction_hash,
        })
    }
}

impl ContractDeployer for ForgeDeployer {
    async fn deploy(
        &self,
        contract_name: &str,
        constructor_args: &[String],
        profile: &NetworkProfile,
    ) -> DeployResult<DeploymentResult> {
        let artifact = Artifact::load(&self.artifacts_dir, contract_name)?;
        self.deploy_artifact(artifact, constructor_args, profile).await
    }

    fn abi(&self, contract_name: &str) -> DeployResult<Value> {
        Ok(Artifact::load(&self.artifacts_dir, contract_name)?.abi)
    }
}


/// `ForgeDeployer` against a scripted `forge` and an in-process node.
#[cfg(all(test, unix))]
mod deploy_tests {
    use std::{
        path::PathBuf,
        str::FromStr,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use serde_json::json;
    use tempdir::TempDir;

    use super::*;
    use crate::{
        network::RpcEndpoint,
        testing::{live_profile, spawn_rpc},
    };

    const TX_HASH: &str = "0x00000000000000000000000000000000000000000000000000000000000000aa";
    const REPORTED: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
    const MINED: &str = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512";
    /// 11155111, the sepolia chain id.
    const SEPOLIA_HEX: &str = "0xaa36a7";

    const FORGE_OK: &str = r#"printf '%s\n' "$@" > args.txt
echo 'Compiling 1 files with Solc 0.8.24'
echo '{"deployer":"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266","deployedTo":"0x5fbdb2315678afecb367f032d93f642f64180aa3","transactionHash":"0x00000000000000000000000000000000000000000000000000000000000000aa"}'
"#;

    struct Fixture {
        _temp_dir: TempDir,
        root: PathBuf,
        deployer: ForgeDeployer,
    }

    impl Fixture {
        /// A project with a `Counter` artifact whose `forge create` runs `script`.
        fn new(script: &str) -> Self {
            let temp_dir = TempDir::new("forgeline-forge").expect("Failed to create temp dir");
            let root = temp_dir.path().to_path_buf();

            let artifact_dir = root.join("out").join("Counter.sol");
            std::fs::create_dir_all(&artifact_dir).unwrap();
            std::fs::write(
                artifact_dir.join("Counter.json"),
                json!({
                    "abi": [{"type": "function", "name": "increment", "inputs": []}],
                    "bytecode": {"object": "0x6080604052"}
                })
                .to_string(),
            )
            .unwrap();

            // `sh create <args>` runs the script, so it needs no exec bit.
            std::fs::write(root.join("create"), script).unwrap();
            let settings = Settings {
                project_root: root.clone(),
                forge_bin: "sh".to_string(),
                ..Settings::default()
            };

            Self {
                deployer: ForgeDeployer::new(&settings).expect("Failed to create deployer"),
                root,
                _temp_dir: temp_dir,
            }
        }

        fn forge_args(&self) -> Option<Vec<String>> {
            let args = std::fs::read_to_string(self.root.join("args.txt")).ok()?;
            Some(args.lines().map(str::to_string).collect())
        }
    }

    fn profile(url: Url, timeout: Duration) -> NetworkProfile {
        NetworkProfile {
            rpc_endpoint: RpcEndpoint::Live { url },
            timeout,
            poll_interval: Duration::from_millis(10),
            ..live_profile()
        }
    }

    fn receipt(status: &str, contract_address: &str) -> Value {
        json!({
            "transactionHash": TX_HASH,
            "status": status,
            "contractAddress": contract_address,
            "blockNumber": "0x10"
        })
    }

    /// A sepolia node that answers every receipt query with `receipt`.
    async fn node(receipt: Value) -> Url {
        spawn_rpc(move |method| match method {
            "eth_chainId" => json!({"result": SEPOLIA_HEX}),
            "eth_getTransactionReceipt" => json!({"result": receipt.clone()}),
            _ => json!({"error": {"code": -32601, "message": "method not found"}}),
        })
        .await
    }

    #[tokio::test]
    async fn test_receipt_address_wins() {
        let fixture = Fixture::new(FORGE_OK);
        let url = node(receipt("0x1", MINED)).await;

        let result = fixture
            .deployer
            .deploy("Counter", &[], &profile(url, Duration::from_secs(5)))
            .await
            .expect("deployment should succeed");

        assert_eq!(result.address, Address::from_str(MINED).unwrap());
        assert_eq!(result.tx_hash, B256::from_str(TX_HASH).unwrap());
        assert_eq!(result.abi[0]["name"], json!("increment"));

        let args = fixture.forge_args().expect("forge should have run");
        let chain = args.iter().position(|a| a == "--chain").unwrap();
        assert_eq!(args[chain + 1], "11155111");
    }

    #[tokio::test]
    async fn test_reported_address_without_receipt_address() {
        let fixture = Fixture::new(FORGE_OK);
        let url = node(json!({"transactionHash": TX_HASH, "status": "0x1"})).await;

        let result = fixture
            .deployer
            .deploy("Counter", &[], &profile(url, Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(result.address, Address::from_str(REPORTED).unwrap());
    }

    #[tokio::test]
    async fn test_failed_receipt_is_reverted() {
        let fixture = Fixture::new(FORGE_OK);
        let url = node(receipt("0x0", REPORTED)).await;

        let err = fixture
            .deployer
            .deploy("Counter", &[], &profile(url, Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::DeploymentReverted { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_pending_receipt_times_out() {
        let fixture = Fixture::new(FORGE_OK);
        let url = node(Value::Null).await;

        let err = fixture
            .deployer
            .deploy("Counter", &[], &profile(url, Duration::from_millis(500)))
            .await
            .unwrap_err();

        match err {
            DeployError::DeploymentTimeout { contract, timeout_ms } => {
                assert_eq!(contract, "Counter");
                assert_eq!(timeout_ms, 500);
            }
            other => panic!("expected a timeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_forge_revert_is_reverted() {
        let fixture = Fixture::new(
            "echo 'Error: server returned an error response: error code 3: execution reverted' >&2\nexit 1\n",
        );
        let url = node(Value::Null).await;

        let err = fixture
            .deployer
            .deploy("Counter", &[], &profile(url, Duration::from_secs(5)))
            .await
            .unwrap_err();

        match err {
            DeployError::DeploymentReverted { contract, reason } => {
                assert_eq!(contract, "Counter");
                assert!(reason.contains("execution reverted"));
            }
            other => panic!("expected a revert, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_forge_failure_is_transport() {
        let fixture = Fixture::new("echo 'Error: insufficient funds for gas' >&2\nexit 1\n");
        let url = node(Value::Null).await;

        let err = fixture
            .deployer
            .deploy("Counter", &[], &profile(url, Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Transport { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_chain_mismatch_is_rejected_before_signing() {
        let fixture = Fixture::new(FORGE_OK);
        // A polygon endpoint configured for sepolia.
        let url = spawn_rpc(|_| json!({"result": "0x89"})).await;

        let err = fixture
            .deployer
            .deploy("Counter", &[], &profile(url, Duration::from_secs(5)))
            .await
            .unwrap_err();

        match err {
            DeployError::InvalidConfig(reason) => {
                assert!(reason.contains("137"));
                assert!(reason.contains("11155111"));
            }
            other => panic!("expected invalid config, got {other}"),
        }
        assert!(fixture.forge_args().is_none());
    }

    #[tokio::test]
    async fn test_failing_receipt_queries_give_up_early() {
        let fixture = Fixture::new(FORGE_OK);
        let url = spawn_rpc(|method| match method {
            "eth_chainId" => json!({"result": SEPOLIA_HEX}),
            _ => json!({"error": {"code": -32000, "message": "unauthorized"}}),
        })
        .await;

        let started = Instant::now();
        let err = fixture
            .deployer
            .deploy("Counter", &[], &profile(url, Duration::from_secs(30)))
            .await
            .unwrap_err();

        match err {
            DeployError::Transport { reason, .. } => assert!(reason.contains("unauthorized")),
            other => panic!("expected a transport error, got {other}"),
        }
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_transient_receipt_error_is_retried() {
        let fixture = Fixture::new(FORGE_OK);
        let queries = Arc::new(AtomicUsize::new(0));
        let counter = queries.clone();
        let mined = receipt("0x1", REPORTED);

        let url = spawn_rpc(move |method| match method {
            "eth_chainId" => json!({"result": SEPOLIA_HEX}),
            _ => match counter.fetch_add(1, Ordering::SeqCst) {
                0 => json!({"error": {"code": -32603, "message": "upstream busy"}}),
                1 => json!({"result": null}),
                _ => json!({"result": mined.clone()}),
            },
        })
        .await;

        let result = fixture
            .deployer
            .deploy("Counter", &[], &profile(url, Duration::from_secs(5)))
            .await
            .expect("deployment should succeed after a transient error");

        assert_eq!(result.address, Address::from_str(REPORTED).unwrap());
        assert_eq!(queries.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport() {
        let fixture = Fixture::new(FORGE_OK);
        let url = Url::parse("http://127.0.0.1:9/").unwrap();

        let err = fixture
            .deployer
            .deploy("Counter", &[], &profile(url, Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Transport { .. }), "{err}");
        assert!(fixture.forge_args().is_none());
    }
}
