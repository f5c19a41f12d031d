//! Anvil service backing the local rehearsal network.
//!
//! The `local` profile forks a live network at a pinned block, so every
//! rehearsal starts from the same state.

mod cmd;

use std::{process::Stdio, time::Duration};

use tokio::process::{Child, Command};
use url::Url;

pub use cmd::AnvilCmdBuilder;

use crate::{
    error::{DeployError, DeployResult},
    network::{NetworkProfile, RpcEndpoint},
    rpc,
};

/// How long to wait for the fork to answer RPC calls.
const READY_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay between two readiness checks.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Handler for a running Anvil fork.
///
/// The child process is killed when the handler is dropped.
#[derive(Debug)]
pub struct AnvilHandler {
    child: Child,
    /// URL the fork is listening on.
    pub rpc_url: Url,
}

impl AnvilHandler {
    /// Start an Anvil fork for `profile`.
    ///
    /// Returns `Ok(None)` when the profile targets a live network.
    pub async fn start_for(
        anvil_bin: &str,
        profile: &NetworkProfile,
    ) -> DeployResult<Option<AnvilHandler>> {
        let RpcEndpoint::Fork {
            base,
            block_number,
            port,
        } = &profile.rpc_endpoint
        else {
            return Ok(None);
        };

        let args = AnvilCmdBuilder::new(profile.chain_id)
            .port(*port)
            .fork_url(base.as_str())
            .fork_block_number(Some(*block_number))
            .build();

        let rpc_url = profile.rpc_endpoint.url()?;
        Self::spawn(anvil_bin, args, rpc_url, profile.chain_id)
            .await
            .map(Some)
    }

    async fn spawn(
        anvil_bin: &str,
        args: Vec<String>,
        rpc_url: Url,
        chain_id: u64,
    ) -> DeployResult<Self> {
        tracing::info!(%rpc_url, chain_id, "Starting local fork...");

        let child = Command::new(anvil_bin)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeployError::LocalFork(format!("failed to spawn `{anvil_bin}`: {e}")))?;

        let handler = Self { child, rpc_url };
        handler.wait_until_ready(chain_id).await?;

        tracing::info!(rpc_url = %handler.rpc_url, "Local fork ready");
        Ok(handler)
    }

    async fn wait_until_ready(&self, chain_id: u64) -> DeployResult<()> {
        let client = rpc::create_client().map_err(|e| DeployError::LocalFork(format!("{e:#}")))?;
        let client = &client;
        let url = self.rpc_url.as_str();

        rpc::wait_until_ready("anvil", READY_TIMEOUT, READY_POLL_INTERVAL, move || async move {
            let reported = rpc::get_chain_id(client, url).await?;
            anyhow::ensure!(
                reported == chain_id,
                "fork reports chain id {reported}, expected {chain_id}"
            );
            Ok::<(), anyhow::Error>(())
        })
        .await
        .map_err(|e| DeployError::LocalFork(format!("{e:#}")))
    }

    /// Stop the fork.
    pub async fn stop(mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::warn!(err = %e, "Failed to stop local fork");
        } else {
            tracing::info!("Local fork stopped");
        }
    }
}
