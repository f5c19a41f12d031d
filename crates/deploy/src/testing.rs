//! Test doubles shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use alloy_core::primitives::{Address, B256};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};
use url::Url;

use crate::{
    config::{ConfigSource, POLYGON_RPC, SEPOLIA_RPC, TEST_ACCOUNT_PRIVATE_KEY},
    deployer::{ContractDeployer, DeploymentResult},
    error::{DeployError, DeployResult},
    network::NetworkProfile,
};

#[derive(Debug, Clone, Copy)]
pub enum FailureKind {
    Compilation,
    Timeout,
    Revert,
}

/// Records every call and hands out sequential addresses.
#[derive(Debug, Default)]
pub struct FakeDeployer {
    failures: HashMap<String, FailureKind>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeDeployer {
    pub fn failing(mut self, contract: &str, kind: FailureKind) -> Self {
        self.failures.insert(contract.to_string(), kind);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn fake_abi(contract_name: &str) -> Value {
    json!([{"type": "constructor", "inputs": []}, {"type": "function", "name": contract_name, "inputs": []}])
}

impl ContractDeployer for FakeDeployer {
    async fn deploy(
        &self,
        contract_name: &str,
        constructor_args: &[String],
        _profile: &NetworkProfile,
    ) -> DeployResult<DeploymentResult> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((contract_name.to_string(), constructor_args.to_vec()));
            calls.len() as u8
        };

        let contract = contract_name.to_string();
        match self.failures.get(contract_name) {
            Some(FailureKind::Compilation) => Err(DeployError::CompilationError {
                contract,
                reason: "no build artifact".to_string(),
            }),
            Some(FailureKind::Timeout) => Err(DeployError::DeploymentTimeout {
                contract,
                timeout_ms: 600_000,
            }),
            Some(FailureKind::Revert) => Err(DeployError::DeploymentReverted {
                contract,
                reason: "execution reverted".to_string(),
            }),
            None => Ok(DeploymentResult {
                abi: fake_abi(contract_name),
                contract_name: contract,
                address: Address::with_last_byte(n),
                tx_hash: B256::with_last_byte(n),
            }),
        }
    }

    fn abi(&self, contract_name: &str) -> DeployResult<Value> {
        Ok(fake_abi(contract_name))
    }
}

/// The `local` profile; no process is started by tests using it directly.
pub fn local_profile() -> NetworkProfile {
    NetworkProfile::resolve(
        "local",
        &ConfigSource::from_pairs([(POLYGON_RPC, "https://polygon.example/")]),
    )
    .unwrap()
}

/// A live testnet profile.
pub fn live_profile() -> NetworkProfile {
    NetworkProfile::resolve(
        "sepolia",
        &ConfigSource::from_pairs([
            (SEPOLIA_RPC, "https://sepolia.example/"),
            (TEST_ACCOUNT_PRIVATE_KEY, "0xtest"),
        ]),
    )
    .unwrap()
}

type Respond = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// Serve JSON-RPC on a loopback port until the test runtime shuts down.
///
/// `respond` maps a method name to the response body; `jsonrpc` and `id` are
/// filled in. One request per connection.
pub async fn spawn_rpc(respond: impl Fn(&str) -> Value + Send + Sync + 'static) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
    let respond: Respond = Arc::new(respond);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let respond = respond.clone();
            tokio::spawn(async move {
                let _ = serve_rpc(stream, respond).await;
            });
        }
    });

    url
}

async fn serve_rpc(stream: TcpStream, respond: Respond) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut content_length = 0;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).await?;
    let request: Value = serde_json::from_slice(&body).unwrap_or_default();

    let mut response = respond(request["method"].as_str().unwrap_or_default());
    response["jsonrpc"] = json!("2.0");
    response["id"] = request["id"].clone();
    let payload = response.to_string();

    let mut stream = reader.into_inner();
    stream
        .write_all(
            format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                payload.len()
            )
            .as_bytes(),
        )
        .await?;
    stream.shutdown().await
}
