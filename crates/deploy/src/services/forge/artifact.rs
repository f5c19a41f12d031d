//! Foundry build artifacts.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{DeployError, DeployResult};

#[derive(Debug, Deserialize)]
struct RawArtifact {
    abi: Option<Value>,
    #[serde(default)]
    bytecode: Option<RawBytecode>,
    #[serde(default)]
    metadata: Option<RawMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawBytecode {
    object: String,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    settings: RawSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    #[serde(default)]
    compilation_target: serde_json::Map<String, Value>,
}

/// The parts of a build artifact needed to deploy and record a contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub contract_name: String,
    pub abi: Value,
    /// Source file the contract was compiled from, when the artifact says so.
    pub source_path: Option<String>,
    pub artifact_path: PathBuf,
}

impl Artifact {
    /// Load the artifact of `contract_name` from a Foundry `out/` directory.
    ///
    /// Looks in `<dir>/<Name>.sol/<Name>.json` first, then in any
    /// `<dir>/*/<Name>.json` for contracts declared in differently named files.
    pub fn load(artifacts_dir: &Path, contract_name: &str) -> DeployResult<Self> {
        let compilation_error = |reason: String| DeployError::CompilationError {
            contract: contract_name.to_string(),
            reason,
        };

        let artifact_path = Self::locate(artifacts_dir, contract_name).ok_or_else(|| {
            compilation_error(format!(
                "no build artifact found under {}",
                artifacts_dir.display()
            ))
        })?;

        let content = std::fs::read_to_string(&artifact_path)
            .map_err(|e| compilation_error(format!("{}: {e}", artifact_path.display())))?;
        let raw: RawArtifact = serde_json::from_str(&content)
            .map_err(|e| compilation_error(format!("{}: {e}", artifact_path.display())))?;

        let abi = match raw.abi {
            Some(abi @ Value::Array(_)) => abi,
            _ => return Err(compilation_error("artifact has no ABI".to_string())),
        };

        let bytecode = raw.bytecode.map(|b| b.object).unwrap_or_default();
        if bytecode.trim_start_matches("0x").is_empty() {
            return Err(compilation_error(
                "artifact has no bytecode (abstract contract or interface?)".to_string(),
            ));
        }

        let source_path = raw.metadata.and_then(|metadata| {
            metadata
                .settings
                .compilation_target
                .into_iter()
                .find(|(_, name)| name.as_str() == Some(contract_name))
                .map(|(path, _)| path)
        });

        Ok(Self {
            contract_name: contract_name.to_string(),
            abi,
            source_path,
            artifact_path,
        })
    }

    fn locate(artifacts_dir: &Path, contract_name: &str) -> Option<PathBuf> {
        let file_name = format!("{contract_name}.json");

        let direct = artifacts_dir
            .join(format!("{contract_name}.sol"))
            .join(&file_name);
        if direct.is_file() {
            return Some(direct);
        }

        let mut candidates: Vec<PathBuf> = std::fs::read_dir(artifacts_dir)
            .ok()?
            .filter_map(|entry| {
                let path = entry.ok()?.path().join(&file_name);
                path.is_file().then_some(path)
            })
            .collect();
        candidates.sort();
        candidates.into_iter().next()
    }

    /// Contract identifier understood by `forge create`.
    pub fn identifier(&self) -> String {
        match &self.source_path {
            Some(path) => format!("{path}:{}", self.contract_name),
            None => self.contract_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempdir::TempDir;

    fn write_artifact(dir: &Path, file: &str, name: &str, artifact: Value) {
        let path = dir.join(file);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join(format!("{name}.json")), artifact.to_string()).unwrap();
    }

    #[test]
    fn test_load_artifact() {
        let temp_dir = TempDir::new("forgeline-artifacts").expect("Failed to create temp dir");
        let abi = json!([{"type": "function", "name": "createToken", "inputs": [], "outputs": []}]);
        write_artifact(
            temp_dir.path(),
            "TokenFactory.sol",
            "TokenFactory",
            json!({
                "abi": abi,
                "bytecode": {"object": "0x6080604052"},
                "metadata": {"settings": {"compilationTarget": {"src/TokenFactory.sol": "TokenFactory"}}}
            }),
        );

        let artifact = Artifact::load(temp_dir.path(), "TokenFactory").unwrap();
        assert_eq!(artifact.abi, abi);
        assert_eq!(artifact.identifier(), "src/TokenFactory.sol:TokenFactory");
    }

    #[test]
    fn test_contract_in_differently_named_file() {
        let temp_dir = TempDir::new("forgeline-artifacts").expect("Failed to create temp dir");
        write_artifact(
            temp_dir.path(),
            "Tokens.sol",
            "CustomToken",
            json!({"abi": [], "bytecode": {"object": "0x60"}}),
        );

        let artifact = Artifact::load(temp_dir.path(), "CustomToken").unwrap();
        assert_eq!(artifact.identifier(), "CustomToken");
    }

    #[test]
    fn test_missing_artifact() {
        let temp_dir = TempDir::new("forgeline-artifacts").expect("Failed to create temp dir");
        let err = Artifact::load(temp_dir.path(), "GovernanceFactory").unwrap_err();
        assert!(
            matches!(err, DeployError::CompilationError { contract, .. } if contract == "GovernanceFactory")
        );
    }

    #[test]
    fn test_interface_has_no_bytecode() {
        let temp_dir = TempDir::new("forgeline-artifacts").expect("Failed to create temp dir");
        write_artifact(
            temp_dir.path(),
            "IToken.sol",
            "IToken",
            json!({"abi": [], "bytecode": {"object": "0x"}}),
        );

        assert!(matches!(
            Artifact::load(temp_dir.path(), "IToken"),
            Err(DeployError::CompilationError { .. })
        ));
    }
}
