//! Command builder for Anvil.

/// The fork only ever listens on the loopback interface.
pub const ANVIL_HOST: &str = "127.0.0.1";

/// Builder for Anvil commands.
#[derive(Debug, Clone)]
pub struct AnvilCmdBuilder {
    port: u16,
    chain_id: u64,
    fork_url: Option<String>,
    fork_block_number: Option<u64>,
}

impl AnvilCmdBuilder {
    /// Create a new Anvil command builder.
    pub fn new(chain_id: u64) -> Self {
        Self {
            port: 8545,
            chain_id,
            fork_url: None,
            fork_block_number: None,
        }
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the fork URL.
    pub fn fork_url(mut self, url: impl Into<String>) -> Self {
        self.fork_url = Some(url.into());
        self
    }

    /// Set the fork block number.
    pub fn fork_block_number(mut self, block_number: Option<u64>) -> Self {
        self.fork_block_number = block_number;
        self
    }

    /// Build the command as a vector of strings.
    pub fn build(self) -> Vec<String> {
        let mut cmd = vec![
            "--host".to_string(),
            ANVIL_HOST.to_string(),
            "--port".to_string(),
            self.port.to_string(),
            "--chain-id".to_string(),
            self.chain_id.to_string(),
        ];

        if let Some(fork_url) = self.fork_url {
            cmd.push("--fork-url".to_string());
            cmd.push(fork_url);
        }

        if let Some(fork_block_number) = self.fork_block_number {
            cmd.push("--fork-block-number".to_string());
            cmd.push(fork_block_number.to_string());
        }

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anvil_cmd_builder() {
        let cmd = AnvilCmdBuilder::new(31337)
            .port(9545)
            .fork_url("https://polygon-rpc.com")
            .fork_block_number(Some(59_462_027))
            .build();

        let pos = |flag: &str| cmd.iter().position(|a| a == flag).unwrap();
        assert_eq!(cmd[pos("--host") + 1], "127.0.0.1");
        assert_eq!(cmd[pos("--chain-id") + 1], "31337");
        assert_eq!(cmd[pos("--port") + 1], "9545");
        assert_eq!(cmd[pos("--fork-url") + 1], "https://polygon-rpc.com");
        assert_eq!(cmd[pos("--fork-block-number") + 1], "59462027");
    }

    #[test]
    fn test_no_fork_by_default() {
        let cmd = AnvilCmdBuilder::new(31337).build();
        assert!(!cmd.contains(&"--fork-url".to_string()));
        assert!(!cmd.contains(&"--fork-block-number".to_string()));
    }
}
