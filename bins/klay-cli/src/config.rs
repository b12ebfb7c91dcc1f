//! CLI configuration.
//!
//! Values come from flags, then from `KLAY_RPC_ENDPOINT` / `KLAY_KEYSTORE_DIR`
//! (resolved by clap), then from the defaults below.

use std::path::{Path, PathBuf};

use klay_core::Address;

/// Default JSON-RPC endpoint of a local node.
pub const DEFAULT_RPC_ENDPOINT: &str = "http://127.0.0.1:8551";

/// Resolved configuration shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// JSON-RPC endpoint used to fetch nonce, gas price and chain id.
    pub rpc_endpoint: String,
    /// Directory new keystore files are written to.
    pub keystore_dir: PathBuf,
    /// Never contact a node; every field must be supplied.
    pub offline: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: DEFAULT_RPC_ENDPOINT.to_string(),
            keystore_dir: default_keystore_dir(),
            offline: false,
        }
    }
}

impl CliConfig {
    /// Apply defaults to whatever the command line left unset.
    pub fn resolve(rpc_endpoint: Option<String>, keystore_dir: Option<PathBuf>, offline: bool) -> Self {
        let defaults = Self::default();
        Self {
            rpc_endpoint: rpc_endpoint.unwrap_or(defaults.rpc_endpoint),
            keystore_dir: keystore_dir.unwrap_or(defaults.keystore_dir),
            offline,
        }
    }

    /// Keystore path for `address` inside the keystore directory.
    pub fn keystore_path(&self, address: &Address) -> PathBuf {
        keystore_file(&self.keystore_dir, address)
    }
}

fn default_keystore_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("klay")
        .join("keystore")
}

fn keystore_file(dir: &Path, address: &Address) -> PathBuf {
    dir.join(format!("{}.json", address.to_hex().trim_start_matches("0x")))
}
