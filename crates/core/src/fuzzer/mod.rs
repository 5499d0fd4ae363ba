//! Echidna configuration emitted next to the harness.

use serde::{Deserialize, Serialize};

use crate::config::{FuzzerSettings, Mode, NetworkInfo};

/// Largest contract code size accepted by the fuzzer VM (`0xffff`).
pub const CODE_SIZE_LIMIT: u32 = 0xffff;

pub const CONFIG_FILE_NAME: &str = "CryticConfig.yaml";

/// Serialized field order is the order of declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EchidnaConfig {
    pub test_mode: String,
    pub test_limit: u64,
    pub corpus_dir: String,
    pub code_size: u32,
    pub seq_len: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_block: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sender: Vec<String>,
}

impl EchidnaConfig {
    /// Build the config for a harness. `default_corpus_dir` is used when the
    /// settings do not name one. Network fields are only set in fork mode.
    pub fn new(
        settings: &FuzzerSettings,
        mode: Mode,
        network: Option<&NetworkInfo>,
        default_corpus_dir: &str,
    ) -> Self {
        let mut config = Self {
            test_mode: "assertion".to_string(),
            test_limit: settings.campaign_length,
            corpus_dir: settings
                .corpus_dir
                .clone()
                .unwrap_or_else(|| default_corpus_dir.to_string()),
            code_size: CODE_SIZE_LIMIT,
            seq_len: settings.seq_len,
            contract_addr: settings.contract_addr.clone(),
            rpc_url: None,
            rpc_block: None,
            sender: Vec::new(),
        };
        if mode == Mode::Fork {
            if let Some(network) = network {
                config.rpc_url = network.rpc_url.clone();
                config.rpc_block = network.block;
            }
            config.sender = settings.senders.clone();
        }
        config
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_mode_omits_network_fields() {
        let network = NetworkInfo {
            block: Some(10),
            timestamp: None,
            rpc_url: Some("http://localhost:8545".into()),
        };
        let settings = FuzzerSettings { senders: vec!["0x10000".into()], ..Default::default() };
        let config = EchidnaConfig::new(&settings, Mode::Deploy, Some(&network), "corpus");
        assert!(config.rpc_url.is_none());
        assert!(config.sender.is_empty());
        let yaml = config.to_yaml().expect("yaml");
        assert!(yaml.contains("testMode: assertion"));
        assert!(!yaml.contains("rpcUrl"));
    }
}
