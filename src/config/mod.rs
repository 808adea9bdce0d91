use std::fs;
use std::path::PathBuf;

use alloy_primitives::Address;
use serde::Deserialize;

use crate::domain::abi::{KnownContractKind, KnownRegistry};
use crate::domain::Network;
use crate::infrastructure::abi::{DEFAULT_DIRECTORY_URL, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES};

#[derive(Debug, Clone, Deserialize)]
pub struct KnownContractSpec {
    pub address: String,
    pub kind: KnownContractKind,
}

/// Per-network endpoint overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: Option<String>,
    pub explorer_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub network: Network,
    pub mainnet: NetworkConfig,
    pub testnet: NetworkConfig,
    pub directory_url: Option<String>,
    pub manual_abi_db: Option<PathBuf>,
    pub max_depth: usize,
    pub max_nodes: usize,
    pub known_contracts: Vec<KnownContractSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::default(),
            mainnet: NetworkConfig::default(),
            testnet: NetworkConfig::default(),
            directory_url: None,
            manual_abi_db: None,
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            known_contracts: Vec::new(),
        }
    }
}

impl Config {
    pub fn network_config(&self, network: Network) -> &NetworkConfig {
        match network {
            Network::Mainnet => &self.mainnet,
            Network::Testnet => &self.testnet,
        }
    }

    pub fn rpc_url(&self, network: Network) -> String {
        self.network_config(network)
            .rpc_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| network.default_rpc_url().to_string())
    }

    pub fn explorer_url(&self, network: Network) -> String {
        self.network_config(network)
            .explorer_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| network.default_explorer_url().to_string())
    }

    pub fn directory_url(&self) -> String {
        self.directory_url
            .clone()
            .unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_string())
    }

    pub fn manual_abi_db_path(&self) -> Option<PathBuf> {
        self.manual_abi_db.clone().or_else(manual_abi_db_path)
    }

    /// Known registry built from `[[known_contracts]]`
    ///
    /// Entries with an unparseable address are skipped with a warning.
    pub fn known_registry(&self) -> KnownRegistry {
        let mut registry = KnownRegistry::new();
        for spec in &self.known_contracts {
            match spec.address.trim().parse::<Address>() {
                Ok(address) => registry.insert_kind(address, spec.kind),
                Err(err) => {
                    tracing::warn!(address = %spec.address, error = %err, "skipping known contract");
                }
            }
        }
        registry
    }
}

pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Config::default(),
    };
    parse(&content).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), error = %err, "invalid config, using defaults");
        Config::default()
    })
}

pub fn parse(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(content)
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("TIMELOCK_INSPECTOR_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("timelock-inspector").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(
            home.join(".config")
                .join("timelock-inspector")
                .join("config.toml"),
        );
    }

    directories::ProjectDirs::from("io", "rootstock", "timelock-inspector")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn data_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from) {
        return Some(xdg.join("timelock-inspector"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".local").join("share").join("timelock-inspector"));
    }
    directories::ProjectDirs::from("io", "rootstock", "timelock-inspector")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

pub fn manual_abi_db_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("manual_abis.sqlite3"))
}
