//! Supported Rootstock networks

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn chain_id(self) -> u64 {
        match self {
            Network::Mainnet => 30,
            Network::Testnet => 31,
        }
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://public-node.rsk.co",
            Network::Testnet => "https://public-node.testnet.rsk.co",
        }
    }

    /// Blockscout API root
    pub fn default_explorer_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://rootstock.blockscout.com/api",
            Network::Testnet => "https://rootstock-testnet.blockscout.com/api",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "rsk" | "rootstock" | "30" => Ok(Network::Mainnet),
            "testnet" | "rsk-testnet" | "31" => Ok(Network::Testnet),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}
