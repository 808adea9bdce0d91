//! ABI resolution result types

use alloy_json_abi::JsonAbi;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Where an ABI came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbiSource {
    /// User-supplied override
    Manual,
    /// Verified source on the block explorer
    ExplorerVerified,
    /// Static registry of well-known contracts
    KnownRegistry,
    /// Single-function guess from the public signature directory
    DirectoryGuess,
}

impl AbiSource {
    /// Confidence implied by this source
    pub fn confidence(self) -> Confidence {
        match self {
            AbiSource::Manual | AbiSource::ExplorerVerified | AbiSource::KnownRegistry => {
                Confidence::High
            }
            AbiSource::DirectoryGuess => Confidence::Low,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AbiSource::Manual => "manual",
            AbiSource::ExplorerVerified => "explorer-verified",
            AbiSource::KnownRegistry => "known-registry",
            AbiSource::DirectoryGuess => "directory-guess",
        }
    }
}

/// How much a decode can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    /// Reserved for explorer-unverified ABIs found through an implementation
    Medium,
    Low,
}

/// Output of the ABI resolver
#[derive(Debug, Clone, PartialEq)]
pub struct AbiResolution {
    pub abi: JsonAbi,
    pub source: AbiSource,
    pub confidence: Confidence,
    pub is_proxy: bool,
    /// Implementation behind a proxy, when it could be read
    pub implementation_address: Option<Address>,
    /// Why nothing was found
    pub error: Option<String>,
}

impl AbiResolution {
    /// A successful resolution from `source`
    pub fn found(abi: JsonAbi, source: AbiSource) -> Self {
        Self {
            abi,
            source,
            confidence: source.confidence(),
            is_proxy: false,
            implementation_address: None,
            error: None,
        }
    }

    /// Nothing usable was found
    pub fn missing(error: impl Into<String>) -> Self {
        Self {
            abi: JsonAbi::new(),
            source: AbiSource::DirectoryGuess,
            confidence: Confidence::Low,
            is_proxy: false,
            implementation_address: None,
            error: Some(error.into()),
        }
    }

    pub fn with_proxy(mut self, is_proxy: bool, implementation: Option<Address>) -> Self {
        self.is_proxy = is_proxy;
        self.implementation_address = implementation;
        self
    }

    /// True when the ABI carries at least one function
    pub fn has_abi(&self) -> bool {
        self.abi.functions().next().is_some()
    }
}
