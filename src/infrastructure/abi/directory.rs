//! Public 4-byte signature directory with a 24-hour selector cache

use std::sync::Arc;
use std::time::Duration;

use alloy_json_abi::Function;
use alloy_primitives::{hex, Selector};
use serde::Deserialize;

use super::decoder::{decode_with_function, selector_of};
use crate::domain::Clock;
use crate::store::TtlCache;

pub const DEFAULT_DIRECTORY_URL: &str = "https://www.4byte.directory/api/v1";

/// How long directory answers are kept
pub const SIGNATURE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Request(String),
    #[error("directory returned status {0}")]
    Status(u16),
    #[error("failed to parse directory response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for DirectoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DirectoryError::Parse(err.to_string())
        } else {
            DirectoryError::Request(err.to_string())
        }
    }
}

/// Raw directory query: selector to text signatures, uncached
#[async_trait::async_trait]
pub trait SignatureFetcher: Send + Sync {
    async fn fetch(&self, selector: Selector) -> Result<Vec<String>, DirectoryError>;
}

/// 4byte.directory response structures
#[derive(Debug, Deserialize)]
struct FourByteResponse {
    results: Vec<FourByteSignature>,
}

#[derive(Debug, Deserialize)]
struct FourByteSignature {
    text_signature: String,
    #[allow(dead_code)]
    hex_signature: String,
}

/// `GET /signatures/?hex_signature={selector}`
pub struct FourByteDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl FourByteDirectory {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

#[async_trait::async_trait]
impl SignatureFetcher for FourByteDirectory {
    async fn fetch(&self, selector: Selector) -> Result<Vec<String>, DirectoryError> {
        let url = format!(
            "{}/signatures/?hex_signature=0x{}",
            self.base_url.trim_end_matches('/'),
            hex::encode(selector)
        );
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(DirectoryError::Status(response.status().as_u16()));
        }
        let data: FourByteResponse = response.json().await?;
        Ok(data.results.into_iter().map(|s| s.text_signature).collect())
    }
}

/// Best single-function guess for some calldata
#[derive(Debug, Clone)]
pub struct SignatureGuess {
    pub signature: String,
    /// Parsed signature with positional parameter names
    pub fragment: Function,
    /// More than one directory entry shares the selector
    pub has_collision: bool,
    pub candidates: Vec<String>,
}

/// Cached directory client
pub struct SignatureDirectory {
    fetcher: Arc<dyn SignatureFetcher>,
    cache: TtlCache<Selector, Vec<String>>,
}

impl SignatureDirectory {
    pub fn new(fetcher: Arc<dyn SignatureFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            cache: TtlCache::new(SIGNATURE_TTL, clock),
        }
    }

    /// Candidate signatures for a selector (cache first)
    pub async fn lookup(&self, selector: Selector) -> Result<Vec<String>, DirectoryError> {
        if let Some(hit) = self.cache.get(&selector) {
            tracing::debug!(selector = %hex::encode(selector), count = hit.len(), "directory cache hit");
            return Ok(hit);
        }

        let signatures = self.fetcher.fetch(selector).await?;
        tracing::debug!(
            selector = %hex::encode(selector),
            count = signatures.len(),
            "directory lookup"
        );
        self.cache.insert(selector, signatures.clone());
        Ok(signatures)
    }

    /// Pick the most plausible signature for `calldata`
    ///
    /// Candidates are tried in directory order; the first one that decodes
    /// the arguments wins, otherwise the first that parses at all.
    pub async fn best_guess(&self, calldata: &[u8]) -> Result<Option<SignatureGuess>, DirectoryError> {
        let Some(selector) = selector_of(calldata) else {
            return Ok(None);
        };
        let candidates = self.lookup(selector).await?;
        let has_collision = candidates.len() > 1;

        let mut fallback: Option<(String, Function)> = None;
        for candidate in &candidates {
            let fragment = match parse_fragment(candidate) {
                Ok(fragment) if fragment.selector() == selector => fragment,
                Ok(_) => {
                    tracing::debug!(%candidate, "directory signature hashes to another selector");
                    continue;
                }
                Err(err) => {
                    tracing::debug!(%candidate, error = %err, "unparseable directory signature");
                    continue;
                }
            };
            if decode_with_function(&fragment, calldata).is_ok() {
                return Ok(Some(SignatureGuess {
                    signature: candidate.clone(),
                    fragment,
                    has_collision,
                    candidates,
                }));
            }
            if fallback.is_none() {
                fallback = Some((candidate.clone(), fragment));
            }
        }

        Ok(fallback.map(|(signature, fragment)| SignatureGuess {
            signature,
            fragment,
            has_collision,
            candidates,
        }))
    }
}

/// Parse `transfer(address,uint256)` into a function with `param0..` names
pub fn parse_fragment(signature: &str) -> Result<Function, DirectoryError> {
    let mut function = Function::parse(signature.trim())
        .map_err(|e| DirectoryError::Parse(format!("'{}': {}", signature, e)))?;
    for (idx, input) in function.inputs.iter_mut().enumerate() {
        if input.name.is_empty() {
            input.name = format!("param{}", idx);
        }
    }
    Ok(function)
}
