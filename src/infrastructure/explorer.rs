//! Block-explorer verified-source lookup (Blockscout API)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_json_abi::JsonAbi;
use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;

use crate::domain::{Clock, Network};
use crate::store::TtlCache;

/// How long verified ABIs are kept
pub const VERIFIED_ABI_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum spacing between requests (~6.6 req/s)
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(150);

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// ABI as reported by the explorer
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerAbi {
    pub abi: JsonAbi,
    pub verified: bool,
}

impl ExplorerAbi {
    pub fn unverified() -> Self {
        Self {
            abi: JsonAbi::new(),
            verified: false,
        }
    }
}

/// Verified-source lookup
#[async_trait::async_trait]
pub trait ExplorerClient: Send + Sync {
    async fn get_contract_abi(&self, network: Network, address: Address) -> Result<ExplorerAbi>;
}

/// Blockscout `module=contract&action=getabi` response
#[derive(Debug, Deserialize)]
struct GetAbiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// Blockscout client with its own cache, pacing and retry
pub struct BlockscoutExplorer {
    http: reqwest::Client,
    base_urls: HashMap<Network, String>,
    cache: TtlCache<(u64, Address), ExplorerAbi>,
    limiter: DefaultDirectRateLimiter,
}

impl BlockscoutExplorer {
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        let base_urls = [Network::Mainnet, Network::Testnet]
            .into_iter()
            .map(|n| (n, n.default_explorer_url().to_string()))
            .collect();
        let quota =
            Quota::with_period(MIN_REQUEST_INTERVAL).context("Invalid explorer request quota")?;
        Ok(Self {
            http,
            base_urls,
            cache: TtlCache::new(VERIFIED_ABI_TTL, clock),
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Point a network at a different API root
    pub fn with_base_url(mut self, network: Network, url: impl Into<String>) -> Self {
        self.base_urls.insert(network, url.into());
        self
    }

    async fn fetch(&self, url: &str) -> Result<GetAbiResponse> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.until_ready().await;
            let outcome = match self.http.get(url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<GetAbiResponse>()
                        .await
                        .context("Failed to parse explorer response");
                }
                Ok(resp)
                    if resp.status().is_server_error()
                        || resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    format!("explorer returned {}", resp.status())
                }
                Ok(resp) => bail!("explorer returned {}", resp.status()),
                Err(err) => format!("explorer request failed: {}", err),
            };

            if attempt >= MAX_ATTEMPTS {
                bail!("{} (after {} attempts)", outcome, attempt);
            }
            let backoff = BACKOFF_BASE * 2u32.pow(attempt - 1);
            tracing::debug!(%url, attempt, ?backoff, reason = %outcome, "retrying explorer request");
            tokio::time::sleep(backoff).await;
        }
    }
}

#[async_trait::async_trait]
impl ExplorerClient for BlockscoutExplorer {
    async fn get_contract_abi(&self, network: Network, address: Address) -> Result<ExplorerAbi> {
        let key = (network.chain_id(), address);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let base = self
            .base_urls
            .get(&network)
            .map(String::as_str)
            .unwrap_or_else(|| network.default_explorer_url());
        let url = format!(
            "{}?module=contract&action=getabi&address=0x{}",
            base.trim_end_matches('/'),
            hex::encode(address)
        );

        let response = self.fetch(&url).await?;
        let abi = parse_getabi(response)?;
        if abi.verified {
            self.cache.insert(key, abi.clone());
        }
        Ok(abi)
    }
}

fn parse_getabi(response: GetAbiResponse) -> Result<ExplorerAbi> {
    if response.status != "1" {
        tracing::debug!(message = ?response.message, "explorer has no verified ABI");
        return Ok(ExplorerAbi::unverified());
    }
    let abi = match response.result {
        // Etherscan-compatible APIs return the ABI as a JSON string
        Some(serde_json::Value::String(raw)) => {
            serde_json::from_str::<JsonAbi>(&raw).context("Explorer ABI is not valid JSON ABI")?
        }
        Some(value @ serde_json::Value::Array(_)) => {
            serde_json::from_value::<JsonAbi>(value).context("Explorer ABI is not valid JSON ABI")?
        }
        _ => return Ok(ExplorerAbi::unverified()),
    };
    Ok(ExplorerAbi {
        abi,
        verified: true,
    })
}
