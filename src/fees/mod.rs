use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::providers::{Http, Middleware, Provider};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::enums::{Chain, ChainFamily, FeeLevel, FeeSource};

/// Quotes stay fresh for 12 seconds, roughly one block on mainnet.
const CACHE_TTL_SECS: i64 = 12;
/// Upstream fee APIs get this long before we fall through to the next tier.
const UPSTREAM_TIMEOUT_SECS: u64 = 5;

/// Three-tier fee quote in the chain's native fee unit (gwei, sat/vB or
/// lamports).
#[derive(Debug, Clone, Serialize)]
pub struct FeeQuote {
    pub chain: Chain,
    pub slow: f64,
    pub standard: f64,
    pub fast: f64,
    pub unit: &'static str,
    pub source: FeeSource,
    pub fetched_at: DateTime<Utc>,
}

impl FeeQuote {
    pub fn level(&self) -> FeeLevel {
        FeeLevel::from_rate(self.standard, self.chain.typical_fee_rate())
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        (now - self.fetched_at).num_seconds() < CACHE_TTL_SECS
    }
}

/// Fee quoting never fails: upstream errors degrade the source, not the
/// call.
#[async_trait]
pub trait FeeQuoter: Send + Sync {
    async fn quote(&self, chain: Chain) -> FeeQuote;
}

pub struct FeeOracle {
    http: reqwest::Client,
    cache: Arc<RwLock<HashMap<Chain, FeeQuote>>>,
    etherscan_api_key: Option<String>,
    rpc_urls: HashMap<Chain, String>,
}

#[derive(Deserialize)]
struct GasOracleResponse {
    status: String,
    result: Option<GasOracleResult>,
}

#[derive(Deserialize)]
struct GasOracleResult {
    #[serde(rename = "SafeGasPrice")]
    safe_gas_price: String,
    #[serde(rename = "ProposeGasPrice")]
    propose_gas_price: String,
    #[serde(rename = "FastGasPrice")]
    fast_gas_price: String,
}

#[derive(Deserialize)]
struct MempoolFeesResponse {
    #[serde(rename = "fastestFee")]
    fastest_fee: f64,
    #[serde(rename = "halfHourFee")]
    half_hour_fee: f64,
    #[serde(rename = "hourFee")]
    hour_fee: f64,
}

impl FeeOracle {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        let rpc_urls = config
            .configured_chains()
            .into_iter()
            .filter_map(|chain| config.rpc_url(chain).map(|url| (chain, url.to_string())))
            .collect();

        Self {
            http,
            cache: Arc::new(RwLock::new(HashMap::new())),
            etherscan_api_key: config.etherscan_api_key.clone(),
            rpc_urls,
        }
    }

    fn gas_oracle_request_url(base_url: &str, api_key: &str) -> String {
        format!("{}?module=gastracker&action=gasoracle&apikey={}", base_url, api_key)
    }

    async fn fetch_evm_from_oracle(&self, chain: Chain) -> Option<FeeQuote> {
        let base_url = chain.gas_oracle_url()?;
        let api_key = self.etherscan_api_key.as_deref()?;
        let url = Self::gas_oracle_request_url(base_url, api_key);

        let response = self.http.get(&url).send().await.ok()?;
        let body: GasOracleResponse = response.json().await.ok()?;
        if body.status != "1" {
            return None;
        }
        let result = body.result?;

        Some(FeeQuote {
            chain,
            slow: result.safe_gas_price.parse().ok()?,
            standard: result.propose_gas_price.parse().ok()?,
            fast: result.fast_gas_price.parse().ok()?,
            unit: chain.fee_unit(),
            source: FeeSource::Api,
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_evm_from_rpc(&self, chain: Chain) -> Option<FeeQuote> {
        let url = self.rpc_urls.get(&chain)?;
        let provider = Provider::<Http>::try_from(url.as_str()).ok()?;

        let gas_price = tokio::time::timeout(
            Duration::from_secs(UPSTREAM_TIMEOUT_SECS),
            provider.get_gas_price(),
        )
        .await
        .ok()?
        .ok()?;

        let standard = gas_price.as_u128() as f64 / 1e9;
        Some(FeeQuote {
            chain,
            slow: standard * 0.85,
            standard,
            fast: standard * 1.25,
            unit: chain.fee_unit(),
            source: FeeSource::Rpc,
            fetched_at: Utc::now(),
        })
    }

    async fn fetch_btc(&self) -> Option<FeeQuote> {
        let response = self
            .http
            .get("https://mempool.space/api/v1/fees/recommended")
            .send()
            .await
            .ok()?;
        let fees: MempoolFeesResponse = response.json().await.ok()?;

        Some(FeeQuote {
            chain: Chain::Btc,
            slow: fees.hour_fee,
            standard: fees.half_hour_fee,
            fast: fees.fastest_fee,
            unit: Chain::Btc.fee_unit(),
            source: FeeSource::Api,
            fetched_at: Utc::now(),
        })
    }

    /// Static quote used when every upstream is unreachable. Derived from
    /// the chain's typical rate so downstream level bucketing reads it as
    /// average conditions.
    pub fn fallback_quote(chain: Chain) -> FeeQuote {
        let typical = chain.typical_fee_rate();
        FeeQuote {
            chain,
            slow: typical * 0.8,
            standard: typical,
            fast: typical * 1.25,
            unit: chain.fee_unit(),
            source: FeeSource::Fallback,
            fetched_at: Utc::now(),
        }
    }

    async fn fetch(&self, chain: Chain) -> FeeQuote {
        match chain.family() {
            ChainFamily::Evm => {
                if let Some(quote) = self.fetch_evm_from_oracle(chain).await {
                    return quote;
                }
                debug!(chain = %chain, "gas oracle unavailable, falling back to rpc");
                if let Some(quote) = self.fetch_evm_from_rpc(chain).await {
                    return quote;
                }
                warn!(chain = %chain, "all fee upstreams failed, using static fallback");
                Self::fallback_quote(chain)
            }
            ChainFamily::Solana => {
                // Base fee is protocol-fixed per signature; fast adds a
                // priority fee allowance.
                FeeQuote {
                    chain,
                    slow: 5000.0,
                    standard: 5000.0,
                    fast: 10000.0,
                    unit: chain.fee_unit(),
                    source: FeeSource::Api,
                    fetched_at: Utc::now(),
                }
            }
            ChainFamily::Utxo => match self.fetch_btc().await {
                Some(quote) => quote,
                None => {
                    warn!(chain = %chain, "mempool.space unavailable, using static fallback");
                    Self::fallback_quote(chain)
                }
            },
        }
    }
}

#[async_trait]
impl FeeQuoter for FeeOracle {
    async fn quote(&self, chain: Chain) -> FeeQuote {
        let now = Utc::now();
        {
            let cache = self.cache.read().await;
            if let Some(quote) = cache.get(&chain) {
                if quote.is_fresh(now) {
                    return quote.clone();
                }
            }
        }

        let quote = self.fetch(chain).await;

        // Fallback quotes are not cached so a recovered upstream is
        // picked up on the next call.
        if quote.source != FeeSource::Fallback {
            self.cache.write().await.insert(chain, quote.clone());
        }

        quote
    }
}
