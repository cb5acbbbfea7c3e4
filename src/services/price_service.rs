use std::collections::HashMap;
use std::sync::Arc;
use std::time::{ Duration, SystemTime };

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::enums::Chain;

const BINANCE_API_BASE: &str = "https://api.binance.com/api/v3";
const CACHE_DURATION_SECS: u64 = 60;

#[derive(Debug, Clone)]
struct CachedPrice {
    usd: f64,
    fetched_at: SystemTime,
}

/// Native-asset spot prices used to express fee rates in USD. Fee math
/// must never stall on a price lookup, so upstream failures fall back to
/// static reference prices.
pub struct PriceService {
    client: reqwest::Client,
    cache: Arc<RwLock<HashMap<String, CachedPrice>>>,
}

#[derive(Deserialize)]
struct BinanceTickerPrice {
    price: String,
}

impl PriceService {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// USD spot price of the chain's native asset.
    pub async fn spot_usd(&self, chain: Chain) -> f64 {
        let symbol = chain.native_symbol();

        if let Some(cached) = self.get_from_cache(symbol).await {
            return cached;
        }

        match self.fetch_ticker(symbol).await {
            Some(price) => {
                self.update_cache(symbol, price).await;
                price
            }
            None => {
                warn!(symbol, "price lookup failed, using static fallback");
                Self::fallback_price(symbol)
            }
        }
    }

    async fn get_from_cache(&self, symbol: &str) -> Option<f64> {
        let cache = self.cache.read().await;
        let cached = cache.get(symbol)?;
        let age = cached.fetched_at.elapsed().ok()?;
        if age < Duration::from_secs(CACHE_DURATION_SECS) {
            Some(cached.usd)
        } else {
            None
        }
    }

    async fn update_cache(&self, symbol: &str, usd: f64) {
        let mut cache = self.cache.write().await;
        cache.insert(symbol.to_string(), CachedPrice {
            usd,
            fetched_at: SystemTime::now(),
        });
    }

    async fn fetch_ticker(&self, symbol: &str) -> Option<f64> {
        let url = format!("{}/ticker/price?symbol={}USDT", BINANCE_API_BASE, symbol);
        let response = self.client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let ticker: BinanceTickerPrice = response.json().await.ok()?;
        ticker.price.parse().ok()
    }

    /// Pre-warm the cache so tests never reach the ticker API.
    #[cfg(test)]
    pub(crate) async fn preload(&self, symbol: &str, usd: f64) {
        self.update_cache(symbol, usd).await;
    }

    fn fallback_price(symbol: &str) -> f64 {
        match symbol {
            "ETH" => 3000.0,
            "BNB" => 600.0,
            "POL" => 0.5,
            "AVAX" => 30.0,
            "SOL" => 150.0,
            "BTC" => 60000.0,
            _ => 1.0,
        }
    }
}

impl Default for PriceService {
    fn default() -> Self {
        Self::new()
    }
}
