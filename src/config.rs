use std::collections::HashMap;
use std::env;

use crate::enums::Chain;

/// Per-chain configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain: Chain,
    pub rpc_urls: Vec<String>,
    pub chain_id: Option<u64>,
    pub native_symbol: String,
}

/// Tunables for the scheduler tick. Defaults match the cron cadence the
/// engine is triggered on (every 5 minutes, 50 rows per run).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub batch_limit: u64,
    pub max_retries: i32,
    pub dispatch_timeout_secs: u64,
    pub tick_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_limit: 50,
            max_retries: 3,
            dispatch_timeout_secs: 120,
            tick_concurrency: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub encryption_key: Vec<u8>,
    pub cron_secret: String,
    pub chain_configs: HashMap<Chain, ChainConfig>,
    pub etherscan_api_key: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub scheduler: SchedulerConfig,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")?;

        let encryption_key_hex = env::var("ENCRYPTION_KEY")?;
        let encryption_key = hex::decode(&encryption_key_hex)
            .map_err(|_| "ENCRYPTION_KEY must be a valid hex string")?;

        if encryption_key.len() != 32 {
            return Err("ENCRYPTION_KEY must be 32 bytes (64 hex characters)".into());
        }

        let cron_secret = env::var("CRON_SECRET")?;
        if cron_secret.trim().is_empty() {
            return Err("CRON_SECRET cannot be empty".into());
        }

        // Build chain configs dynamically from env vars
        let mut chain_configs = HashMap::new();

        for &chain in Chain::all() {
            let rpc_key = format!("{}_RPC_URLS", chain.as_str());

            // Only configure chains that have RPC URLs set
            if let Ok(rpc_val) = env::var(&rpc_key) {
                let rpc_urls = Self::parse_rpc_urls(&rpc_val)?;

                chain_configs.insert(chain, ChainConfig {
                    chain,
                    rpc_urls,
                    chain_id: chain.chain_id(),
                    native_symbol: chain.native_symbol().to_string(),
                });
            }
        }

        if chain_configs.is_empty() {
            return Err("No chain RPC URLs configured. Set at least one *_RPC_URLS env var.".into());
        }

        let etherscan_api_key = env::var("ETHERSCAN_API_KEY").ok();
        let notify_webhook_url = env::var("NOTIFY_WEBHOOK_URL").ok();

        let scheduler = SchedulerConfig {
            batch_limit: env::var("TICK_BATCH_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            max_retries: env::var("MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            dispatch_timeout_secs: env::var("DISPATCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            tick_concurrency: env::var("TICK_CONCURRENCY")
                .unwrap_or_else(|_| "8".to_string())
                .parse()?,
        };

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;

        Ok(Config {
            database_url,
            encryption_key,
            cron_secret,
            chain_configs,
            etherscan_api_key,
            notify_webhook_url,
            scheduler,
            server_host,
            server_port,
        })
    }

    fn parse_rpc_urls(urls_str: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let urls: Vec<String> = urls_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if urls.is_empty() {
            return Err("RPC URLs list cannot be empty".into());
        }

        Ok(urls)
    }

    /// First configured RPC URL for a chain, if any.
    pub fn rpc_url(&self, chain: Chain) -> Option<&str> {
        self.chain_configs
            .get(&chain)
            .and_then(|cc| cc.rpc_urls.first())
            .map(|s| s.as_str())
    }

    /// Get list of configured chains.
    pub fn configured_chains(&self) -> Vec<Chain> {
        self.chain_configs.keys().copied().collect()
    }
}
