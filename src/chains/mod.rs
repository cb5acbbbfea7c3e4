use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::crypto::Credential;
use crate::enums::{ Chain, ChainFamily };

pub mod evm;
pub mod solana;
pub mod utxo;

pub use evm::EvmAdapter;
pub use solana::SolanaAdapter;
pub use utxo::UtxoAdapter;

/// One transfer to put on chain. Amount is kept as the user-entered
/// decimal string; each adapter converts to its chain's base unit.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub chain: Chain,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub token_address: Option<String>,
    /// Fee rate to submit with, in the chain's native unit.
    pub fee_rate: f64,
}

#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    pub tx_hash: String,
    /// Realized cost in the chain's native asset.
    pub fee_native: f64,
    /// Realized rate in the chain's native fee unit.
    pub fee_rate: f64,
    pub block_number: Option<i64>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch not implemented: {0}")]
    NotImplemented(String),

    /// The transaction was submitted but confirmation did not arrive in
    /// time. The hash lets a later tick resolve the outcome instead of
    /// double-sending.
    #[error("confirmation timed out")]
    Timeout {
        tx_hash: Option<String>,
    },

    #[error("credential does not control the sending address")]
    CredentialMismatch,

    #[error("{0}")]
    Failed(String),
}

/// On-chain submission for one chain family.
#[async_trait]
pub trait DispatchAdapter: Send + Sync {
    async fn dispatch(
        &self,
        credential: &Credential,
        request: &DispatchRequest,
    ) -> Result<DispatchReceipt, DispatchError>;

    /// Look up a previously submitted transaction. Ok(None) means the
    /// chain has no record of it and a re-dispatch is safe.
    async fn check_receipt(
        &self,
        chain: Chain,
        tx_hash: &str,
    ) -> Result<Option<DispatchReceipt>, DispatchError>;
}

/// Maps a chain to the adapter that can submit on it.
pub trait DispatchRoute: Send + Sync {
    fn adapter(&self, chain: Chain) -> Arc<dyn DispatchAdapter>;
}

pub struct ChainRouter {
    evm: Arc<dyn DispatchAdapter>,
    solana: Arc<dyn DispatchAdapter>,
    utxo: Arc<dyn DispatchAdapter>,
}

impl ChainRouter {
    pub fn new(config: &Config) -> Self {
        let rpc_urls: HashMap<Chain, String> = config
            .configured_chains()
            .into_iter()
            .filter_map(|chain| config.rpc_url(chain).map(|url| (chain, url.to_string())))
            .collect();

        let solana_rpc = rpc_urls
            .get(&Chain::Solana)
            .cloned()
            .unwrap_or_else(|| "https://api.mainnet-beta.solana.com".to_string());

        let timeout = std::time::Duration::from_secs(config.scheduler.dispatch_timeout_secs);

        Self {
            evm: Arc::new(EvmAdapter::new(rpc_urls, timeout)),
            solana: Arc::new(SolanaAdapter::new(&solana_rpc, timeout)),
            utxo: Arc::new(UtxoAdapter::new()),
        }
    }
}

impl DispatchRoute for ChainRouter {
    fn adapter(&self, chain: Chain) -> Arc<dyn DispatchAdapter> {
        match chain.family() {
            ChainFamily::Evm => self.evm.clone(),
            ChainFamily::Solana => self.solana.clone(),
            ChainFamily::Utxo => self.utxo.clone(),
        }
    }
}
