use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::{
    prelude::*,
    providers::{ Http, Provider },
    signers::{ coins_bip39::English, LocalWallet, MnemonicBuilder },
    types::{ TransactionRequest as EthTxRequest, H256, U256 },
    utils::{ format_ether, parse_ether, parse_units },
};
use tracing::debug;

use crate::crypto::Credential;
use crate::enums::Chain;

use super::{ DispatchAdapter, DispatchError, DispatchReceipt, DispatchRequest };

const ETH_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";
const ERC20_DECIMALS_DEFAULT: u8 = 18;

/// Submits transfers on every EVM chain. One adapter serves all of them;
/// the request's chain picks the RPC endpoint and chain id.
pub struct EvmAdapter {
    rpc_urls: HashMap<Chain, String>,
    confirmation_timeout: Duration,
}

impl EvmAdapter {
    pub fn new(rpc_urls: HashMap<Chain, String>, confirmation_timeout: Duration) -> Self {
        Self { rpc_urls, confirmation_timeout }
    }

    fn provider(&self, chain: Chain) -> Result<Provider<Http>, DispatchError> {
        let url = self.rpc_urls
            .get(&chain)
            .ok_or_else(|| DispatchError::Failed(format!("no rpc configured for {}", chain)))?;
        Provider::<Http>::try_from(url.as_str())
            .map_err(|e| DispatchError::Failed(format!("failed to create provider: {}", e)))
    }

    fn wallet_from_credential(credential: &Credential) -> Result<LocalWallet, DispatchError> {
        MnemonicBuilder::<English>::default()
            .phrase(credential.phrase())
            .derivation_path(ETH_DERIVATION_PATH)
            .map_err(|e| DispatchError::Failed(format!("invalid derivation path: {}", e)))?
            .build()
            .map_err(|_| DispatchError::Failed("invalid mnemonic".to_string()))
    }

    /// Polls for the receipt until the confirmation timeout. A timeout
    /// carries the hash so the next tick can resolve the submission
    /// instead of sending again.
    async fn await_confirmation(
        &self,
        provider: &Provider<Http>,
        tx_hash: H256,
    ) -> Result<DispatchReceipt, DispatchError> {
        let deadline = tokio::time::Instant::now() + self.confirmation_timeout;

        loop {
            match provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if receipt.status == Some(U64::zero()) {
                        return Err(DispatchError::Failed("transaction reverted".to_string()));
                    }
                    return Ok(Self::receipt_from(&receipt));
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(error = %e, "receipt poll failed, retrying");
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(DispatchError::Timeout {
                    tx_hash: Some(format!("{:?}", tx_hash)),
                });
            }
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
    }

    fn erc20_amount(amount: &str, decimals: u32) -> Result<U256, DispatchError> {
        Ok(
            parse_units(amount, decimals)
                .map_err(|e| DispatchError::Failed(format!("invalid amount: {}", e)))?
                .into()
        )
    }

    fn receipt_from(receipt: &TransactionReceipt) -> DispatchReceipt {
        let effective_price = receipt.effective_gas_price.unwrap_or_default();
        let fee_wei = receipt.gas_used.unwrap_or_default() * effective_price;
        let fee_native: f64 = format_ether(fee_wei).parse().unwrap_or(0.0);
        let fee_rate = (effective_price.as_u128() as f64) / 1e9;

        DispatchReceipt {
            tx_hash: format!("{:?}", receipt.transaction_hash),
            fee_native,
            fee_rate,
            block_number: receipt.block_number.map(|b| b.as_u64() as i64),
        }
    }
}

#[async_trait]
impl DispatchAdapter for EvmAdapter {
    async fn dispatch(
        &self,
        credential: &Credential,
        request: &DispatchRequest,
    ) -> Result<DispatchReceipt, DispatchError> {
        let chain_id = request.chain
            .chain_id()
            .ok_or_else(|| DispatchError::Failed(format!("{} has no evm chain id", request.chain)))?;

        let wallet = Self::wallet_from_credential(credential)?.with_chain_id(chain_id);

        // The sealed credential must derive the row's sending address.
        let derived = format!("{:?}", wallet.address());
        if !derived.eq_ignore_ascii_case(&request.from_address) {
            return Err(DispatchError::CredentialMismatch);
        }

        let provider = self.provider(request.chain)?;
        let client = Arc::new(SignerMiddleware::new(provider, wallet));

        let to: Address = request.to_address
            .parse()
            .map_err(|_| DispatchError::Failed("invalid recipient address".to_string()))?;

        // Submitted fee rate comes from the quote, in gwei.
        let gas_price = U256::from((request.fee_rate * 1e9) as u128);

        let tx_hash: H256 = if let Some(token_address) = &request.token_address {
            let token: Address = token_address
                .parse()
                .map_err(|_| DispatchError::Failed("invalid token address".to_string()))?;
            let abi = ethers::abi::parse_abi(
                    &[
                        "function transfer(address to, uint256 amount) external returns (bool)",
                        "function decimals() external view returns (uint8)",
                    ]
                )
                .map_err(|e| DispatchError::Failed(format!("failed to parse abi: {}", e)))?;
            let contract = Contract::new(token, abi, client.clone());

            let decimals = match contract.method::<_, u8>("decimals", ()) {
                Ok(method) => method.call().await.ok().unwrap_or(ERC20_DECIMALS_DEFAULT),
                Err(_) => ERC20_DECIMALS_DEFAULT,
            };
            let amount = Self::erc20_amount(&request.amount, decimals as u32)?;

            let mut call = contract
                .method::<_, bool>("transfer", (to, amount))
                .map_err(|e| DispatchError::Failed(format!("failed to prepare transfer: {}", e)))?;
            call.tx.set_gas_price(gas_price);

            let sent = call
                .send().await
                .map_err(|e| DispatchError::Failed(format!("transaction failed: {}", e)))?;
            sent.tx_hash()
        } else {
            let amount = parse_ether(&request.amount).map_err(|e|
                DispatchError::Failed(format!("invalid amount: {}", e))
            )?;
            let tx = EthTxRequest::pay(to, amount).gas_price(gas_price);

            let sent = client
                .send_transaction(tx, None).await
                .map_err(|e| DispatchError::Failed(format!("transaction failed: {}", e)))?;
            sent.tx_hash()
        };

        debug!(chain = %request.chain, tx_hash = %format!("{:?}", tx_hash), "transaction submitted");

        self.await_confirmation(client.inner(), tx_hash).await
    }

    async fn check_receipt(
        &self,
        chain: Chain,
        tx_hash: &str,
    ) -> Result<Option<DispatchReceipt>, DispatchError> {
        let hash: H256 = tx_hash
            .parse()
            .map_err(|_| DispatchError::Failed("invalid transaction hash".to_string()))?;

        let provider = self.provider(chain)?;
        let receipt = provider
            .get_transaction_receipt(hash).await
            .map_err(|e| DispatchError::Failed(format!("receipt lookup failed: {}", e)))?;

        match receipt {
            Some(r) if r.status == Some(U64::zero()) =>
                Err(DispatchError::Failed("transaction reverted".to_string())),
            Some(r) => Ok(Some(Self::receipt_from(&r))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Standard BIP39 test vector
    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const TEST_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";

    #[test]
    fn derives_expected_address_from_mnemonic() {
        let credential = Credential::new(TEST_MNEMONIC.to_string());
        let wallet = EvmAdapter::wallet_from_credential(&credential).unwrap();
        assert!(format!("{:?}", wallet.address()).eq_ignore_ascii_case(TEST_ADDRESS));
    }

    #[test]
    fn rejects_garbage_mnemonic() {
        let credential = Credential::new("not a mnemonic at all".to_string());
        assert!(EvmAdapter::wallet_from_credential(&credential).is_err());
    }

    #[test]
    fn erc20_amount_scales_by_token_decimals() {
        // 25 USDC at 6 decimals is 25_000_000 base units, not 18-decimal wei
        let six = EvmAdapter::erc20_amount("25", 6).unwrap();
        assert_eq!(six, U256::from(25_000_000u64));

        let eighteen = EvmAdapter::erc20_amount("25", 18).unwrap();
        assert_eq!(eighteen, six * U256::exp10(12));

        assert!(EvmAdapter::erc20_amount("not a number", 6).is_err());
    }
}
