use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bip39::Mnemonic;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_keypair::Keypair;
use solana_sdk::{
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::Signature,
    signer::{ SeedDerivable, Signer },
    transaction::Transaction,
};
use solana_system_interface::instruction as system_instruction;
use tracing::debug;

use crate::crypto::Credential;
use crate::enums::Chain;

use super::{ DispatchAdapter, DispatchError, DispatchReceipt, DispatchRequest };

/// Base fee per signature in lamports; the realized cost of a simple
/// transfer.
const LAMPORTS_PER_SIGNATURE: f64 = 5000.0;
const SPL_DECIMALS_DEFAULT: i32 = 9;

pub struct SolanaAdapter {
    client: RpcClient,
    confirmation_timeout: Duration,
}

impl SolanaAdapter {
    pub fn new(rpc_url: &str, confirmation_timeout: Duration) -> Self {
        let client = RpcClient::new_with_commitment(
            rpc_url.to_string(),
            CommitmentConfig::confirmed()
        );
        Self { client, confirmation_timeout }
    }

    fn keypair_from_credential(credential: &Credential) -> Result<Keypair, DispatchError> {
        let mnemonic = Mnemonic::parse(credential.phrase()).map_err(|_|
            DispatchError::Failed("invalid mnemonic".to_string())
        )?;
        let seed = mnemonic.to_seed("");
        Keypair::from_seed(&seed[..32]).map_err(|e|
            DispatchError::Failed(format!("failed to derive keypair: {}", e))
        )
    }

    fn base_units(amount: &str, decimals: i32) -> Result<u64, DispatchError> {
        let amount_float: f64 = amount
            .parse()
            .map_err(|_| DispatchError::Failed("invalid amount".to_string()))?;
        Ok((amount_float * (10_f64).powi(decimals)) as u64)
    }

    fn flat_fee_receipt(signature: &str) -> DispatchReceipt {
        DispatchReceipt {
            tx_hash: signature.to_string(),
            fee_native: LAMPORTS_PER_SIGNATURE / 1e9,
            fee_rate: LAMPORTS_PER_SIGNATURE,
            block_number: None,
        }
    }
}

#[async_trait]
impl DispatchAdapter for SolanaAdapter {
    async fn dispatch(
        &self,
        credential: &Credential,
        request: &DispatchRequest,
    ) -> Result<DispatchReceipt, DispatchError> {
        let keypair = Self::keypair_from_credential(credential)?;

        if keypair.pubkey().to_string() != request.from_address {
            return Err(DispatchError::CredentialMismatch);
        }

        let to = Pubkey::from_str(&request.to_address).map_err(|_|
            DispatchError::Failed("invalid recipient address".to_string())
        )?;

        let instructions = if let Some(mint_address) = &request.token_address {
            let mint = Pubkey::from_str(mint_address).map_err(|_|
                DispatchError::Failed("invalid token mint".to_string())
            )?;
            let decimals = match self.client.get_token_supply(&mint).await {
                Ok(supply) => supply.decimals as i32,
                Err(_) => SPL_DECIMALS_DEFAULT,
            };
            let amount = Self::base_units(&request.amount, decimals)?;

            let source = spl_associated_token_account::get_associated_token_address(
                &keypair.pubkey(),
                &mint
            );
            let destination = spl_associated_token_account::get_associated_token_address(
                &to,
                &mint
            );

            let mut instructions = Vec::new();

            // The recipient may not hold this token yet; fund their
            // associated account in the same transaction.
            if self.client.get_account_data(&destination).await.is_err() {
                instructions.push(
                    spl_associated_token_account::instruction::create_associated_token_account(
                        &keypair.pubkey(),
                        &to,
                        &mint,
                        &spl_token::id()
                    )
                );
            }

            let transfer = spl_token::instruction::transfer(&spl_token::id(), &source, &destination, &keypair.pubkey(), &[], amount)
                .map_err(|e| DispatchError::Failed(format!("failed to build transfer: {}", e)))?;
            instructions.push(transfer);
            instructions
        } else {
            let amount_sol: f64 = request.amount
                .parse()
                .map_err(|_| DispatchError::Failed("invalid amount".to_string()))?;
            let lamports = (amount_sol * (LAMPORTS_PER_SOL as f64)) as u64;

            vec![system_instruction::transfer(&keypair.pubkey(), &to, lamports)]
        };

        let recent_blockhash = self.client
            .get_latest_blockhash().await
            .map_err(|e| DispatchError::Failed(format!("failed to get blockhash: {}", e)))?;

        let transaction = Transaction::new_signed_with_payer(
            &instructions,
            Some(&keypair.pubkey()),
            &[&keypair],
            recent_blockhash
        );
        let signature = transaction.signatures[0].to_string();
        debug!(%signature, "solana transaction signed");

        let confirmed = tokio::time::timeout(
            self.confirmation_timeout,
            self.client.send_and_confirm_transaction(&transaction)
        ).await;

        match confirmed {
            Err(_) =>
                Err(DispatchError::Timeout {
                    tx_hash: Some(signature),
                }),
            Ok(Err(e)) => Err(DispatchError::Failed(format!("transaction failed: {}", e))),
            Ok(Ok(signature)) => Ok(Self::flat_fee_receipt(&signature.to_string())),
        }
    }

    async fn check_receipt(
        &self,
        _chain: Chain,
        tx_hash: &str,
    ) -> Result<Option<DispatchReceipt>, DispatchError> {
        let signature = Signature::from_str(tx_hash).map_err(|_|
            DispatchError::Failed("invalid signature".to_string())
        )?;

        let status = self.client
            .get_signature_status(&signature).await
            .map_err(|e| DispatchError::Failed(format!("status lookup failed: {}", e)))?;

        match status {
            Some(Ok(())) => Ok(Some(Self::flat_fee_receipt(tx_hash))),
            Some(Err(e)) => Err(DispatchError::Failed(format!("transaction failed: {}", e))),
            None => Ok(None),
        }
    }
}
