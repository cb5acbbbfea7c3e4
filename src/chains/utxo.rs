use async_trait::async_trait;
use bip32::XPrv;
use bip39::Mnemonic;
use bitcoin::key::PrivateKey;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{ Address, CompressedPublicKey, Network };

use crate::crypto::Credential;
use crate::enums::Chain;

use super::{ DispatchAdapter, DispatchError, DispatchReceipt, DispatchRequest };

/// BIP84 first receive address, native SegWit.
const BIP84_PATH: &str = "m/84'/0'/0'/0/0";

/// Bitcoin adapter. Key derivation and credential checks are live, but
/// UTXO selection and broadcast are not wired up, so dispatch reports not
/// implemented and the row fails cleanly.
pub struct UtxoAdapter;

impl UtxoAdapter {
    pub fn new() -> Self {
        Self
    }

    fn derive_p2wpkh_address(credential: &Credential) -> Result<String, DispatchError> {
        let mnemonic = Mnemonic::parse(credential.phrase()).map_err(|_|
            DispatchError::Failed("invalid mnemonic".to_string())
        )?;
        let seed = mnemonic.to_seed("");

        let derivation_path: bip32::DerivationPath = BIP84_PATH.parse().map_err(|e|
            DispatchError::Failed(format!("invalid derivation path: {}", e))
        )?;
        let child_xprv = XPrv::derive_from_path(&seed, &derivation_path).map_err(|e|
            DispatchError::Failed(format!("key derivation failed: {}", e))
        )?;

        let secret_key = bitcoin::secp256k1::SecretKey::from_slice(&child_xprv.to_bytes())
            .map_err(|e| DispatchError::Failed(format!("invalid secret key: {}", e)))?;
        let private_key = PrivateKey::new(secret_key, Network::Bitcoin);

        let secp = Secp256k1::new();
        let public_key = CompressedPublicKey::from_private_key(&secp, &private_key).map_err(|e|
            DispatchError::Failed(format!("failed to derive public key: {}", e))
        )?;

        Ok(Address::p2wpkh(&public_key, Network::Bitcoin).to_string())
    }
}

impl Default for UtxoAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DispatchAdapter for UtxoAdapter {
    async fn dispatch(
        &self,
        credential: &Credential,
        request: &DispatchRequest,
    ) -> Result<DispatchReceipt, DispatchError> {
        // Validate the credential before refusing, so a bad seal surfaces
        // as the right error.
        let derived = Self::derive_p2wpkh_address(credential)?;
        if derived != request.from_address {
            return Err(DispatchError::CredentialMismatch);
        }

        Err(DispatchError::NotImplemented("bitcoin broadcast is not wired up".to_string()))
    }

    async fn check_receipt(
        &self,
        _chain: Chain,
        _tx_hash: &str,
    ) -> Result<Option<DispatchReceipt>, DispatchError> {
        Err(DispatchError::NotImplemented("bitcoin receipt lookup is not wired up".to_string()))
    }
}
