//! Signer Provider Abstraction
//!
//! The pipeline never touches keys directly. It asks a `SignerProvider` for
//! the connected account and for signatures over 32-byte digests (EIP-712
//! permit hashes).
//!
//! `WalletSession` is the local-key implementation: a wallet that can be
//! connected and disconnected at runtime, exposing the same account/pending
//! view a browser wallet hook would.

mod session;

pub use session::WalletSession;

use async_trait::async_trait;
use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, Signature};

/// Trait for signer providers - abstracts where signatures come from
#[async_trait]
pub trait SignerProvider: Send + Sync {
    /// Currently connected account, `None` when disconnected
    fn account(&self) -> Option<Address>;

    /// Sign a prehashed digest. Rejection (user declined, signer error) is an `Err`.
    async fn sign_hash(&self, hash: H256) -> Result<Signature, String>;

    /// Provider name for logging
    fn provider_name(&self) -> &'static str {
        "signer"
    }
}

/// Parse a private key (hex string with or without 0x prefix) into a wallet
pub fn wallet_from_private_key(private_key: &str, chain_id: u64) -> Result<LocalWallet, String> {
    let key_hex = private_key.trim();
    let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

    let key_bytes = hex::decode(key_hex)
        .map_err(|e| format!("Invalid private key hex: {}", e))?;

    let signing_key = SigningKey::from_bytes(key_bytes.as_slice().into())
        .map_err(|e| format!("Invalid private key: {}", e))?;

    Ok(LocalWallet::from(signing_key).with_chain_id(chain_id))
}

/// Lowercase 0x-prefixed address for log lines
pub fn format_address(address: &Address) -> String {
    format!("{:?}", address).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hardhat account #0 (DO NOT USE IN PRODUCTION)
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_from_private_key() {
        let wallet = wallet_from_private_key(TEST_KEY, 30).unwrap();
        assert_eq!(
            format_address(&wallet.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(wallet.chain_id(), 30);
    }

    #[test]
    fn test_wallet_from_private_key_no_prefix() {
        let wallet = wallet_from_private_key(&TEST_KEY[2..], 30).unwrap();
        assert_eq!(
            format_address(&wallet.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_wallet_from_invalid_key() {
        assert!(wallet_from_private_key("0xnothex", 30).is_err());
        assert!(wallet_from_private_key("0x1234", 30).is_err());
    }
}
