//! Local-key wallet session
//!
//! Holds at most one connected wallet. `connect`/`disconnect` can be called at
//! any time; a signature request that is already in flight keeps the wallet it
//! started with.

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, Signature};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{SignerProvider, format_address, wallet_from_private_key};

pub struct WalletSession {
    wallet: RwLock<Option<LocalWallet>>,
    chain_id: u64,
    /// Outstanding signature requests
    pending: AtomicUsize,
}

/// Decrements the pending counter when dropped
struct PendingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> PendingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WalletSession {
    /// Create a disconnected session for the given chain
    pub fn new(chain_id: u64) -> Self {
        Self {
            wallet: RwLock::new(None),
            chain_id,
            pending: AtomicUsize::new(0),
        }
    }

    /// Create a session already connected with a private key
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self, String> {
        let session = Self::new(chain_id);
        session.connect(private_key)?;
        Ok(session)
    }

    /// Connect (or replace) the wallet; returns the new account
    pub fn connect(&self, private_key: &str) -> Result<Address, String> {
        let wallet = wallet_from_private_key(private_key, self.chain_id)?;
        let address = wallet.address();
        *self.wallet.write() = Some(wallet);
        log::info!("[Wallet] Connected {} on chain {}", format_address(&address), self.chain_id);
        Ok(address)
    }

    pub fn disconnect(&self) {
        if let Some(wallet) = self.wallet.write().take() {
            log::info!("[Wallet] Disconnected {}", format_address(&wallet.address()));
        }
    }

    /// Clone of the connected wallet, for building signing middleware
    pub fn wallet(&self) -> Option<LocalWallet> {
        self.wallet.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.wallet.read().is_some()
    }

    /// True while a signature request is outstanding
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

#[async_trait]
impl SignerProvider for WalletSession {
    fn account(&self) -> Option<Address> {
        self.wallet.read().as_ref().map(|w| w.address())
    }

    async fn sign_hash(&self, hash: H256) -> Result<Signature, String> {
        let wallet = self
            .wallet()
            .ok_or_else(|| "Wallet is not connected".to_string())?;
        let _pending = PendingGuard::new(&self.pending);
        log::debug!("[Wallet] Signing digest {:?}", hash);
        wallet
            .sign_hash(hash)
            .map_err(|e| format!("Failed to sign: {}", e))
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}
