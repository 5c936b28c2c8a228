//! JSON-RPC backed executor and permit nonce source

use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::Signer;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, H256, TransactionRequest, U64, U256};
use std::sync::Arc;

use super::{CallFailure, ContractExecutor, TxReceiptSummary};
use crate::permit::PermitNonceSource;
use crate::permit::erc20::{decode_nonces, encode_nonces};
use crate::pipeline::ContractCall;
use crate::wallet::{WalletSession, format_address};

/// Blocks to wait after inclusion before a call counts as confirmed
const DEFAULT_CONFIRMATIONS: usize = 1;

pub struct EvmRpc {
    provider: Provider<Http>,
    session: Arc<WalletSession>,
    confirmations: usize,
}

impl EvmRpc {
    pub fn new(rpc_url: &str, session: Arc<WalletSession>) -> Result<Self, String> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| format!("Invalid RPC URL '{}': {}", rpc_url, e))?;
        Ok(Self {
            provider,
            session,
            confirmations: DEFAULT_CONFIRMATIONS,
        })
    }

    pub fn with_confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }
}

#[async_trait]
impl ContractExecutor for EvmRpc {
    async fn submit(&self, call: &ContractCall) -> Result<TxReceiptSummary, CallFailure> {
        let wallet = self
            .session
            .wallet()
            .ok_or_else(|| CallFailure::Rejected("Wallet is not connected".to_string()))?;
        let calldata = call.calldata().map_err(CallFailure::Transport)?;

        let from = wallet.address();
        let client = SignerMiddleware::new(self.provider.clone(), wallet);
        let tx = TransactionRequest::new()
            .from(from)
            .to(call.contract)
            .data(calldata)
            .gas(call.gas_limit);

        log::info!(
            "[EvmRpc] Sending {}.{} from {} (gas limit {})",
            call.contract_name,
            call.function.name,
            format_address(&from),
            call.gas_limit
        );

        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(|e| CallFailure::from_message(format!("Failed to send transaction: {}", e)))?;
        let tx_hash: H256 = *pending;
        log::info!("[EvmRpc] Transaction {:?} submitted, waiting for confirmation", tx_hash);

        let receipt = pending
            .confirmations(self.confirmations)
            .await
            .map_err(|e| CallFailure::Transport(format!("Failed to fetch receipt for {:?}: {}", tx_hash, e)))?
            .ok_or_else(|| CallFailure::Transport(format!("Transaction {:?} dropped from mempool", tx_hash)))?;

        if receipt.status != Some(U64::from(1)) {
            log::warn!("[EvmRpc] Transaction {:?} reverted", tx_hash);
            return Err(CallFailure::Reverted {
                tx_hash: Some(tx_hash),
                reason: "execution reverted".to_string(),
            });
        }

        Ok(TxReceiptSummary {
            tx_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()),
            gas_used: receipt.gas_used,
        })
    }
}

#[async_trait]
impl PermitNonceSource for EvmRpc {
    async fn permit_nonce(&self, token: Address, owner: Address) -> Result<U256, String> {
        let tx: TypedTransaction = TransactionRequest::new()
            .to(token)
            .data(encode_nonces(owner))
            .into();
        let output = self
            .provider
            .call(&tx, None)
            .await
            .map_err(|e| format!("Failed to read permit nonce from {:?}: {}", token, e))?;
        decode_nonces(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rpc_url() {
        let session = Arc::new(WalletSession::new(30));
        assert!(EvmRpc::new("not a url", session).is_err());
    }

    #[test]
    fn test_confirmations_at_least_one() {
        let session = Arc::new(WalletSession::new(30));
        let rpc = EvmRpc::new("http://localhost:8545", session)
            .unwrap()
            .with_confirmations(0);
        assert_eq!(rpc.confirmations, 1);
    }
}
