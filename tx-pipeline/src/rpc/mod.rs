//! Contract call execution
//!
//! `ContractExecutor` is the seam between the pipeline and the chain: submit a
//! call, get back a confirmed receipt or a classified failure.

mod evm;

pub use evm::EvmRpc;

use async_trait::async_trait;
use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use tx_pipeline_types::PipelineError;

use crate::pipeline::ContractCall;

/// Confirmed transaction, as much of the receipt as the pipeline keeps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceiptSummary {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

/// Why a submitted call did not confirm
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    /// Mined but reverted, or rejected by the node as a revert
    Reverted { tx_hash: Option<H256>, reason: String },
    /// User or wallet declined to send
    Rejected(String),
    /// Network, RPC or encoding failure
    Transport(String),
}

impl CallFailure {
    /// Classify a provider/middleware error message
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("user rejected") || lower.contains("user denied") {
            CallFailure::Rejected(message)
        } else if lower.contains("revert") {
            CallFailure::Reverted {
                tx_hash: None,
                reason: message,
            }
        } else {
            CallFailure::Transport(message)
        }
    }

    /// Attach the failing operation index
    pub fn into_pipeline_error(self, index: usize) -> PipelineError {
        match self {
            CallFailure::Reverted { tx_hash, reason } => PipelineError::CallReverted {
                index,
                tx_hash: tx_hash.map(|h| format!("{:?}", h)),
                reason,
            },
            CallFailure::Rejected(reason) => PipelineError::CallRejected { index, reason },
            CallFailure::Transport(reason) => PipelineError::TransportError { index, reason },
        }
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallFailure::Reverted { tx_hash: Some(hash), reason } => {
                write!(f, "reverted ({:?}): {}", hash, reason)
            }
            CallFailure::Reverted { tx_hash: None, reason } => write!(f, "reverted: {}", reason),
            CallFailure::Rejected(reason) => write!(f, "rejected: {}", reason),
            CallFailure::Transport(reason) => write!(f, "transport: {}", reason),
        }
    }
}

/// Trait for contract call executors
#[async_trait]
pub trait ContractExecutor: Send + Sync {
    /// Submit the call and wait until it is confirmed
    async fn submit(&self, call: &ContractCall) -> Result<TxReceiptSummary, CallFailure>;
}
