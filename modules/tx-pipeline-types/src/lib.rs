//! Shared types for the transaction pipeline and the layers that render it.
//!
//! Everything here is plain data: the executor publishes `PipelineSnapshot`
//! values and readers only ever see copies of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =====================================================
// Status enums
// =====================================================

/// Overall pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Nothing loaded, or loaded but not started
    #[default]
    Idle,
    /// Waiting for the wallet to sign a permit
    AwaitingSignature,
    /// Transaction submitted, waiting for inclusion
    AwaitingConfirmation,
    /// Every operation succeeded
    Succeeded,
    /// An operation failed; terminal
    Failed,
}

impl PipelineStatus {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Succeeded | PipelineStatus::Failed)
    }

    /// Whether an operation is currently being executed
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            PipelineStatus::AwaitingSignature | PipelineStatus::AwaitingConfirmation
        )
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStatus::Idle => write!(f, "idle"),
            PipelineStatus::AwaitingSignature => write!(f, "awaiting_signature"),
            PipelineStatus::AwaitingConfirmation => write!(f, "awaiting_confirmation"),
            PipelineStatus::Succeeded => write!(f, "succeeded"),
            PipelineStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Kind of a single pipeline operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    SignPermit,
    ContractCall,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::SignPermit => write!(f, "sign_permit"),
            OperationKind::ContractCall => write!(f, "contract_call"),
        }
    }
}

/// Per-step status shown next to each step title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

// =====================================================
// Errors
// =====================================================

/// Why a pipeline ended in the `failed` state.
///
/// Indexes refer to the operation that was active when the failure happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineError {
    /// No wallet account available when the pipeline was started
    NotConnected,
    /// User declined the signature prompt or the signer failed
    SignatureRejected { index: usize, reason: String },
    /// Transaction was mined but reverted
    CallReverted {
        index: usize,
        tx_hash: Option<String>,
        reason: String,
    },
    /// User declined to send the transaction
    CallRejected { index: usize, reason: String },
    /// Network or RPC failure while submitting or waiting for the receipt
    TransportError { index: usize, reason: String },
    /// The operation sequence itself is malformed (programming error)
    BuilderMisconfiguration { reason: String },
    /// The requested amount cannot be turned into an operation
    InvalidAmount { amount: String, reason: String },
    /// Operation not allowed in the current pipeline state
    InvalidState { reason: String },
}

impl PipelineError {
    /// Index of the operation that failed, if the error is tied to one
    pub fn operation_index(&self) -> Option<usize> {
        match self {
            PipelineError::SignatureRejected { index, .. }
            | PipelineError::CallReverted { index, .. }
            | PipelineError::CallRejected { index, .. }
            | PipelineError::TransportError { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::NotConnected => write!(f, "not-connected"),
            PipelineError::SignatureRejected { index, reason } => {
                write!(f, "signature rejected at step {}: {}", index, reason)
            }
            PipelineError::CallReverted {
                index,
                tx_hash,
                reason,
            } => match tx_hash {
                Some(hash) => write!(f, "call reverted at step {} ({}): {}", index, hash, reason),
                None => write!(f, "call reverted at step {}: {}", index, reason),
            },
            PipelineError::CallRejected { index, reason } => {
                write!(f, "transaction rejected at step {}: {}", index, reason)
            }
            PipelineError::TransportError { index, reason } => {
                write!(f, "transport error at step {}: {}", index, reason)
            }
            PipelineError::BuilderMisconfiguration { reason } => {
                write!(f, "builder misconfiguration: {}", reason)
            }
            PipelineError::InvalidAmount { amount, reason } => {
                write!(f, "invalid amount {}: {}", amount, reason)
            }
            PipelineError::InvalidState { reason } => {
                write!(f, "invalid pipeline state: {}", reason)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

// =====================================================
// Snapshots
// =====================================================

/// Read-only view of one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub title: String,
    pub kind: OperationKind,
    pub status: StepStatus,
    /// Set once a contract call has been confirmed (or reverted on-chain)
    pub tx_hash: Option<String>,
}

/// Read-only view of the whole pipeline, published on every transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineSnapshot {
    /// Instance token; bumped every time the pipeline is replaced or reset
    pub generation: u64,
    /// Dialog title
    pub title: String,
    pub steps: Vec<StepSnapshot>,
    pub current_index: usize,
    pub status: PipelineStatus,
    /// Present only when `status == Failed`
    pub last_error: Option<PipelineError>,
    pub is_open: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineSnapshot {
    /// "step 2 of 3" style progress, 1-based
    pub fn progress(&self) -> (usize, usize) {
        if self.steps.is_empty() {
            return (0, 0);
        }
        (self.current_index + 1, self.steps.len())
    }

    pub fn current_step(&self) -> Option<&StepSnapshot> {
        self.steps.get(self.current_index)
    }
}
