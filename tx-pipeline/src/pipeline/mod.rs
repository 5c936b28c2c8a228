//! Multi-step transaction pipeline
//!
//! A financial action (deposit, withdraw, stake) becomes an ordered list of
//! operations: optional permit signatures followed by the contract calls that
//! consume them. The builder composes the list, the executor runs it.

mod builder;
mod executor;
pub mod gas;
mod types;


pub use builder::{FinancialAction, PipelineBuilder, StakeParams};
pub use executor::{RunOutcome, TransactionPipeline};
pub use gas::{ActionKind, GasKey, GasLimitTable};
pub use types::{
    CompletionCallback, ContractCall, FinishedCallback, Operation, OperationRequest, StepOutput,
    UpdateHandler, permit_handler, validate_sequence,
};
