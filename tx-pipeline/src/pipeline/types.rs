//! Operation data types

use ethers::abi::{Function, Token};
use ethers::types::Address;
use std::fmt;
use std::sync::Arc;
use tx_pipeline_types::{OperationKind, PipelineError};

use crate::permit::{PermitRequest, PermitSignature};
use crate::rpc::TxReceiptSummary;

/// Called with the step result after an operation succeeds
pub type CompletionCallback = Arc<dyn Fn(&StepOutput) + Send + Sync>;

/// Called once after the last operation succeeds
pub type FinishedCallback = Arc<dyn Fn() + Send + Sync>;

/// Rewrites an operation's request right before it runs, given the previous step's result
pub type UpdateHandler =
    Arc<dyn Fn(OperationRequest, Option<&StepOutput>) -> OperationRequest + Send + Sync>;

/// A contract function call, fully resolved except for what update handlers inject
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub contract: Address,
    /// Display name of the target contract
    pub contract_name: String,
    pub function: Function,
    pub args: Vec<Token>,
    pub gas_limit: u64,
}

impl ContractCall {
    /// ABI-encoded calldata (selector + arguments)
    pub fn calldata(&self) -> Result<Vec<u8>, String> {
        self.function
            .encode_input(&self.args)
            .map_err(|e| format!("Failed to encode {}: {}", self.function.name, e))
    }
}

/// What an operation asks the wallet or the chain to do
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    SignPermit(PermitRequest),
    ContractCall(ContractCall),
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::SignPermit(_) => OperationKind::SignPermit,
            OperationRequest::ContractCall(_) => OperationKind::ContractCall,
        }
    }

    pub fn as_contract_call_mut(&mut self) -> Option<&mut ContractCall> {
        match self {
            OperationRequest::ContractCall(call) => Some(call),
            OperationRequest::SignPermit(_) => None,
        }
    }
}

/// Result of a successful operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
    Permit(PermitSignature),
    Transaction(TxReceiptSummary),
}

impl StepOutput {
    pub fn as_permit(&self) -> Option<&PermitSignature> {
        match self {
            StepOutput::Permit(permit) => Some(permit),
            StepOutput::Transaction(_) => None,
        }
    }

    pub fn tx_hash(&self) -> Option<String> {
        match self {
            StepOutput::Transaction(receipt) => Some(format!("{:?}", receipt.tx_hash)),
            StepOutput::Permit(_) => None,
        }
    }
}

/// One step of a pipeline
#[derive(Clone)]
pub struct Operation {
    pub title: String,
    pub request: OperationRequest,
    pub on_complete: Option<CompletionCallback>,
    pub update_handler: Option<UpdateHandler>,
}

impl Operation {
    pub fn sign_permit(title: impl Into<String>, request: PermitRequest) -> Self {
        Self {
            title: title.into(),
            request: OperationRequest::SignPermit(request),
            on_complete: None,
            update_handler: None,
        }
    }

    pub fn contract_call(title: impl Into<String>, call: ContractCall) -> Self {
        Self {
            title: title.into(),
            request: OperationRequest::ContractCall(call),
            on_complete: None,
            update_handler: None,
        }
    }

    pub fn with_on_complete(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    pub fn with_update_handler(mut self, handler: UpdateHandler) -> Self {
        self.update_handler = Some(handler);
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.request.kind()
    }

    /// Request as it will actually run, after the update handler
    pub fn resolve(&self, previous: Option<&StepOutput>) -> OperationRequest {
        match &self.update_handler {
            Some(handler) => handler(self.request.clone(), previous),
            None => self.request.clone(),
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("title", &self.title)
            .field("request", &self.request)
            .field("on_complete", &self.on_complete.is_some())
            .field("update_handler", &self.update_handler.is_some())
            .finish()
    }
}

/// Update handler that only fires when the previous step produced a permit;
/// otherwise the request passes through untouched.
pub fn permit_handler<F>(apply: F) -> UpdateHandler
where
    F: Fn(OperationRequest, &PermitSignature) -> OperationRequest + Send + Sync + 'static,
{
    Arc::new(
        move |request: OperationRequest, previous: Option<&StepOutput>| match previous
            .and_then(StepOutput::as_permit)
        {
            Some(permit) => apply(request, permit),
            None => request,
        },
    )
}

/// A runnable sequence is non-empty and never ends with a permit
pub fn validate_sequence(operations: &[Operation]) -> Result<(), PipelineError> {
    match operations.last() {
        None => Err(PipelineError::BuilderMisconfiguration {
            reason: "operation sequence is empty".to_string(),
        }),
        Some(last) if last.kind() == OperationKind::SignPermit => {
            Err(PipelineError::BuilderMisconfiguration {
                reason: format!(
                    "sequence ends with permit '{}' that no call consumes",
                    last.title
                ),
            })
        }
        Some(_) => Ok(()),
    }
}
