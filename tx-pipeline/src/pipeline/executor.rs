//! Transaction pipeline executor
//!
//! Runs a loaded operation sequence one step at a time:
//! `idle -> awaiting-signature | awaiting-confirmation (per step) -> succeeded | failed`.
//!
//! State has a single writer (the running task, behind a mutex) and any number
//! of readers through `subscribe()`. Every load/reset bumps the generation;
//! a run whose generation no longer matches drops its results on the floor.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tx_pipeline_types::{
    OperationKind, PipelineError, PipelineSnapshot, PipelineStatus, StepSnapshot, StepStatus,
};

use super::types::{FinishedCallback, Operation, OperationRequest, StepOutput, validate_sequence};
use crate::rpc::ContractExecutor;
use crate::wallet::SignerProvider;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded(Vec<StepOutput>),
    Failed(PipelineError),
    /// The pipeline was reset or replaced while this run was in flight
    Discarded,
}

struct PipelineState {
    view: PipelineSnapshot,
    operations: Vec<Operation>,
    on_finished: Option<FinishedCallback>,
    started: bool,
}

impl PipelineState {
    fn empty(generation: u64) -> Self {
        Self {
            view: PipelineSnapshot {
                generation,
                ..PipelineSnapshot::default()
            },
            operations: Vec::new(),
            on_finished: None,
            started: false,
        }
    }

    fn fail(&mut self, index: usize, error: PipelineError) {
        // Only errors raised by a step mark that step as failed
        let step = error
            .operation_index()
            .and_then(|i| self.view.steps.get_mut(i));
        if let Some(step) = step {
            step.status = StepStatus::Failed;
            if let PipelineError::CallReverted { tx_hash, .. } = &error {
                step.tx_hash = tx_hash.clone();
            }
        }
        self.view.current_index = index;
        self.view.status = PipelineStatus::Failed;
        self.view.last_error = Some(error);
        self.view.finished_at = Some(Utc::now());
    }
}

struct Shared {
    state: Mutex<PipelineState>,
    snapshot_tx: watch::Sender<PipelineSnapshot>,
}

impl Shared {
    /// Apply `update` only if `generation` is still the live pipeline, then publish.
    /// Returns `None` for a stale generation.
    fn commit<R>(
        &self,
        generation: u64,
        update: impl FnOnce(&mut PipelineState) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        if state.view.generation != generation {
            return None;
        }
        let result = update(&mut *state);
        self.snapshot_tx.send_replace(state.view.clone());
        Some(result)
    }

    fn replace(&self, next: impl FnOnce(u64) -> PipelineState) -> u64 {
        let mut state = self.state.lock();
        let generation = state.view.generation.wrapping_add(1);
        *state = next(generation);
        self.snapshot_tx.send_replace(state.view.clone());
        generation
    }
}

/// One pipeline per user session. Cloning shares the same pipeline.
#[derive(Clone)]
pub struct TransactionPipeline {
    shared: Arc<Shared>,
    signer: Arc<dyn SignerProvider>,
    executor: Arc<dyn ContractExecutor>,
}

impl TransactionPipeline {
    pub fn new(signer: Arc<dyn SignerProvider>, executor: Arc<dyn ContractExecutor>) -> Self {
        let (snapshot_tx, _) = watch::channel(PipelineSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PipelineState::empty(0)),
                snapshot_tx,
            }),
            signer,
            executor,
        }
    }

    /// Replace whatever was loaded with a fresh sequence and open the dialog.
    /// Returns the new generation.
    pub fn load(
        &self,
        title: impl Into<String>,
        operations: Vec<Operation>,
        on_finished: Option<FinishedCallback>,
    ) -> Result<u64, PipelineError> {
        if let Err(e) = validate_sequence(&operations) {
            log::error!("[TxPipeline] Refusing to load operations: {}", e);
            return Err(e);
        }

        let title = title.into();
        let steps = operations
            .iter()
            .map(|op| StepSnapshot {
                title: op.title.clone(),
                kind: op.kind(),
                status: StepStatus::Idle,
                tx_hash: None,
            })
            .collect();

        let generation = self.shared.replace(|generation| PipelineState {
            view: PipelineSnapshot {
                generation,
                title: title.clone(),
                steps,
                current_index: 0,
                status: PipelineStatus::Idle,
                last_error: None,
                is_open: true,
                started_at: None,
                finished_at: None,
            },
            operations,
            on_finished,
            started: false,
        });

        log::info!("[TxPipeline] Loaded '{}' as pipeline #{}", title, generation);
        Ok(generation)
    }

    /// Discard the current pipeline, running or not
    pub fn reset(&self) {
        let generation = self.shared.replace(PipelineState::empty);
        log::debug!("[TxPipeline] Reset, now pipeline #{}", generation);
    }

    /// Dialog dismissed. Same as `reset`: the pipeline does not outlive its dialog.
    pub fn close(&self) {
        log::info!("[TxPipeline] Dialog closed");
        self.reset();
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.shared.state.lock().view.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Run the loaded pipeline on the tokio runtime
    pub fn start(&self) -> Result<JoinHandle<RunOutcome>, PipelineError> {
        let (generation, operations) = self.begin()?;
        let pipeline = self.clone();
        Ok(tokio::spawn(async move {
            pipeline.execute(generation, operations).await
        }))
    }

    /// Run the loaded pipeline on the current task
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        let (generation, operations) = self.begin()?;
        Ok(self.execute(generation, operations).await)
    }

    fn begin(&self) -> Result<(u64, Vec<Operation>), PipelineError> {
        let mut state = self.shared.state.lock();
        if state.operations.is_empty() {
            return Err(PipelineError::InvalidState {
                reason: "no operations loaded".to_string(),
            });
        }
        if state.started {
            return Err(PipelineError::InvalidState {
                reason: format!(
                    "pipeline #{} already started ({})",
                    state.view.generation, state.view.status
                ),
            });
        }
        state.started = true;
        state.view.started_at = Some(Utc::now());
        self.shared.snapshot_tx.send_replace(state.view.clone());
        Ok((state.view.generation, state.operations.clone()))
    }

    async fn execute(&self, generation: u64, operations: Vec<Operation>) -> RunOutcome {
        if self.signer.account().is_none() {
            log::warn!("[TxPipeline] No wallet connected, failing pipeline #{}", generation);
            let error = PipelineError::NotConnected;
            return match self
                .shared
                .commit(generation, |state| state.fail(0, error.clone()))
            {
                Some(()) => RunOutcome::Failed(error),
                None => RunOutcome::Discarded,
            };
        }

        let last = operations.len() - 1;
        let mut outputs: Vec<StepOutput> = Vec::with_capacity(operations.len());

        for (index, operation) in operations.iter().enumerate() {
            let request = operation.resolve(outputs.last());
            let waiting = match request.kind() {
                OperationKind::SignPermit => PipelineStatus::AwaitingSignature,
                OperationKind::ContractCall => PipelineStatus::AwaitingConfirmation,
            };

            let entered = self.shared.commit(generation, |state| {
                state.view.current_index = index;
                state.view.status = waiting;
                if let Some(step) = state.view.steps.get_mut(index) {
                    step.status = StepStatus::Pending;
                }
            });
            if entered.is_none() {
                return self.discarded(generation, index);
            }

            log::info!(
                "[TxPipeline] #{} step {}/{}: {}",
                generation,
                index + 1,
                operations.len(),
                operation.title
            );

            match self.dispatch(index, &request).await {
                Ok(output) => {
                    let tx_hash = output.tx_hash();
                    let recorded = self.shared.commit(generation, |state| {
                        if let Some(step) = state.view.steps.get_mut(index) {
                            step.status = StepStatus::Succeeded;
                            step.tx_hash = tx_hash;
                        }
                    });
                    if recorded.is_none() {
                        return self.discarded(generation, index);
                    }

                    if let Some(callback) = &operation.on_complete {
                        callback(&output);
                    }
                    outputs.push(output);
                }
                Err(error) => {
                    log::warn!(
                        "[TxPipeline] #{} step {} '{}' failed: {}",
                        generation,
                        index + 1,
                        operation.title,
                        error
                    );
                    let failed = self
                        .shared
                        .commit(generation, |state| state.fail(index, error.clone()));
                    return match failed {
                        Some(()) => RunOutcome::Failed(error),
                        None => self.discarded(generation, index),
                    };
                }
            }
        }

        // Terminal status is published only after every step callback has run
        let finished = self.shared.commit(generation, |state| {
            state.view.status = PipelineStatus::Succeeded;
            state.view.finished_at = Some(Utc::now());
            state.on_finished.take()
        });
        let Some(on_finished) = finished else {
            return self.discarded(generation, last);
        };

        log::info!("[TxPipeline] Pipeline #{} succeeded", generation);
        if let Some(callback) = on_finished {
            callback();
        }
        RunOutcome::Succeeded(outputs)
    }

    async fn dispatch(
        &self,
        index: usize,
        request: &OperationRequest,
    ) -> Result<StepOutput, PipelineError> {
        match request {
            OperationRequest::SignPermit(permit) => {
                let signature = self
                    .signer
                    .sign_hash(permit.digest())
                    .await
                    .map_err(|reason| PipelineError::SignatureRejected { index, reason })?;
                Ok(StepOutput::Permit(permit.into_signature(&signature)))
            }
            OperationRequest::ContractCall(call) => self
                .executor
                .submit(call)
                .await
                .map(StepOutput::Transaction)
                .map_err(|failure| failure.into_pipeline_error(index)),
        }
    }

    fn discarded(&self, generation: u64, index: usize) -> RunOutcome {
        log::debug!(
            "[TxPipeline] Dropping step {} result of discarded pipeline #{}",
            index + 1,
            generation
        );
        RunOutcome::Discarded
    }
}
