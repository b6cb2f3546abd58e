//! The pipeline coordinator.
//!
//! Sequences quantization, proving, argument building and verification for one
//! classification attempt at a time:
//!
//! ```text
//! Idle -> Quantizing -> Proving -> Proved -> Verifying -> Verified | Rejected
//!   any stage error -> Failed(kind)
//! ```
//!
//! A second `classify_and_prove` while an attempt is in flight is rejected with
//! [`PipelineError::Busy`]; attempts are never interleaved. Nothing is retried.

use std::{
    fmt,
    sync::{Mutex, MutexGuard},
};

use tracing::{info, warn};

use crate::{
    calldata::ArgumentBuilder,
    error::{ErrorKind, PipelineError, Result},
    proof::{Proof, PublicSignals},
    prover::{ProofRequestor, ProvingBackend},
    quantize::{quantize, BATCH_SIZE},
    verifier::Verifier,
    witness::WitnessLayout,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Quantizing,
    Proving,
    Proved,
    Verifying,
    Verified,
    Rejected,
    Failed(ErrorKind),
}

impl PipelineState {
    /// An attempt is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::Quantizing | PipelineState::Proving | PipelineState::Verifying
        )
    }

    /// `Verified`, `Rejected` and `Failed` end an attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Verified | PipelineState::Rejected | PipelineState::Failed(_)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Quantizing => f.write_str("quantizing"),
            PipelineState::Proving => f.write_str("proving"),
            PipelineState::Proved => f.write_str("proved"),
            PipelineState::Verifying => f.write_str("verifying"),
            PipelineState::Verified => f.write_str("verified"),
            PipelineState::Rejected => f.write_str("rejected"),
            PipelineState::Failed(kind) => write!(f, "failed ({kind})"),
        }
    }
}

/// The outcome of a successful `classify_and_prove`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub proof: Proof,
    pub public_signals: PublicSignals,
    /// Index of the highest public signal; ties resolve to the lowest index.
    pub prediction: usize,
}

impl Classification {
    pub fn new(proof: Proof, public_signals: PublicSignals) -> Self {
        let prediction = public_signals.prediction();
        Self {
            proof,
            public_signals,
            prediction,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: PipelineState,
    classification: Option<Classification>,
    /// Bumped by every new attempt, `cancel` and `reset`. An in-flight call that finds a
    /// different value at a stage boundary has been superseded.
    epoch: u64,
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Held by an in-flight `classify_and_prove` or `verify`. If the future is dropped
/// mid-stage, the attempt is abandoned so the coordinator does not stay busy.
struct StageGuard<'a> {
    inner: &'a Mutex<Inner>,
    epoch: u64,
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        let mut inner = lock_inner(self.inner);
        if inner.epoch == self.epoch && inner.state.is_busy() {
            warn!("Attempt abandoned while {}", inner.state);
            inner.epoch += 1;
            inner.state = PipelineState::Idle;
            inner.classification = None;
        }
    }
}

pub struct Pipeline<B, V> {
    requestor: ProofRequestor<B>,
    builder: ArgumentBuilder,
    verifier: V,
    n_selected: usize,
    inner: Mutex<Inner>,
}

impl<B: ProvingBackend, V: Verifier> Pipeline<B, V> {
    /// A coordinator proving with `backend` and verifying with `verifier`. The argument
    /// builder expects as many public inputs as the backend declares.
    pub fn new(backend: B, layout: WitnessLayout, verifier: V) -> Self {
        let builder = ArgumentBuilder::new(backend.num_public());
        Self {
            requestor: ProofRequestor::new(backend, layout),
            builder,
            verifier,
            n_selected: BATCH_SIZE,
            inner: Mutex::new(Inner {
                state: PipelineState::Idle,
                classification: None,
                epoch: 0,
            }),
        }
    }

    /// Number of embedding rows passed to the circuit.
    pub fn with_n_selected(mut self, n_selected: usize) -> Self {
        self.n_selected = n_selected;
        self
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    /// The proof, public signals and prediction of the current attempt, once proved.
    pub fn classification(&self) -> Option<Classification> {
        self.lock().classification.clone()
    }

    /// Quantizes `raw_embedding` and proves the classification.
    ///
    /// Starts a fresh attempt from any state that is not busy, discarding earlier results.
    pub async fn classify_and_prove(&self, raw_embedding: &[f32]) -> Result<Classification> {
        let epoch = {
            let mut inner = self.lock();
            if inner.state.is_busy() {
                return Err(PipelineError::Busy(inner.state));
            }
            inner.epoch += 1;
            inner.state = PipelineState::Quantizing;
            inner.classification = None;
            inner.epoch
        };
        let _guard = self.guard(epoch);
        info!("Quantizing embedding");

        let quantized =
            quantize(raw_embedding, self.n_selected).map_err(|e| self.fail(epoch, e))?;
        self.advance(epoch, PipelineState::Proving)?;

        let (proof, public_signals) = self
            .requestor
            .request_proof(&quantized)
            .await
            .map_err(|e| self.fail(epoch, e))?;

        let classification = Classification::new(proof, public_signals);
        {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                warn!("Proof discarded: attempt was cancelled");
                return Err(PipelineError::Cancelled);
            }
            inner.state = PipelineState::Proved;
            inner.classification = Some(classification.clone());
        }
        info!("Proved, prediction: {}", classification.prediction);

        Ok(classification)
    }

    /// Verifies the proof held in the `Proved` state.
    ///
    /// Returns the verifier's answer; `false` means the proof was rejected.
    pub async fn verify(&self) -> Result<bool> {
        let (epoch, classification) = {
            let mut inner = self.lock();
            let classification = match (&inner.state, &inner.classification) {
                (PipelineState::Proved, Some(classification)) => classification.clone(),
                _ => {
                    return Err(PipelineError::InvalidState {
                        operation: "verify",
                        state: inner.state,
                    })
                }
            };
            inner.state = PipelineState::Verifying;
            (inner.epoch, classification)
        };
        let _guard = self.guard(epoch);
        info!("Verifying proof");

        // Recomputed for every attempt, never cached.
        let args = self
            .builder
            .build(&classification.proof, &classification.public_signals)
            .map_err(|e| self.fail(epoch, e))?;
        let verified = self
            .verifier
            .verify(&args)
            .await
            .map_err(|e| self.fail(epoch, e))?;

        let outcome = if verified {
            PipelineState::Verified
        } else {
            PipelineState::Rejected
        };
        self.advance(epoch, outcome)?;
        info!("Verification finished: {outcome}");

        Ok(verified)
    }

    /// Abandons the current attempt. In-flight calls return [`PipelineError::Cancelled`]
    /// at their next stage boundary. Returns whether there was anything to cancel.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        let cancellable = inner.state.is_busy() || inner.state == PipelineState::Proved;
        if cancellable {
            warn!("Cancelling attempt while {}", inner.state);
            inner.epoch += 1;
            inner.state = PipelineState::Idle;
            inner.classification = None;
        }
        cancellable
    }

    /// Returns to `Idle`, discarding any results. Not allowed while an attempt is in flight.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state.is_busy() {
            return Err(PipelineError::Busy(inner.state));
        }
        inner.epoch += 1;
        inner.state = PipelineState::Idle;
        inner.classification = None;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    fn guard(&self, epoch: u64) -> StageGuard<'_> {
        StageGuard {
            inner: &self.inner,
            epoch,
        }
    }

    fn advance(&self, epoch: u64, state: PipelineState) -> Result<()> {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return Err(PipelineError::Cancelled);
        }
        inner.state = state;
        Ok(())
    }

    /// Records a stage failure, unless the attempt has been superseded.
    fn fail(&self, epoch: u64, err: PipelineError) -> PipelineError {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return PipelineError::Cancelled;
        }
        warn!("Failed while {}: {err}", inner.state);
        inner.state = PipelineState::Failed(err.kind());
        err
    }
}
