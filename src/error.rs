//! Error taxonomy shared by every pipeline stage.

use std::fmt;

use thiserror::Error;

use crate::pipeline::PipelineState;

/// Errors surfaced by the quantization, proving, encoding and verification stages,
/// plus the coordinator's own call rejections.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The embedding could not be obtained from the inference boundary.
    #[error("inference error: {0}")]
    Inference(String),

    /// Malformed numeric input (embedding too short, too many rows, non-finite values).
    #[error("shape error: {0}")]
    Shape(String),

    /// Witness or circuit failure. Fatal for the call that produced it.
    #[error("proving error: {0}")]
    Proving(String),

    /// Proof or public signals do not match the verifier's expected shape.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The verifier cannot be reached.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),

    /// The verifier call failed for a reason other than rejecting the proof.
    #[error("verification error: {0}")]
    Verification(String),

    /// A classification attempt is already in flight on this coordinator.
    #[error("pipeline busy: currently {0}")]
    Busy(PipelineState),

    /// The operation is not allowed in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    /// The attempt was cancelled before it completed.
    #[error("cancelled")]
    Cancelled,
}

/// The stage-level kind of a [`PipelineError`], carried by `PipelineState::Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Inference,
    Shape,
    Proving,
    Encoding,
    Unavailable,
    Verification,
    Busy,
    InvalidState,
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Inference(_) => ErrorKind::Inference,
            PipelineError::Shape(_) => ErrorKind::Shape,
            PipelineError::Proving(_) => ErrorKind::Proving,
            PipelineError::Encoding(_) => ErrorKind::Encoding,
            PipelineError::Unavailable(_) => ErrorKind::Unavailable,
            PipelineError::Verification(_) => ErrorKind::Verification,
            PipelineError::Busy(_) => ErrorKind::Busy,
            PipelineError::InvalidState { .. } => ErrorKind::InvalidState,
            PipelineError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Inference => "inference",
            ErrorKind::Shape => "shape",
            ErrorKind::Proving => "proving",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Verification => "verification",
            ErrorKind::Busy => "busy",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Encoding(e.to_string())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
