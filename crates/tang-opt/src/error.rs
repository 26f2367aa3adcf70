//! Error types for tang-opt.

use tang_tape::{AtomicId, OpId, TapeError};
use thiserror::Error;

use crate::atomic::SparsityKind;

/// Reasons an analysis run is abandoned. No partial result is ever returned.
#[derive(Debug, Error)]
pub enum OptimizeError {
    /// The tape violates its construction contract.
    #[error(transparent)]
    Tape(#[from] TapeError),
    /// A call block names an atomic function missing from the registry.
    #[error("{op}: atomic function {atomic} is not registered")]
    UnknownAtomic { op: OpId, atomic: AtomicId },
    /// Every sparsity form the atomic function offers failed.
    #[error("{op}: atomic function `{name}` (call {call_id}) failed reverse sparsity for {tried:?}")]
    AtomicSparsity {
        op: OpId,
        name: String,
        call_id: usize,
        tried: Vec<SparsityKind>,
    },
    /// An atomic function returned a pattern that does not fit the call.
    #[error("{op}: atomic function `{name}` returned a {kind:?} pattern of the wrong shape")]
    InvalidPattern {
        op: OpId,
        name: String,
        kind: SparsityKind,
    },
}

/// A malformed option string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("unknown optimize option `{0}`")]
    Unknown(String),
    #[error("invalid value for `{key}`: `{value}`")]
    InvalidValue { key: String, value: String },
}
