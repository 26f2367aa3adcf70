//! Tape contract violations.

use thiserror::Error;

use crate::id::{ArrayId, OpId, ParId, VarId};

/// A malformed tape. Each variant names the first offending operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TapeError {
    #[error("tape must start with a begin sentinel")]
    MissingBegin,
    #[error("tape must end with an end sentinel")]
    MissingEnd,
    #[error("{op}: sentinel in the middle of the tape")]
    MisplacedSentinel { op: OpId },
    #[error("{op}: independent variables must directly follow the begin sentinel")]
    MisplacedIndependent { op: OpId },
    #[error("{op}: {var} is not produced by an earlier operator")]
    DanglingVariable { op: OpId, var: VarId },
    #[error("{op}: {var} is an auxiliary result slot")]
    AuxiliaryVariable { op: OpId, var: VarId },
    #[error("{op}: parameter {par} out of range")]
    ParameterOutOfRange { op: OpId, par: ParId },
    #[error("{op}: array {array} out of range")]
    ArrayOutOfRange { op: OpId, array: ArrayId },
    #[error("{op}: operator needs at least one variable operand")]
    NoVariableOperand { op: OpId },
    #[error("{op}: malformed atomic call block: {reason}")]
    MalformedCall { op: OpId, reason: &'static str },
    #[error("dependent {var} is not a primary variable of this tape")]
    InvalidDependent { var: VarId },
}
