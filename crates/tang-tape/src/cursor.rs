//! Position-aware traversal of a tape.

use crate::id::{OpId, VarId};
use crate::op::Op;
use crate::tape::Tape;

/// The operator under a cursor.
#[derive(Clone, Copy, Debug)]
pub struct OpView<'t> {
    pub op: &'t Op,
    /// First result slot of this operator. For operators without results it
    /// is the slot the next result-producing operator will take.
    pub first_result: VarId,
    pub index: OpId,
}

impl OpView<'_> {
    /// The variable other operators use to refer to this operator's value.
    pub fn primary(&self) -> Option<VarId> {
        let n = self.op.num_results();
        if n == 0 || matches!(self.op, Op::Begin) {
            return None;
        }
        Some(VarId::from_index(self.first_result.index() + n - 1))
    }
}

/// Cursor that steps one operator at a time in either direction and keeps
/// the variable index in step with the operator index.
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'t> {
    tape: &'t Tape,
    op: usize,
    var: usize,
}

impl<'t> Cursor<'t> {
    /// Cursor on the begin sentinel.
    pub fn at_start(tape: &'t Tape) -> Self {
        debug_assert!(matches!(tape.ops()[0], Op::Begin));
        Self { tape, op: 0, var: 0 }
    }

    /// Cursor on the end sentinel.
    pub fn at_end(tape: &'t Tape) -> Self {
        debug_assert!(matches!(tape.ops()[tape.len() - 1], Op::End));
        Self {
            tape,
            op: tape.len() - 1,
            var: tape.num_var(),
        }
    }

    /// Advance to the next operator.
    ///
    /// # Panics
    /// When the cursor is on the end sentinel.
    pub fn step_forward(&mut self) {
        assert!(
            self.op + 1 < self.tape.len(),
            "cursor stepped past the end sentinel at op{}",
            self.op
        );
        self.var += self.tape.ops()[self.op].num_results();
        self.op += 1;
    }

    /// Back up to the previous operator.
    ///
    /// # Panics
    /// When the cursor is on the begin sentinel.
    pub fn step_backward(&mut self) {
        assert!(self.op > 0, "cursor stepped past the begin sentinel at op0");
        self.op -= 1;
        self.var -= self.tape.ops()[self.op].num_results();
    }

    pub fn current(&self) -> OpView<'t> {
        OpView {
            op: &self.tape.ops()[self.op],
            first_result: VarId::from_index(self.var),
            index: OpId::from_index(self.op),
        }
    }

    #[inline]
    pub fn position(&self) -> OpId {
        OpId::from_index(self.op)
    }

    #[inline]
    pub fn at_first(&self) -> bool {
        self.op == 0
    }

    #[inline]
    pub fn at_last(&self) -> bool {
        self.op + 1 == self.tape.len()
    }
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tape, other.tape) && self.op == other.op && self.var == other.var
    }
}

impl Eq for Cursor<'_> {}
