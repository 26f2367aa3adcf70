//! Incremental tape construction.

use crate::error::TapeError;
use crate::id::{ArrayId, AtomicId, Operand, ParId, VarId};
use crate::op::{AtomicCall, BinaryOp, CompareOp, CondExp, CumulativeSum, Op, UnaryOp};
use crate::tape::{Tape, VecAd};

/// Appends operators to a growing tape.
///
/// Each method records one operator and returns the variable holding its
/// value. Independent variables must be created before anything else.
pub struct TapeBuilder {
    ops: Vec<Op>,
    params: Vec<f64>,
    arrays: Vec<VecAd>,
    num_var: usize,
}

impl TapeBuilder {
    /// Create a builder holding only the begin sentinel.
    pub fn new() -> Self {
        Self {
            ops: vec![Op::Begin],
            params: Vec::new(),
            arrays: Vec::new(),
            num_var: 1,
        }
    }

    /// Record `op`, returning its primary result (the phantom variable for
    /// operators without results).
    pub fn push(&mut self, op: Op) -> VarId {
        let n = op.num_results();
        self.ops.push(op);
        self.num_var += n;
        if n == 0 {
            VarId::PHANTOM
        } else {
            VarId::from_index(self.num_var - 1)
        }
    }

    /// Number of operators recorded so far, begin sentinel included.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// New independent input variable.
    pub fn independent(&mut self) -> VarId {
        self.push(Op::Independent)
    }

    /// Add a parameter to the parameter table.
    pub fn param(&mut self, value: f64) -> Operand {
        self.params.push(value);
        Operand::Par(ParId::from_index(self.params.len() - 1))
    }

    /// A parameter promoted to a variable.
    pub fn par_var(&mut self, value: f64) -> VarId {
        let Operand::Par(p) = self.param(value) else {
            unreachable!()
        };
        self.push(Op::Par(p))
    }

    pub fn unary(&mut self, op: UnaryOp, x: VarId) -> VarId {
        self.push(Op::Unary(op, x))
    }

    pub fn binary(&mut self, op: BinaryOp, a: Operand, b: Operand) -> VarId {
        self.push(Op::Binary(op, a, b))
    }

    pub fn add(&mut self, a: impl Into<Operand>, b: impl Into<Operand>) -> VarId {
        self.binary(BinaryOp::Add, a.into(), b.into())
    }

    pub fn sub(&mut self, a: impl Into<Operand>, b: impl Into<Operand>) -> VarId {
        self.binary(BinaryOp::Sub, a.into(), b.into())
    }

    pub fn mul(&mut self, a: impl Into<Operand>, b: impl Into<Operand>) -> VarId {
        self.binary(BinaryOp::Mul, a.into(), b.into())
    }

    pub fn div(&mut self, a: impl Into<Operand>, b: impl Into<Operand>) -> VarId {
        self.binary(BinaryOp::Div, a.into(), b.into())
    }

    pub fn discrete(&mut self, index: u32, x: VarId) -> VarId {
        self.push(Op::Discrete(index, x))
    }

    /// Record a comparison whose outcome must hold on replay.
    pub fn compare(&mut self, cmp: CompareOp, left: Operand, right: Operand) {
        self.push(Op::Compare(cmp, left, right));
    }

    pub fn cond_exp(
        &mut self,
        cmp: CompareOp,
        left: Operand,
        right: Operand,
        if_true: Operand,
        if_false: Operand,
    ) -> VarId {
        self.push(Op::CondExp(CondExp {
            cmp,
            left,
            right,
            if_true,
            if_false,
        }))
    }

    /// New array object with the given initial contents.
    pub fn new_array(&mut self, init: &[f64]) -> ArrayId {
        self.arrays.push(VecAd { init: init.to_vec() });
        ArrayId::from_index(self.arrays.len() - 1)
    }

    pub fn load(&mut self, array: ArrayId, index: Operand) -> VarId {
        self.push(Op::Load { array, index })
    }

    pub fn store(&mut self, array: ArrayId, index: Operand, value: Operand) {
        self.push(Op::Store { array, index, value });
    }

    pub fn csum(&mut self, add: &[Operand], sub: &[Operand]) -> VarId {
        self.push(Op::CSum(CumulativeSum {
            add: add.to_vec(),
            sub: sub.to_vec(),
        }))
    }

    /// Record a call of an atomic function as one marker block.
    pub fn call(
        &mut self,
        atomic: AtomicId,
        call_id: usize,
        args: &[Operand],
        num_results: usize,
    ) -> Vec<VarId> {
        let header = AtomicCall {
            atomic,
            call_id,
            num_args: args.len(),
            num_results,
        };
        self.push(Op::CallStart(header));
        for &x in args {
            self.push(Op::CallArg(x));
        }
        let results = (0..num_results).map(|_| self.push(Op::CallResult)).collect();
        self.push(Op::CallEnd(header));
        results
    }

    /// Close the tape. Parameter outputs are promoted to variables.
    pub fn finish(mut self, dependents: &[Operand]) -> Result<Tape, TapeError> {
        let deps = dependents
            .iter()
            .map(|&d| match d {
                Operand::Var(v) => v,
                Operand::Par(p) => self.push(Op::Par(p)),
            })
            .collect();
        self.ops.push(Op::End);
        Tape::new(self.ops, self.params, self.arrays, deps)
    }
}

impl Default for TapeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_simple_tape() {
        let mut b = TapeBuilder::new();
        let x = b.independent();
        let y = b.independent();
        let z = b.mul(x, y);
        let tape = b.finish(&[z.into()]).unwrap();
        assert_eq!(tape.len(), 5);
        assert_eq!(tape.dependents(), &[z]);
        assert_eq!(z.index(), 3);
    }

    #[test]
    fn parameter_dependent_becomes_variable() {
        let mut b = TapeBuilder::new();
        let _x = b.independent();
        let c = b.param(3.0);
        let tape = b.finish(&[c]).unwrap();
        let dep = tape.dependents()[0];
        assert_eq!(dep.index(), 2);
        assert!(matches!(tape.ops()[2], Op::Par(_)));
    }

    #[test]
    fn call_block_layout() {
        let mut b = TapeBuilder::new();
        let x = b.independent();
        let two = b.param(2.0);
        let ys = b.call(AtomicId::from_index(0), 7, &[x.into(), two], 2);
        let tape = b.finish(&[ys[1].into()]).unwrap();
        let names: Vec<_> = tape.ops().iter().map(Op::name).collect();
        assert_eq!(
            names,
            ["begin", "inv", "call", "call_arg", "call_arg", "call_res", "call_res", "call_end", "end"]
        );
        assert_eq!(ys[0].index(), 2);
        assert_eq!(ys[1].index(), 3);
    }

    #[test]
    fn late_independent_is_rejected() {
        let mut b = TapeBuilder::new();
        let x = b.independent();
        let _ = b.unary(UnaryOp::Exp, x);
        let y = b.independent();
        assert!(matches!(
            b.finish(&[y.into()]),
            Err(TapeError::MisplacedIndependent { .. })
        ));
    }
}
