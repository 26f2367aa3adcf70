//! The validated, immutable operation tape.

use crate::cursor::{Cursor, OpView};
use crate::error::TapeError;
use crate::id::{ArrayId, OpId, Operand, ParId, VarId};
use crate::op::{AtomicCall, Op};

/// A dynamically indexed array recorded on the tape.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VecAd {
    /// Initial contents; the array length is fixed by it.
    pub init: Vec<f64>,
}

impl VecAd {
    pub fn len(&self) -> usize {
        self.init.len()
    }

    pub fn is_empty(&self) -> bool {
        self.init.is_empty()
    }
}

/// A recorded operation sequence, bounded by `Begin` and `End`.
///
/// Construction validates the whole contract (sentinels, operand references,
/// call block nesting), so every consumer may rely on it afterwards.
#[derive(Clone, Debug)]
pub struct Tape {
    ops: Vec<Op>,
    params: Vec<f64>,
    arrays: Vec<VecAd>,
    dependents: Vec<VarId>,
    num_var: usize,
    num_independent: usize,
}

struct OpenCall {
    start: OpId,
    header: AtomicCall,
    args: usize,
    results: usize,
}

impl Tape {
    /// Validate and assemble a tape.
    pub fn new(
        ops: Vec<Op>,
        params: Vec<f64>,
        arrays: Vec<VecAd>,
        dependents: Vec<VarId>,
    ) -> Result<Self, TapeError> {
        if ops.first() != Some(&Op::Begin) {
            return Err(TapeError::MissingBegin);
        }
        if ops.len() < 2 || ops.last() != Some(&Op::End) {
            return Err(TapeError::MissingEnd);
        }

        // primary[v]: v is the last result slot of some operator.
        let mut primary: Vec<bool> = Vec::new();
        let mut num_independent = 0;
        let mut call: Option<OpenCall> = None;

        for (i, op) in ops.iter().enumerate() {
            let id = OpId::from_index(i);
            let last = i + 1 == ops.len();
            if op.is_sentinel() && i != 0 && !last {
                return Err(TapeError::MisplacedSentinel { op: id });
            }

            let mut bad = None;
            op.for_each_operand(|x| {
                if bad.is_none() {
                    bad = check_operand(id, x, &primary, params.len()).err();
                }
            });
            if let Some(e) = bad {
                return Err(e);
            }

            match op {
                Op::Independent => {
                    if num_independent + 1 != i {
                        return Err(TapeError::MisplacedIndependent { op: id });
                    }
                    num_independent += 1;
                }
                Op::Par(p) => {
                    if p.index() >= params.len() {
                        return Err(TapeError::ParameterOutOfRange { op: id, par: *p });
                    }
                }
                Op::Binary(_, a, b) | Op::Compare(_, a, b) => {
                    if !a.is_var() && !b.is_var() {
                        return Err(TapeError::NoVariableOperand { op: id });
                    }
                }
                Op::CondExp(c) => {
                    if !c.slots().iter().any(Operand::is_var) {
                        return Err(TapeError::NoVariableOperand { op: id });
                    }
                }
                Op::CSum(sum) => {
                    if !sum.terms().any(|x| x.is_var()) {
                        return Err(TapeError::NoVariableOperand { op: id });
                    }
                }
                Op::Load { array, .. } | Op::Store { array, .. } => {
                    if array.index() >= arrays.len() {
                        return Err(TapeError::ArrayOutOfRange { op: id, array: *array });
                    }
                }
                _ => {}
            }

            check_call_structure(id, op, &mut call)?;
            if last && call.is_some() {
                return Err(TapeError::MalformedCall { op: id, reason: "unterminated call" });
            }

            let n = op.num_results();
            for k in 0..n {
                primary.push(k + 1 == n && i != 0);
            }
        }

        for &var in &dependents {
            if !primary.get(var.index()).copied().unwrap_or(false) {
                return Err(TapeError::InvalidDependent { var });
            }
        }

        Ok(Self {
            ops,
            params,
            arrays,
            dependents,
            num_var: primary.len(),
            num_independent,
        })
    }

    /// Number of operators, sentinels included.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// A tape always holds at least its two sentinels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn op(&self, id: OpId) -> &Op {
        &self.ops[id.index()]
    }

    #[inline]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Number of variable slots, phantom and auxiliary slots included.
    #[inline]
    pub fn num_var(&self) -> usize {
        self.num_var
    }

    #[inline]
    pub fn num_independent(&self) -> usize {
        self.num_independent
    }

    #[inline]
    pub fn param(&self, id: ParId) -> f64 {
        self.params[id.index()]
    }

    #[inline]
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    #[inline]
    pub fn array(&self, id: ArrayId) -> &VecAd {
        &self.arrays[id.index()]
    }

    #[inline]
    pub fn arrays(&self) -> &[VecAd] {
        &self.arrays
    }

    /// Variables holding the function outputs.
    #[inline]
    pub fn dependents(&self) -> &[VarId] {
        &self.dependents
    }

    /// Visit operators from `Begin` to `End`.
    pub fn forward(&self) -> Forward<'_> {
        Forward { cursor: Some(Cursor::at_start(self)) }
    }

    /// Visit operators from `End` back to `Begin`.
    pub fn reverse(&self) -> Reverse<'_> {
        Reverse { cursor: Some(Cursor::at_end(self)) }
    }
}

fn check_operand(op: OpId, x: Operand, primary: &[bool], num_par: usize) -> Result<(), TapeError> {
    match x {
        Operand::Par(par) if par.index() >= num_par => {
            Err(TapeError::ParameterOutOfRange { op, par })
        }
        Operand::Par(_) => Ok(()),
        Operand::Var(var) if var.index() == 0 || var.index() >= primary.len() => {
            Err(TapeError::DanglingVariable { op, var })
        }
        Operand::Var(var) if !primary[var.index()] => {
            Err(TapeError::AuxiliaryVariable { op, var })
        }
        Operand::Var(_) => Ok(()),
    }
}

fn check_call_structure(id: OpId, op: &Op, call: &mut Option<OpenCall>) -> Result<(), TapeError> {
    let malformed = |reason| Err(TapeError::MalformedCall { op: id, reason });
    match (op, call.as_mut()) {
        (Op::CallStart(_), Some(_)) => malformed("nested call"),
        (Op::CallStart(header), None) => {
            *call = Some(OpenCall { start: id, header: *header, args: 0, results: 0 });
            Ok(())
        }
        (Op::CallArg(_), Some(open)) => {
            if open.results > 0 || open.args == open.header.num_args {
                return malformed("unexpected argument marker");
            }
            open.args += 1;
            Ok(())
        }
        (Op::CallResult, Some(open)) => {
            if open.args != open.header.num_args || open.results == open.header.num_results {
                return malformed("unexpected result marker");
            }
            open.results += 1;
            Ok(())
        }
        (Op::CallEnd(header), Some(open)) => {
            if *header != open.header
                || open.args != header.num_args
                || open.results != header.num_results
            {
                return malformed("end marker does not match its start marker");
            }
            debug_assert!(open.start < id);
            *call = None;
            Ok(())
        }
        (Op::CallArg(_) | Op::CallResult | Op::CallEnd(_), None) => {
            malformed("marker outside of a call block")
        }
        (_, Some(_)) => malformed("unexpected operator inside call block"),
        (_, None) => Ok(()),
    }
}

/// Forward iterator over a tape.
pub struct Forward<'t> {
    cursor: Option<Cursor<'t>>,
}

impl<'t> Iterator for Forward<'t> {
    type Item = OpView<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        let view = cursor.current();
        if cursor.at_last() {
            self.cursor = None;
        } else {
            cursor.step_forward();
        }
        Some(view)
    }
}

/// Reverse iterator over a tape.
pub struct Reverse<'t> {
    cursor: Option<Cursor<'t>>,
}

impl<'t> Iterator for Reverse<'t> {
    type Item = OpView<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.cursor.as_mut()?;
        let view = cursor.current();
        if cursor.at_first() {
            self.cursor = None;
        } else {
            cursor.step_backward();
        }
        Some(view)
    }
}
