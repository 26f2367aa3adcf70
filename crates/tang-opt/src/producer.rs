//! Initial forward scan: who produced each variable.

use serde::Serialize;
use tang_tape::{CexpId, Op, OpId, Tape, VarId};

/// Start and end markers of one atomic call block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CallBlock {
    pub start: OpId,
    pub end: OpId,
}

/// Variable-to-operator map plus the structural facts gathered in the same
/// scan.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProducerMap {
    var2op: Vec<Option<OpId>>,
    num_independent: usize,
    cexps: Vec<OpId>,
    calls: Vec<CallBlock>,
}

impl ProducerMap {
    pub fn scan(tape: &Tape) -> Self {
        let mut map = Self {
            var2op: vec![None; tape.num_var()],
            ..Self::default()
        };
        let mut open = None;
        for view in tape.forward() {
            if let Some(v) = view.primary() {
                map.var2op[v.index()] = Some(view.index);
            }
            match view.op {
                Op::Independent => map.num_independent += 1,
                Op::CondExp(_) => map.cexps.push(view.index),
                Op::CallStart(_) => open = Some(view.index),
                Op::CallEnd(_) => {
                    if let Some(start) = open.take() {
                        map.calls.push(CallBlock { start, end: view.index });
                    }
                }
                _ => {}
            }
        }
        map
    }

    /// Producing operator of a primary variable; `None` for the phantom
    /// variable and auxiliary slots.
    #[inline]
    pub fn producer(&self, var: VarId) -> Option<OpId> {
        self.var2op.get(var.index()).copied().flatten()
    }

    pub fn var2op(&self) -> &[Option<OpId>] {
        &self.var2op
    }

    pub fn num_independent(&self) -> usize {
        self.num_independent
    }

    /// Conditional-expression operators in tape order; position is the id.
    pub fn cexps(&self) -> &[OpId] {
        &self.cexps
    }

    pub fn cexp_id(&self, op: OpId) -> Option<CexpId> {
        self.cexps.binary_search(&op).ok().map(CexpId::from_index)
    }

    pub fn calls(&self) -> &[CallBlock] {
        &self.calls
    }

    /// Block whose start marker is `start`.
    pub fn call_starting_at(&self, start: OpId) -> Option<CallBlock> {
        let i = self.calls.binary_search_by_key(&start, |b| b.start).ok()?;
        Some(self.calls[i])
    }

    /// Block whose end marker is `end`.
    pub fn call_ending_at(&self, end: OpId) -> Option<CallBlock> {
        let i = self.calls.binary_search_by_key(&end, |b| b.end).ok()?;
        Some(self.calls[i])
    }

    pub(crate) fn into_var2op(self) -> Vec<Option<OpId>> {
        self.var2op
    }
}
