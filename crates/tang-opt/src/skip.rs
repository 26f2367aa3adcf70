//! Conditional-skip table.

use serde::Serialize;
use tang_tape::{CompareOp, Op, OpId, Operand, VarId};
use tracing::debug;

use crate::analyzer::{AnalysisPass, Analyzer};
use crate::error::OptimizeError;

/// Something a conditional skip may jump over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SkipEntry {
    Op(OpId),
    /// A whole atomic call block, markers included. Never split.
    Call { start: OpId, end: OpId },
}

impl SkipEntry {
    /// Whether `op` is skipped by this entry.
    pub fn covers(&self, op: OpId) -> bool {
        match *self {
            Self::Op(o) => o == op,
            Self::Call { start, end } => start <= op && op <= end,
        }
    }

    /// Every operator skipped by this entry.
    pub fn ops(&self) -> impl Iterator<Item = OpId> {
        let (lo, hi) = match *self {
            Self::Op(o) => (o.index(), o.index()),
            Self::Call { start, end } => (start.index(), end.index()),
        };
        (lo..=hi).map(OpId::from_index)
    }
}

/// Skip lists of one conditional expression.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CexpInfo {
    pub op: OpId,
    pub cmp: CompareOp,
    pub left: Operand,
    pub right: Operand,
    /// Larger of the comparison's variable operands. A skip operator for
    /// this conditional cannot be placed before it.
    pub max_left_right: Option<VarId>,
    /// Not needed when the comparison holds.
    pub skip_on_true: Vec<SkipEntry>,
    /// Not needed when it does not.
    pub skip_on_false: Vec<SkipEntry>,
}

impl CexpInfo {
    pub fn skip_list(&self, outcome: bool) -> &[SkipEntry] {
        if outcome {
            &self.skip_on_true
        } else {
            &self.skip_on_false
        }
    }
}

/// Turns per-operator branch memberships into per-conditional skip lists.
pub struct SkipTable;

impl AnalysisPass for SkipTable {
    fn name(&self) -> &str {
        "skip_table"
    }

    fn run(&self, cx: &mut Analyzer<'_>) -> Result<(), OptimizeError> {
        if !cx.conditions.is_active() {
            return Ok(());
        }
        let tape = cx.tape;

        let mut cexps: Vec<CexpInfo> = cx
            .producers
            .cexps()
            .iter()
            .filter_map(|&op| match tape.op(op) {
                Op::CondExp(c) => Some(CexpInfo {
                    op,
                    cmp: c.cmp,
                    left: c.left,
                    right: c.right,
                    max_left_right: c.left.var().max(c.right.var()),
                    skip_on_true: Vec::new(),
                    skip_on_false: Vec::new(),
                }),
                _ => None,
            })
            .collect();

        let mut i = 0;
        while i < tape.len() {
            let op = OpId::from_index(i);
            let (entry, next) = match tape.op(op) {
                Op::CallStart(h) => {
                    let end = i + h.num_args + h.num_results + 1;
                    let entry = SkipEntry::Call {
                        start: op,
                        end: OpId::from_index(end),
                    };
                    (entry, end + 1)
                }
                _ => (SkipEntry::Op(op), i + 1),
            };
            for c in cx.conditions.get(op) {
                let info = &mut cexps[c.cexp.index()];
                if c.outcome {
                    info.skip_on_false.push(entry);
                } else {
                    info.skip_on_true.push(entry);
                }
            }
            i = next;
        }

        debug!(
            num_cexp = cexps.len(),
            entries = cexps
                .iter()
                .map(|c| c.skip_on_true.len() + c.skip_on_false.len())
                .sum::<usize>(),
            "skip table built"
        );
        cx.cexps = cexps;
        Ok(())
    }
}
