//! Chain fusion: single-use add/sub operators feeding another add/sub.

use tang_tape::{BinaryOp, Op, OpId, Operand, Tape};
use tracing::{debug, trace};

use crate::analyzer::{Analysis, AnalysisPass, Analyzer};
use crate::error::OptimizeError;
use crate::usage::Usage;

/// Marks add/sub operators whose only consumer is another used add/sub as
/// [`Usage::Fused`].
pub struct ChainFusion;

fn is_additive(op: &Op) -> bool {
    matches!(op, Op::Binary(b, _, _) if b.is_additive())
}

impl AnalysisPass for ChainFusion {
    fn name(&self) -> &str {
        "chain_fusion"
    }

    fn run(&self, cx: &mut Analyzer<'_>) -> Result<(), OptimizeError> {
        if !cx.options.cumulative_sum {
            debug!("chain fusion disabled");
            return Ok(());
        }
        let tape = cx.tape;
        let mut fused = 0usize;

        for view in tape.forward() {
            let Op::Binary(b, l, r) = view.op else {
                continue;
            };
            // a linked operator is replaced, so nothing folds into it
            if !b.is_additive()
                || !cx.usage(view.index).is_used()
                || cx.previous(view.index).is_some()
            {
                continue;
            }
            for x in [*l, *r] {
                let Some(j) = cx.producer_of(x) else {
                    continue;
                };
                if cx.usage(j) == Usage::Once && cx.previous(j).is_none() && is_additive(tape.op(j)) {
                    trace!(op = %j, into = %view.index, "fused");
                    cx.usage[j.index()] = Usage::Fused;
                    fused += 1;
                }
            }
        }

        debug!(fused, "chain fusion done");
        Ok(())
    }
}

/// Operands of the cumulative sum rooted at `root`, split into added and
/// subtracted terms.
///
/// Follows fused add/sub producers; a subtracted subtree flips the sign of
/// everything below it.
pub fn chain_terms(tape: &Tape, analysis: &Analysis, root: OpId) -> (Vec<Operand>, Vec<Operand>) {
    let mut add = Vec::new();
    let mut sub = Vec::new();
    let mut stack = vec![(root, true)];
    while let Some((op, positive)) = stack.pop() {
        let Op::Binary(b, l, r) = tape.op(op) else {
            continue;
        };
        let right_sign = if *b == BinaryOp::Sub { !positive } else { positive };
        for (x, sign) in [(*l, positive), (*r, right_sign)] {
            match analysis.producer_of(x) {
                Some(j) if analysis.usage(j) == Usage::Fused => stack.push((j, sign)),
                _ if sign => add.push(x),
                _ => sub.push(x),
            }
        }
    }
    (add, sub)
}
