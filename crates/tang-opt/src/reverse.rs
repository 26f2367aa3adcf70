//! Reverse usage and branch-membership propagation.

use tang_tape::{AtomicCall, CondExp, Op, OpId, Operand};
use tracing::{debug, trace};

use crate::analyzer::{AnalysisPass, Analyzer};
use crate::atomic::dependency_pattern;
use crate::branch::Condition;
use crate::error::OptimizeError;

/// Walks the tape from `End` to `Begin`, pushing usage from consumers to
/// producers.
pub struct UsagePropagation;

/// An atomic call block entered from its end marker.
struct OpenCall {
    start: OpId,
    header: AtomicCall,
    used_results: Vec<bool>,
    args: Vec<Operand>,
    next_arg: usize,
    next_result: usize,
}

impl AnalysisPass for UsagePropagation {
    fn name(&self) -> &str {
        "usage"
    }

    fn run(&self, cx: &mut Analyzer<'_>) -> Result<(), OptimizeError> {
        let tape = cx.tape;
        let mut call: Option<OpenCall> = None;

        for view in tape.reverse() {
            let i = view.index;
            let used = cx.usage(i).is_used();
            match view.op {
                Op::Begin | Op::End | Op::Independent | Op::Par(_) | Op::CSkip(_) => {}
                Op::Unary(_, x) | Op::Discrete(_, x) => {
                    if used {
                        promote(cx, i, Operand::Var(*x));
                    }
                }
                Op::Binary(_, a, b) => {
                    if used {
                        promote(cx, i, *a);
                        promote(cx, i, *b);
                    }
                }
                Op::CSum(sum) => {
                    if used {
                        for x in sum.terms() {
                            promote(cx, i, x);
                        }
                    }
                }
                Op::Compare(_, a, b) => {
                    if cx.options.compare_op {
                        cx.usage[i.index()] = cx.usage[i.index()].promote();
                        promote(cx, i, *a);
                        promote(cx, i, *b);
                    }
                }
                Op::CondExp(c) => {
                    if used {
                        cond_exp(cx, i, c);
                    }
                }
                Op::Load { array, index } => {
                    if used {
                        if cx.arrays.mark_live(*array) {
                            trace!(%array, "array live");
                        }
                        promote_unconditionally(cx, *index);
                    }
                }
                Op::Store { array, index, value } => {
                    if cx.arrays.is_live(*array) {
                        cx.usage[i.index()] = cx.usage[i.index()].promote();
                        promote_unconditionally(cx, *index);
                        promote_unconditionally(cx, *value);
                    }
                }
                Op::CallEnd(header) => {
                    let start = i.index() - header.num_results - header.num_args - 1;
                    call = Some(OpenCall {
                        start: OpId::from_index(start),
                        header: *header,
                        used_results: vec![false; header.num_results],
                        args: vec![Operand::Var(tang_tape::VarId::PHANTOM); header.num_args],
                        next_arg: header.num_args,
                        next_result: header.num_results,
                    });
                }
                Op::CallResult => {
                    if let Some(open) = call.as_mut() {
                        open.next_result -= 1;
                        if used {
                            open.used_results[open.next_result] = true;
                            let start = open.start;
                            cx.parent2arg(i, start);
                        }
                    }
                }
                Op::CallArg(x) => {
                    if let Some(open) = call.as_mut() {
                        open.next_arg -= 1;
                        open.args[open.next_arg] = *x;
                    }
                }
                Op::CallStart(_) => {
                    if let Some(open) = call.take() {
                        debug_assert_eq!(open.start, i);
                        finish_call(cx, open)?;
                    }
                }
            }
        }

        debug!(
            unused = cx.usage.iter().filter(|u| !u.is_used()).count(),
            live_arrays = cx.arrays.count_live(),
            "usage propagated"
        );
        Ok(())
    }
}

fn promote(cx: &mut Analyzer<'_>, parent: OpId, x: Operand) {
    if let Some(arg) = cx.producer_of(x) {
        cx.parent2arg(parent, arg);
    }
}

/// Data flowing through arrays is not tracked, so whatever reaches an array
/// operation is needed under every branch.
fn promote_unconditionally(cx: &mut Analyzer<'_>, x: Operand) {
    if let Some(arg) = cx.producer_of(x) {
        cx.parent_set2arg(&[], arg);
    }
}

fn cond_exp(cx: &mut Analyzer<'_>, i: OpId, c: &CondExp) {
    promote(cx, i, c.left);
    promote(cx, i, c.right);

    let id = cx.producers.cexp_id(i);
    let branch_sets = cx.conditions.is_active() && !c.same_branch_variable();
    for (x, outcome) in [(c.if_true, true), (c.if_false, false)] {
        let Some(arg) = cx.producer_of(x) else {
            continue;
        };
        match id {
            Some(cexp) if branch_sets => {
                let set = cx.conditions.with(i, Condition { cexp, outcome });
                cx.parent_set2arg(&set, arg);
            }
            _ => cx.parent2arg(i, arg),
        }
    }
}

/// At the start marker: ask the atomic function which arguments the used
/// results depend on and promote their producers.
fn finish_call(cx: &mut Analyzer<'_>, open: OpenCall) -> Result<(), OptimizeError> {
    let start = open.start;
    let header = open.header;
    let atomics = cx.atomics;
    let atomic = atomics
        .get(header.atomic)
        .ok_or(OptimizeError::UnknownAtomic { op: start, atomic: header.atomic })?;

    let level = cx.usage(start);
    if !level.is_used() {
        trace!(%start, name = atomic.name(), "call block unused");
        return Ok(());
    }

    let tape = cx.tape;
    let params: Vec<Option<f64>> = open
        .args
        .iter()
        .map(|x| match x {
            Operand::Par(p) => Some(tape.param(*p)),
            Operand::Var(_) => None,
        })
        .collect();
    let pattern = dependency_pattern(atomic, start, &header, &open.used_results, &params)?;
    let influence = pattern.influencing(&open.used_results);

    for (x, &needed) in open.args.iter().zip(&influence) {
        if needed {
            if let Some(arg) = cx.producer_of(*x) {
                cx.parent2arg(start, arg);
            }
        }
    }

    // The block is kept or dropped as a whole.
    let end = start.index() + header.num_args + header.num_results + 1;
    for k in start.index() + 1..=end {
        if matches!(tape.ops()[k], Op::CallArg(_) | Op::CallEnd(_)) {
            cx.usage[k] = cx.usage[k].join(level);
        }
    }
    trace!(%start, name = atomic.name(), call_id = header.call_id, "call block used");
    Ok(())
}
