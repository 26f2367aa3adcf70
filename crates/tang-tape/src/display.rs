//! Pretty-printing for tapes.

use std::fmt;

use crate::id::Operand;
use crate::op::Op;
use crate::tape::Tape;

fn join(xs: &[Operand]) -> String {
    xs.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(" ")
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Op::Begin | Op::End | Op::Independent | Op::CallResult => write!(f, "{}", self.name()),
            Op::Par(p) => write!(f, "par {p}"),
            Op::Unary(op, x) => write!(f, "{} {x}", op.name()),
            Op::Binary(op, a, b) => write!(f, "{} {a} {b}", op.name()),
            Op::Discrete(i, x) => write!(f, "dis[{i}] {x}"),
            Op::Compare(cmp, a, b) => write!(f, "cmp {} {a} {b}", cmp.name()),
            Op::CondExp(c) => write!(
                f,
                "cexp {} {} {} ? {} : {}",
                c.cmp.name(),
                c.left,
                c.right,
                c.if_true,
                c.if_false
            ),
            Op::Load { array, index } => write!(f, "load {array}[{index}]"),
            Op::Store { array, index, value } => write!(f, "store {array}[{index}] = {value}"),
            Op::CSum(sum) => write!(f, "csum +[{}] -[{}]", join(&sum.add), join(&sum.sub)),
            Op::CSkip(skip) => write!(
                f,
                "cskip {} {} {} true:{:?} false:{:?}",
                skip.cmp.name(),
                skip.left,
                skip.right,
                skip.skip_on_true,
                skip.skip_on_false
            ),
            Op::CallStart(call) | Op::CallEnd(call) => write!(
                f,
                "{} {}#{} ({} -> {})",
                self.name(),
                call.atomic,
                call.call_id,
                call.num_args,
                call.num_results
            ),
            Op::CallArg(x) => write!(f, "call_arg {x}"),
        }
    }
}

impl fmt::Display for Tape {
    /// One operator per line: `op4 v7 = pow v4 v2`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for view in self.forward() {
            match view.primary() {
                Some(v) => writeln!(f, "{} {v} = {}", view.index, view.op)?,
                None => writeln!(f, "{} {}", view.index, view.op)?,
            }
        }
        Ok(())
    }
}
