//! Forward value numbering: link duplicate computations to their first
//! occurrence.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use tang_tape::{BinaryOp, CompareOp, Op, OpId, Operand, UnaryOp};
use tracing::{debug, trace};

use crate::analyzer::{AnalysisPass, Analyzer};
use crate::error::OptimizeError;

/// Matches used pure operators against earlier ones with the same
/// structural signature.
pub struct ValueNumbering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Kind {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Discrete(u32),
    Compare(CompareOp),
}

/// Canonical operand: the representative producer of a variable, or the bit
/// pattern of a parameter value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Key {
    Absent,
    Var(OpId),
    Par(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Signature {
    kind: Kind,
    operands: [Key; 2],
}

impl Signature {
    fn slot(&self, size: usize) -> usize {
        let mut h = FxHasher::default();
        self.hash(&mut h);
        (h.finish() % size as u64) as usize
    }
}

/// Open table with one representative per slot.
struct Table {
    slots: Vec<Option<(Signature, OpId)>>,
}

impl Table {
    fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size.max(1)],
        }
    }

    /// Earlier operator with exactly this signature.
    fn find(&self, sig: &Signature, op: OpId) -> Option<OpId> {
        match &self.slots[sig.slot(self.slots.len())] {
            Some((seen, earlier)) if seen == sig && *earlier < op => Some(*earlier),
            _ => None,
        }
    }

    fn insert(&mut self, sig: Signature, op: OpId) {
        let n = self.slots.len();
        self.slots[sig.slot(n)] = Some((sig, op));
    }
}

/// `earlier` is computed whenever `later` is needed: every branch condition
/// of `earlier` is also one of `later`.
fn available(cx: &Analyzer<'_>, earlier: OpId, later: OpId) -> bool {
    let needed = cx.conditions(later);
    cx.conditions(earlier)
        .iter()
        .all(|c| needed.binary_search(c).is_ok())
}

impl AnalysisPass for ValueNumbering {
    fn name(&self) -> &str {
        "value_numbering"
    }

    fn run(&self, cx: &mut Analyzer<'_>) -> Result<(), OptimizeError> {
        if !cx.options.value_numbering {
            debug!("value numbering disabled");
            return Ok(());
        }
        let tape = cx.tape;
        let mut table = Table::new(cx.options.hash_table_size);
        let mut matched = 0usize;

        for view in tape.forward() {
            let i = view.index;
            if !cx.usage(i).is_used() {
                continue;
            }
            let Some(sig) = signature(cx, view.op) else {
                continue;
            };
            match table.find(&sig, i) {
                Some(earlier) if available(cx, earlier, i) => {
                    trace!(op = %i, %earlier, "duplicate");
                    cx.previous[i.index()] = Some(earlier);
                    // the representative now also serves the consumers of `i`
                    cx.usage[earlier.index()] = cx.usage[earlier.index()].promote();
                    matched += 1;
                }
                _ => table.insert(sig, i),
            }
        }

        debug!(matched, slots = table.slots.len(), "value numbering done");
        Ok(())
    }
}

fn key(cx: &Analyzer<'_>, x: Operand) -> Key {
    match x {
        Operand::Par(p) => Key::Par(cx.tape.param(p).to_bits()),
        Operand::Var(v) => cx.representative(v).map_or(Key::Absent, Key::Var),
    }
}

fn signature(cx: &Analyzer<'_>, op: &Op) -> Option<Signature> {
    let (kind, mut operands) = match op {
        Op::Unary(u, x) => (Kind::Unary(*u), [key(cx, Operand::Var(*x)), Key::Absent]),
        Op::Discrete(index, x) => (Kind::Discrete(*index), [key(cx, Operand::Var(*x)), Key::Absent]),
        Op::Binary(b, l, r) => (Kind::Binary(*b), [key(cx, *l), key(cx, *r)]),
        Op::Compare(c, l, r) => (Kind::Compare(*c), [key(cx, *l), key(cx, *r)]),
        _ => return None,
    };
    if matches!(kind, Kind::Binary(b) if b.is_commutative()) {
        operands.sort_unstable();
    }
    Some(Signature { kind, operands })
}
