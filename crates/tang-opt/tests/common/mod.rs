//! Shared helpers: a reference evaluator, sample atomic functions and a
//! random tape strategy.

#![allow(dead_code)]

use std::sync::Arc;

use proptest::prelude::*;
use tang_opt::{
    Analysis, AtomicRegistry, AtomicSparsity, SparsityForm, SparsityKind,
    SparsityPattern, Usage,
};
use tang_tape::{
    AtomicId, BinaryOp, CompareOp, Op, OpId, Operand, Tape, TapeBuilder, UnaryOp, VarId,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Atomic functions
// ---------------------------------------------------------------------------

/// `y0 = x0 + x1`, `y1 = 2 * x0`.
pub struct SumDouble {
    pub kinds: Vec<SparsityKind>,
}

impl SumDouble {
    pub fn eval(x: &[f64]) -> Vec<f64> {
        vec![x[0] + x[1], 2.0 * x[0]]
    }
}

impl AtomicSparsity for SumDouble {
    fn name(&self) -> &str {
        "sum_double"
    }

    fn supported(&self) -> &[SparsityKind] {
        &self.kinds
    }

    fn rev_sparsity(
        &self,
        _call_id: usize,
        kind: SparsityKind,
        _select_y: &[bool],
        _params: &[Option<f64>],
    ) -> Option<SparsityForm> {
        // argument-major: x0 -> {y0, y1}, x1 -> {y0}
        Some(match kind {
            SparsityKind::Pairs => {
                let mut p = SparsityPattern::new(2, 2);
                p.push(0, 0);
                p.push(0, 1);
                p.push(1, 0);
                SparsityForm::Pairs(p)
            }
            SparsityKind::Sets => SparsityForm::Sets(vec![[0, 1].into(), [0].into()]),
            SparsityKind::Bools => SparsityForm::Bools(vec![true, true, true, false]),
            SparsityKind::Packed => SparsityForm::Packed(vec![0b11, 0b01]),
        })
    }
}

/// Registry holding [`SumDouble`] under id 0.
pub fn registry() -> AtomicRegistry {
    let mut atomics = AtomicRegistry::new();
    atomics.register(Arc::new(SumDouble {
        kinds: vec![SparsityKind::Pairs],
    }));
    atomics
}

pub const SUM_DOUBLE: usize = 0;

pub fn eval_atomic(atomic: AtomicId, x: &[f64]) -> Vec<f64> {
    assert_eq!(atomic.index(), SUM_DOUBLE);
    SumDouble::eval(x)
}

// ---------------------------------------------------------------------------
// Reference evaluator
// ---------------------------------------------------------------------------

pub fn unary(op: UnaryOp, x: f64) -> f64 {
    match op {
        UnaryOp::Abs => x.abs(),
        UnaryOp::Acos => x.acos(),
        UnaryOp::Acosh => x.acosh(),
        UnaryOp::Asin => x.asin(),
        UnaryOp::Asinh => x.asinh(),
        UnaryOp::Atan => x.atan(),
        UnaryOp::Atanh => x.atanh(),
        UnaryOp::Cos => x.cos(),
        UnaryOp::Cosh => x.cosh(),
        UnaryOp::Erf => x.tanh(),
        UnaryOp::Exp => x.exp(),
        UnaryOp::Expm1 => x.exp_m1(),
        UnaryOp::Log => x.ln(),
        UnaryOp::Log1p => x.ln_1p(),
        UnaryOp::Neg => -x,
        UnaryOp::Sign => x.signum(),
        UnaryOp::Sin => x.sin(),
        UnaryOp::Sinh => x.sinh(),
        UnaryOp::Sqrt => x.sqrt(),
        UnaryOp::Tan => x.tan(),
        UnaryOp::Tanh => x.tanh(),
    }
}

pub fn binary(op: BinaryOp, l: f64, r: f64) -> f64 {
    match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => l / r,
        BinaryOp::Pow => l.powf(r),
        BinaryOp::Azmul => {
            if l == 0.0 {
                0.0
            } else {
                l * r
            }
        }
    }
}

pub fn discrete(index: u32, x: f64) -> f64 {
    match index {
        0 => x.floor(),
        _ => x.round(),
    }
}

fn array_slot(len: usize, index: f64) -> usize {
    (index.abs() as usize) % len.max(1)
}

/// Replay every operator.
pub fn eval(tape: &Tape, inputs: &[f64]) -> Vec<f64> {
    let mut vars = vec![f64::NAN; tape.num_var()];
    let mut arrays: Vec<Vec<f64>> = tape.arrays().iter().map(|a| a.init.clone()).collect();
    let mut pending: Vec<f64> = Vec::new();
    let mut next_input = 0;
    let mut args = Vec::new();

    for view in tape.forward() {
        let value = |x: Operand| match x {
            Operand::Par(p) => tape.param(p),
            Operand::Var(v) => vars[v.index()],
        };
        let result = match view.op {
            Op::Begin | Op::End | Op::Compare(..) | Op::CSkip(_) => None,
            Op::Independent => {
                next_input += 1;
                Some(inputs[next_input - 1])
            }
            Op::Par(p) => Some(tape.param(*p)),
            Op::Unary(u, x) => Some(unary(*u, vars[x.index()])),
            Op::Binary(b, l, r) => Some(binary(*b, value(*l), value(*r))),
            Op::Discrete(i, x) => Some(discrete(*i, vars[x.index()])),
            Op::CondExp(c) => Some(if c.cmp.holds(value(c.left), value(c.right)) {
                value(c.if_true)
            } else {
                value(c.if_false)
            }),
            Op::Load { array, index } => {
                let a = &arrays[array.index()];
                Some(a[array_slot(a.len(), value(*index))])
            }
            Op::Store { array, index, value: x } => {
                let (i, v) = (value(*index), value(*x));
                let a = &mut arrays[array.index()];
                let slot = array_slot(a.len(), i);
                a[slot] = v;
                None
            }
            Op::CSum(sum) => {
                let mut acc = 0.0;
                for &x in &sum.add {
                    acc += value(x);
                }
                for &x in &sum.sub {
                    acc -= value(x);
                }
                Some(acc)
            }
            Op::CallStart(_) => {
                args.clear();
                None
            }
            Op::CallArg(x) => {
                args.push(value(*x));
                None
            }
            Op::CallResult => {
                if pending.is_empty() {
                    pending = pending_results(tape, view.index, &args);
                }
                Some(pending.remove(0))
            }
            Op::CallEnd(_) => {
                pending.clear();
                None
            }
        };
        if let (Some(v), Some(slot)) = (result, view.primary()) {
            vars[slot.index()] = v;
        }
    }
    tape.dependents().iter().map(|d| vars[d.index()]).collect()
}

fn pending_results(tape: &Tape, result_op: OpId, args: &[f64]) -> Vec<f64> {
    let mut k = result_op.index();
    while !matches!(tape.ops()[k], Op::CallStart(_)) {
        k -= 1;
    }
    let Op::CallStart(header) = tape.ops()[k] else {
        unreachable!()
    };
    eval_atomic(header.atomic, args)
}

/// Replay the tape the way a rewriter using `analysis` would: unused
/// operators dropped, duplicates read from their representative, fused sums
/// evaluated at their root and skip lists honoured. A skip is placed right
/// after the later of its comparison operands.
///
/// Reading a value that was never computed is an error.
pub fn eval_annotated(tape: &Tape, analysis: &Analysis, inputs: &[f64]) -> Result<Vec<f64>, String> {
    let mut vars: Vec<Option<f64>> = vec![None; tape.num_var()];
    let mut arrays: Vec<Vec<f64>> = tape.arrays().iter().map(|a| a.init.clone()).collect();
    let mut next_input = 0;
    let n = tape.len();

    let mut i = 0;
    while i < n {
        let id = OpId::from_index(i);
        let op = tape.op(id);
        if let Op::Independent = op {
            next_input += 1;
        }
        if !analysis.usage(id).is_used()
            || analysis.usage(id) == Usage::Fused
            || is_skipped(tape, analysis, &vars, id)
        {
            i = match op {
                Op::CallStart(h) => i + h.num_args + h.num_results + 2,
                _ => i + 1,
            };
            continue;
        }

        let read = |vars: &[Option<f64>], x: Operand| read_operand(tape, vars, id, x);
        let primary = primary_of(analysis, id);

        if let Some(earlier) = analysis.previous(id) {
            if let (Some(dst), Some(src)) = (primary, primary_of(analysis, earlier)) {
                let v = vars[src.index()].ok_or_else(|| format!("{id} links to skipped {earlier}"))?;
                vars[dst.index()] = Some(v);
            }
            i += 1;
            continue;
        }

        let result = match op {
            Op::Begin | Op::End | Op::Compare(..) | Op::CSkip(_) => None,
            Op::Independent => Some(inputs[next_input - 1]),
            Op::Par(p) => Some(tape.param(*p)),
            Op::Unary(u, x) => Some(unary(*u, read(&vars, Operand::Var(*x))?)),
            Op::Binary(b, _, _) if b.is_additive() => Some(chain_value(tape, analysis, &vars, id)?),
            Op::Binary(b, l, r) => Some(binary(*b, read(&vars, *l)?, read(&vars, *r)?)),
            Op::Discrete(k, x) => Some(discrete(*k, read(&vars, Operand::Var(*x))?)),
            Op::CondExp(c) => {
                let holds = c.cmp.holds(read(&vars, c.left)?, read(&vars, c.right)?);
                Some(read(&vars, if holds { c.if_true } else { c.if_false })?)
            }
            Op::Load { array, index } => {
                let a = &arrays[array.index()];
                Some(a[array_slot(a.len(), read(&vars, *index)?)])
            }
            Op::Store { array, index, value } => {
                let (k, v) = (read(&vars, *index)?, read(&vars, *value)?);
                let a = &mut arrays[array.index()];
                let slot = array_slot(a.len(), k);
                a[slot] = v;
                None
            }
            Op::CSum(sum) => {
                let mut acc = 0.0;
                for &x in &sum.add {
                    acc += read(&vars, x)?;
                }
                for &x in &sum.sub {
                    acc -= read(&vars, x)?;
                }
                Some(acc)
            }
            Op::CallStart(h) => {
                let x: Vec<f64> = (0..h.num_args)
                    .map(|j| match tape.ops()[i + 1 + j] {
                        Op::CallArg(x) => read(&vars, x).unwrap_or(f64::NAN),
                        _ => f64::NAN,
                    })
                    .collect();
                let y = eval_atomic(h.atomic, &x);
                for (k, value) in y.into_iter().enumerate() {
                    let res = OpId::from_index(i + 1 + h.num_args + k);
                    if let Some(v) = primary_of(analysis, res) {
                        vars[v.index()] = Some(value);
                    }
                }
                i += h.num_args + h.num_results + 2;
                continue;
            }
            Op::CallArg(_) | Op::CallResult | Op::CallEnd(_) => None,
        };
        if let (Some(v), Some(slot)) = (result, primary) {
            vars[slot.index()] = Some(v);
        }
        i += 1;
    }

    tape.dependents()
        .iter()
        .map(|d| vars[d.index()].ok_or_else(|| format!("dependent {d} never computed")))
        .collect()
}

fn read_operand(tape: &Tape, vars: &[Option<f64>], at: OpId, x: Operand) -> Result<f64, String> {
    match x {
        Operand::Par(p) => Ok(tape.param(p)),
        Operand::Var(v) => vars[v.index()].ok_or_else(|| format!("{at} read skipped {v}")),
    }
}

/// Value of an add/sub root, evaluating fused producers in place with the
/// same association as the recorded tree.
fn chain_value(tape: &Tape, analysis: &Analysis, vars: &[Option<f64>], op: OpId) -> Result<f64, String> {
    let Op::Binary(b, l, r) = tape.op(op) else {
        return Err(format!("{op} is not a sum"));
    };
    let term = |x: Operand| match analysis.producer_of(x) {
        Some(j) if analysis.usage(j) == Usage::Fused => chain_value(tape, analysis, vars, j),
        _ => read_operand(tape, vars, op, x),
    };
    Ok(binary(*b, term(*l)?, term(*r)?))
}

/// Primary variable of `op`, found through the producer map.
fn primary_of(analysis: &Analysis, op: OpId) -> Option<VarId> {
    analysis
        .var2op
        .iter()
        .position(|&p| p == Some(op))
        .map(VarId::from_index)
}

/// A skip applies once both comparison operands have been computed.
fn is_skipped(tape: &Tape, analysis: &Analysis, vars: &[Option<f64>], op: OpId) -> bool {
    analysis.cexps.iter().any(|info| {
        let value = |x: Operand| match x {
            Operand::Par(p) => Some(tape.param(p)),
            Operand::Var(v) => vars[v.index()],
        };
        let before = |x: Operand| analysis.producer_of(x).map_or(true, |p| p < op);
        if !before(info.left) || !before(info.right) {
            return false;
        }
        let (Some(l), Some(r)) = (value(info.left), value(info.right)) else {
            return false;
        };
        info.skip_list(info.cmp.holds(l, r)).iter().any(|e| e.covers(op))
    })
}

/// Bitwise equal outputs, any NaN matching any NaN.
pub fn same_outputs(expected: &[f64], actual: &[f64]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual)
            .all(|(e, a)| e.to_bits() == a.to_bits() || (e.is_nan() && a.is_nan()))
}

// ---------------------------------------------------------------------------
// Random tapes
// ---------------------------------------------------------------------------

/// One recorded step; operands are picked by index modulo what exists.
#[derive(Clone, Debug)]
pub enum Step {
    Unary(usize, usize),
    Binary(usize, usize, usize, bool),
    Cexp(usize, usize, usize, usize, usize),
    Compare(usize, usize),
    Discrete(usize),
    Store(usize, usize),
    Load(usize),
    Call(usize, usize),
    CSum(Vec<usize>, Vec<usize>),
}

const UNARY: [UnaryOp; 8] = [
    UnaryOp::Sin,
    UnaryOp::Cos,
    UnaryOp::Tanh,
    UnaryOp::Atan,
    UnaryOp::Neg,
    UnaryOp::Abs,
    UnaryOp::Sign,
    UnaryOp::Erf,
];

const BINARY: [BinaryOp; 4] = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Azmul];

const CMP: [CompareOp; 6] = [
    CompareOp::Lt,
    CompareOp::Le,
    CompareOp::Eq,
    CompareOp::Ge,
    CompareOp::Gt,
    CompareOp::Ne,
];

fn step() -> impl Strategy<Value = Step> {
    let i = 0usize..64;
    prop_oneof![
        4 => (i.clone(), i.clone()).prop_map(|(k, a)| Step::Unary(k, a)),
        6 => (i.clone(), i.clone(), i.clone(), any::<bool>())
            .prop_map(|(k, a, b, par)| Step::Binary(k, a, b, par)),
        3 => (i.clone(), i.clone(), i.clone(), i.clone(), i.clone())
            .prop_map(|(k, l, r, t, f)| Step::Cexp(k, l, r, t, f)),
        1 => (i.clone(), i.clone()).prop_map(|(a, b)| Step::Compare(a, b)),
        1 => i.clone().prop_map(Step::Discrete),
        1 => (i.clone(), i.clone()).prop_map(|(k, v)| Step::Store(k, v)),
        1 => i.clone().prop_map(Step::Load),
        1 => (i.clone(), i.clone()).prop_map(|(a, b)| Step::Call(a, b)),
        1 => (prop::collection::vec(i.clone(), 1..4), prop::collection::vec(i, 0..3))
            .prop_map(|(a, s)| Step::CSum(a, s)),
    ]
}

/// Number of independents, recorded steps and dependent picks.
pub fn tape_strategy() -> impl Strategy<Value = (usize, Vec<Step>, Vec<usize>)> {
    (
        1usize..4,
        prop::collection::vec(step(), 1..30),
        prop::collection::vec(0usize..64, 1..4),
    )
}

pub fn inputs_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-2.0f64..2.0, 3)
}

/// Record a tape from generated steps. Duplicates are likely: operands are
/// drawn from a small pool and parameters from a handful of values.
pub fn build(num_inputs: usize, steps: &[Step], deps: &[usize]) -> Tape {
    let mut b = TapeBuilder::new();
    let mut pool: Vec<VarId> = (0..num_inputs).map(|_| b.independent()).collect();
    let array = b.new_array(&[0.5, -1.0, 2.0]);
    let call = AtomicId::from_index(SUM_DOUBLE);
    let pick = |pool: &[VarId], k: usize| pool[k % pool.len()];
    let par = |b: &mut TapeBuilder, k: usize| b.param([0.0, 1.0, 2.0][k % 3]);

    for s in steps {
        match s {
            Step::Unary(k, a) => {
                let x = pick(&pool, *a);
                pool.push(b.unary(UNARY[k % UNARY.len()], x));
            }
            Step::Binary(k, a, c, with_par) => {
                let op = BINARY[k % BINARY.len()];
                let l = pick(&pool, *a).into();
                let r = if *with_par { par(&mut b, *c) } else { pick(&pool, *c).into() };
                pool.push(b.binary(op, l, r));
            }
            Step::Cexp(k, l, r, t, f) => {
                let (l, r) = (pick(&pool, *l).into(), pick(&pool, *r).into());
                let (t, f) = (pick(&pool, *t).into(), pick(&pool, *f).into());
                pool.push(b.cond_exp(CMP[k % CMP.len()], l, r, t, f));
            }
            Step::Compare(a, c) => {
                let (l, r) = (pick(&pool, *a).into(), pick(&pool, *c).into());
                b.compare(CompareOp::Lt, l, r);
            }
            Step::Discrete(a) => {
                let x = pick(&pool, *a);
                pool.push(b.discrete((*a % 2) as u32, x));
            }
            Step::Store(k, v) => {
                let index = par(&mut b, *k);
                b.store(array, index, pick(&pool, *v).into());
            }
            Step::Load(k) => {
                let index = pick(&pool, *k).into();
                pool.push(b.load(array, index));
            }
            Step::Call(a, c) => {
                let args: [Operand; 2] = [pick(&pool, *a).into(), pick(&pool, *c).into()];
                pool.extend(b.call(call, 0, &args, 2));
            }
            Step::CSum(add, sub) => {
                let add: Vec<Operand> = add.iter().map(|&k| pick(&pool, k).into()).collect();
                let sub: Vec<Operand> = sub.iter().map(|&k| pick(&pool, k).into()).collect();
                pool.push(b.csum(&add, &sub));
            }
        }
    }
    let deps: Vec<Operand> = deps.iter().map(|&k| pick(&pool, k).into()).collect();
    b.finish(&deps).expect("generated tape is valid")
}
