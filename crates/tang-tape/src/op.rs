//! Operator records.
//!
//! Every operator is one `Op` value. Variable-length kinds (`CSum`, `CSkip`)
//! own their payload, so walking a tape never needs offset arithmetic.

use serde::{Deserialize, Serialize};

use crate::id::{ArrayId, AtomicId, OpId, Operand, ParId, VarId};

/// Unary elementary functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Abs,
    Acos,
    Acosh,
    Asin,
    Asinh,
    Atan,
    Atanh,
    Cos,
    Cosh,
    Erf,
    Exp,
    Expm1,
    Log,
    Log1p,
    Neg,
    Sign,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 21] = [
        Self::Abs,
        Self::Acos,
        Self::Acosh,
        Self::Asin,
        Self::Asinh,
        Self::Atan,
        Self::Atanh,
        Self::Cos,
        Self::Cosh,
        Self::Erf,
        Self::Exp,
        Self::Expm1,
        Self::Log,
        Self::Log1p,
        Self::Neg,
        Self::Sign,
        Self::Sin,
        Self::Sinh,
        Self::Sqrt,
        Self::Tan,
        Self::Tanh,
    ];

    /// Number of result slots. Functions whose derivative reuses a companion
    /// value (cos for sin, 1 + x^2 for atan, ...) record it in an auxiliary
    /// slot before the primary result.
    pub fn num_results(self) -> usize {
        match self {
            Self::Acos
            | Self::Acosh
            | Self::Asin
            | Self::Asinh
            | Self::Atan
            | Self::Atanh
            | Self::Cos
            | Self::Cosh
            | Self::Erf
            | Self::Sin
            | Self::Sinh
            | Self::Tan
            | Self::Tanh => 2,
            _ => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Acos => "acos",
            Self::Acosh => "acosh",
            Self::Asin => "asin",
            Self::Asinh => "asinh",
            Self::Atan => "atan",
            Self::Atanh => "atanh",
            Self::Cos => "cos",
            Self::Cosh => "cosh",
            Self::Erf => "erf",
            Self::Exp => "exp",
            Self::Expm1 => "expm1",
            Self::Log => "log",
            Self::Log1p => "log1p",
            Self::Neg => "neg",
            Self::Sign => "sign",
            Self::Sin => "sin",
            Self::Sinh => "sinh",
            Self::Sqrt => "sqrt",
            Self::Tan => "tan",
            Self::Tanh => "tanh",
        }
    }
}

/// Binary arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    /// Absolute-zero multiply: `0` whenever the left operand is zero.
    Azmul,
}

impl BinaryOp {
    pub fn num_results(self) -> usize {
        match self {
            // log(x), y * log(x), exp(y * log(x))
            Self::Pow => 3,
            _ => 1,
        }
    }

    /// Operand order does not change the value.
    pub fn is_commutative(self) -> bool {
        matches!(self, Self::Add | Self::Mul)
    }

    /// Candidate for folding into a cumulative sum.
    pub fn is_additive(self) -> bool {
        matches!(self, Self::Add | Self::Sub)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Pow => "pow",
            Self::Azmul => "azmul",
        }
    }
}

/// Comparison used by comparison operators and conditional expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
}

impl CompareOp {
    /// Apply the comparison.
    pub fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Eq => left == right,
            Self::Ge => left >= right,
            Self::Gt => left > right,
            Self::Ne => left != right,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Eq => "eq",
            Self::Ge => "ge",
            Self::Gt => "gt",
            Self::Ne => "ne",
        }
    }
}

/// `if cmp(left, right) { if_true } else { if_false }`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CondExp {
    pub cmp: CompareOp,
    pub left: Operand,
    pub right: Operand,
    pub if_true: Operand,
    pub if_false: Operand,
}

impl CondExp {
    /// The four operand slots in order: left, right, if_true, if_false.
    pub fn slots(&self) -> [Operand; 4] {
        [self.left, self.right, self.if_true, self.if_false]
    }

    /// Both branches select the same variable.
    pub fn same_branch_variable(&self) -> bool {
        match (self.if_true, self.if_false) {
            (Operand::Var(t), Operand::Var(f)) => t == f,
            _ => false,
        }
    }
}

/// Fused accumulation `sum(add) - sum(sub)`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CumulativeSum {
    pub add: Vec<Operand>,
    pub sub: Vec<Operand>,
}

impl CumulativeSum {
    /// Number of terms carried by this record.
    pub fn len(&self) -> usize {
        self.add.len() + self.sub.len()
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.sub.is_empty()
    }

    /// Every term, additions first.
    pub fn terms(&self) -> impl Iterator<Item = Operand> + '_ {
        self.add.iter().chain(self.sub.iter()).copied()
    }
}

/// Conditional skip placed by a rewriter: when `cmp(left, right)` is true the
/// operators in `skip_on_true` are not evaluated, and likewise for false.
#[derive(Clone, Debug, PartialEq)]
pub struct CondSkip {
    pub cmp: CompareOp,
    pub left: Operand,
    pub right: Operand,
    pub skip_on_true: Vec<OpId>,
    pub skip_on_false: Vec<OpId>,
}

impl CondSkip {
    /// Number of operator indices carried by this record.
    pub fn len(&self) -> usize {
        self.skip_on_true.len() + self.skip_on_false.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skip_on_true.is_empty() && self.skip_on_false.is_empty()
    }
}

/// Header shared by the start and end markers of an atomic call block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AtomicCall {
    pub atomic: AtomicId,
    /// Opaque per-call value forwarded to the atomic function.
    pub call_id: usize,
    pub num_args: usize,
    pub num_results: usize,
}

/// One operator of the tape.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// First operator of every tape. Owns the phantom variable 0.
    Begin,
    /// Last operator of every tape.
    End,
    /// Independent input variable.
    Independent,
    /// Parameter copied into a variable.
    Par(ParId),
    Unary(UnaryOp, VarId),
    Binary(BinaryOp, Operand, Operand),
    /// Piecewise-constant user function, by index.
    Discrete(u32, VarId),
    /// Comparison recorded for later re-checking; has no result.
    Compare(CompareOp, Operand, Operand),
    CondExp(CondExp),
    Load { array: ArrayId, index: Operand },
    Store { array: ArrayId, index: Operand, value: Operand },
    CSum(CumulativeSum),
    CSkip(CondSkip),
    CallStart(AtomicCall),
    CallArg(Operand),
    CallResult,
    CallEnd(AtomicCall),
}

impl Op {
    /// Number of result variable slots this operator owns.
    pub fn num_results(&self) -> usize {
        match self {
            Self::Begin => 1,
            Self::End => 0,
            Self::Independent | Self::Par(_) => 1,
            Self::Unary(op, _) => op.num_results(),
            Self::Binary(op, _, _) => op.num_results(),
            Self::Discrete(..) => 1,
            Self::Compare(..) => 0,
            Self::CondExp(_) => 1,
            Self::Load { .. } => 1,
            Self::Store { .. } => 0,
            Self::CSum(_) => 1,
            Self::CSkip(_) => 0,
            Self::CallStart(_) | Self::CallArg(_) | Self::CallEnd(_) => 0,
            Self::CallResult => 1,
        }
    }

    /// Call `f` on every operand, in record order.
    pub fn for_each_operand(&self, mut f: impl FnMut(Operand)) {
        match self {
            Self::Begin
            | Self::End
            | Self::Independent
            | Self::Par(_)
            | Self::CallStart(_)
            | Self::CallResult
            | Self::CallEnd(_) => {}
            Self::Unary(_, x) | Self::Discrete(_, x) => f(Operand::Var(*x)),
            Self::Binary(_, a, b) | Self::Compare(_, a, b) => {
                f(*a);
                f(*b);
            }
            Self::CondExp(c) => c.slots().into_iter().for_each(f),
            Self::Load { index, .. } => f(*index),
            Self::Store { index, value, .. } => {
                f(*index);
                f(*value);
            }
            Self::CSum(sum) => sum.terms().for_each(f),
            Self::CSkip(skip) => {
                f(skip.left);
                f(skip.right);
            }
            Self::CallArg(x) => f(*x),
        }
    }

    /// Call `f` on every variable operand, in record order.
    pub fn for_each_var(&self, mut f: impl FnMut(VarId)) {
        self.for_each_operand(|x| {
            if let Operand::Var(v) = x {
                f(v);
            }
        });
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Begin | Self::End)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::End => "end",
            Self::Independent => "inv",
            Self::Par(_) => "par",
            Self::Unary(op, _) => op.name(),
            Self::Binary(op, _, _) => op.name(),
            Self::Discrete(..) => "dis",
            Self::Compare(..) => "cmp",
            Self::CondExp(_) => "cexp",
            Self::Load { .. } => "load",
            Self::Store { .. } => "store",
            Self::CSum(_) => "csum",
            Self::CSkip(_) => "cskip",
            Self::CallStart(_) => "call",
            Self::CallArg(_) => "call_arg",
            Self::CallResult => "call_res",
            Self::CallEnd(_) => "call_end",
        }
    }
}
