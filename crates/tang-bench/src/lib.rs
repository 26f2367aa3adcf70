//! Tape generators for the analysis benchmarks: seeded RNG and recorded
//! programs of the shapes that stress each pass.

use tang_tape::{AtomicId, CompareOp, Operand, Tape, TapeBuilder, TapeError, UnaryOp, VarId};

/// Simple xoshiro256** PRNG for reproducible tapes (no rand dependency in lib).
pub struct Rng {
    s: [u64; 4],
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        // SplitMix64 to expand seed into state
        let mut z = seed;
        let mut s = [0u64; 4];
        for slot in &mut s {
            z = z.wrapping_add(0x9e3779b97f4a7c15);
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
            *slot = z ^ (z >> 31);
        }
        Self { s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.s[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        result
    }

    /// Uniform index in `0..n`.
    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n.max(1) as u64) as usize
    }

    pub fn coin(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }
}

pub fn make_rng() -> Rng {
    Rng::new(0xDEAD_BEEF_CAFE_BABE)
}

// --- tape generators ---

/// Determinant of an `n x n` matrix of independents by expansion in minors.
///
/// Minors are recomputed for every cofactor, so the tape is full of
/// duplicate products and single-use sums.
pub fn det_by_minors(n: usize) -> Result<Tape, TapeError> {
    let mut b = TapeBuilder::new();
    let a: Vec<VarId> = (0..n * n).map(|_| b.independent()).collect();
    let rows: Vec<usize> = (0..n).collect();
    let cols: Vec<usize> = (0..n).collect();
    let det = minor(&mut b, &a, n, &rows, &cols);
    b.finish(&[det])
}

fn minor(b: &mut TapeBuilder, a: &[VarId], n: usize, rows: &[usize], cols: &[usize]) -> Operand {
    let (&r, rest) = match rows.split_first() {
        Some(split) => split,
        None => return b.param(1.0),
    };
    if rest.is_empty() {
        return a[r * n + cols[0]].into();
    }
    let mut acc: Option<VarId> = None;
    for (k, &c) in cols.iter().enumerate() {
        let sub: Vec<usize> = cols.iter().copied().filter(|&j| j != c).collect();
        let m = minor(b, a, n, rest, &sub);
        let term = b.mul(a[r * n + c], m);
        acc = Some(match acc {
            None => term,
            Some(s) if k % 2 == 0 => b.add(s, term),
            Some(s) => b.sub(s, term),
        });
    }
    acc.map_or_else(|| b.param(0.0), Operand::from)
}

/// Product of two `n x n` matrices of independents, written out as dot
/// products so every output is one long additive chain.
pub fn mat_mul(n: usize) -> Result<Tape, TapeError> {
    let mut b = TapeBuilder::new();
    let x: Vec<VarId> = (0..n * n).map(|_| b.independent()).collect();
    let y: Vec<VarId> = (0..n * n).map(|_| b.independent()).collect();
    let mut out = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let mut acc = b.mul(x[i * n], y[j]);
            for k in 1..n {
                let p = b.mul(x[i * n + k], y[k * n + j]);
                acc = b.add(acc, p);
            }
            out.push(acc.into());
        }
    }
    b.finish(&out)
}

/// `n` nested piecewise definitions: each level picks between two
/// transcendental chains of `depth` operators with a fresh comparison.
pub fn piecewise(n: usize, depth: usize) -> Result<Tape, TapeError> {
    let mut b = TapeBuilder::new();
    let x = b.independent();
    let t = b.independent();
    let mut cur = x;
    for level in 0..n {
        let mut hi = cur;
        let mut lo = cur;
        for _ in 0..depth {
            hi = b.unary(UnaryOp::Sin, hi);
            lo = b.unary(UnaryOp::Tanh, lo);
        }
        let threshold = b.param(level as f64 * 0.1);
        let shifted = b.sub(t, threshold);
        cur = b.cond_exp(CompareOp::Lt, cur.into(), shifted.into(), hi.into(), lo.into());
    }
    b.finish(&[cur.into()])
}

/// Random straight-line program over a small operand pool. Duplicates and
/// dead values are common; `call` optionally routes values through a
/// two-argument atomic.
pub fn random_tape(
    rng: &mut Rng,
    num_ops: usize,
    call: Option<AtomicId>,
) -> Result<Tape, TapeError> {
    let mut b = TapeBuilder::new();
    let mut pool: Vec<VarId> = (0..4).map(|_| b.independent()).collect();
    for _ in 0..num_ops {
        let window = pool.len().min(16);
        let base = pool.len() - window;
        let l = pool[base + rng.below(window)];
        let r = pool[base + rng.below(window)];
        let v = match rng.below(6) {
            0 => b.add(l, r),
            1 => b.sub(l, r),
            2 => b.mul(l, r),
            3 => b.unary(if rng.coin() { UnaryOp::Sin } else { UnaryOp::Exp }, l),
            4 => b.cond_exp(CompareOp::Le, l.into(), r.into(), r.into(), l.into()),
            _ => match call {
                Some(atomic) => {
                    let ys = b.call(atomic, 0, &[l.into(), r.into()], 2);
                    ys[rng.below(ys.len())]
                }
                None => b.add(l, r),
            },
        };
        pool.push(v);
    }
    let deps: Vec<Operand> = pool.iter().rev().step_by(7).take(8).map(|&v| v.into()).collect();
    b.finish(&deps)
}
