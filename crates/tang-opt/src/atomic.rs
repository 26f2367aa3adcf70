//! Boundary to atomic (opaque) functions.
//!
//! The propagator only needs to know which arguments of a call influence the
//! results that are used. Atomic functions may answer in several legacy
//! forms; they are all converted here to one [`SparsityPattern`], so the
//! analysis itself never looks at the form.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tang_tape::{AtomicCall, AtomicId, OpId};
use tracing::debug;

use crate::error::OptimizeError;

/// The answer forms an atomic function can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SparsityKind {
    Pairs,
    Sets,
    Bools,
    Packed,
}

impl SparsityKind {
    /// Order in which supported forms are requested.
    pub const PREFERENCE: [SparsityKind; 4] = [Self::Pairs, Self::Sets, Self::Bools, Self::Packed];
}

/// Dependency pattern in coordinate form: entry `k` says result `rows[k]`
/// depends on argument `cols[k]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparsityPattern {
    pub nrows: usize,
    pub ncols: usize,
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
}

impl SparsityPattern {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            rows: Vec::new(),
            cols: Vec::new(),
        }
    }

    /// Add an entry. Panics when out of bounds.
    pub fn push(&mut self, row: usize, col: usize) {
        assert!(row < self.nrows && col < self.ncols);
        self.rows.push(row);
        self.cols.push(col);
    }

    pub fn nnz(&self) -> usize {
        self.rows.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows.iter().copied().zip(self.cols.iter().copied())
    }

    /// For each argument: does some selected result depend on it.
    pub fn influencing(&self, select_rows: &[bool]) -> Vec<bool> {
        let mut out = vec![false; self.ncols];
        for (r, c) in self.iter() {
            if select_rows.get(r).copied().unwrap_or(false) {
                out[c] = true;
            }
        }
        out
    }

    fn in_bounds(&self) -> bool {
        self.rows.len() == self.cols.len()
            && self.iter().all(|(r, c)| r < self.nrows && c < self.ncols)
    }
}

/// An atomic function's answer in one of its forms.
///
/// Every form relates arguments to results. The legacy forms are
/// argument-major: `Sets[j]` holds the results argument `j` influences,
/// `Bools` is a `num_args x num_results` row-major matrix and `Packed` holds
/// `ceil(num_results / 64)` words per argument.
#[derive(Clone, Debug, PartialEq)]
pub enum SparsityForm {
    Pairs(SparsityPattern),
    Sets(Vec<BTreeSet<usize>>),
    Bools(Vec<bool>),
    Packed(Vec<u64>),
}

impl SparsityForm {
    pub fn kind(&self) -> SparsityKind {
        match self {
            Self::Pairs(_) => SparsityKind::Pairs,
            Self::Sets(_) => SparsityKind::Sets,
            Self::Bools(_) => SparsityKind::Bools,
            Self::Packed(_) => SparsityKind::Packed,
        }
    }

    /// Convert to the coordinate pattern, or `None` when the shape does not
    /// match a call with `num_args` arguments and `num_results` results.
    pub fn into_pattern(self, num_args: usize, num_results: usize) -> Option<SparsityPattern> {
        let mut pattern = SparsityPattern::new(num_results, num_args);
        match self {
            Self::Pairs(p) => {
                if p.nrows != num_results || p.ncols != num_args || !p.in_bounds() {
                    return None;
                }
                return Some(p);
            }
            Self::Sets(sets) => {
                if sets.len() != num_args {
                    return None;
                }
                for (j, set) in sets.iter().enumerate() {
                    for &i in set {
                        if i >= num_results {
                            return None;
                        }
                        pattern.push(i, j);
                    }
                }
            }
            Self::Bools(bools) => {
                if bools.len() != num_args * num_results {
                    return None;
                }
                for (k, _) in bools.iter().enumerate().filter(|(_, &b)| b) {
                    pattern.push(k % num_results, k / num_results);
                }
            }
            Self::Packed(words) => {
                let per_arg = num_results.div_ceil(64);
                if words.len() != num_args * per_arg {
                    return None;
                }
                for j in 0..num_args {
                    for i in 0..num_results {
                        if words[j * per_arg + i / 64] >> (i % 64) & 1 == 1 {
                            pattern.push(i, j);
                        }
                    }
                }
            }
        }
        Some(pattern)
    }
}

/// An atomic function as seen by the optimizer.
pub trait AtomicSparsity: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Forms this function can answer in.
    fn supported(&self) -> &[SparsityKind] {
        &[SparsityKind::Pairs]
    }

    /// Which arguments the selected results depend on.
    ///
    /// `params[j]` is the value of argument `j` when it is a parameter.
    /// Returns `None` when this form cannot be produced.
    fn rev_sparsity(
        &self,
        call_id: usize,
        kind: SparsityKind,
        select_y: &[bool],
        params: &[Option<f64>],
    ) -> Option<SparsityForm>;
}

/// Atomic functions by id.
#[derive(Clone, Default)]
pub struct AtomicRegistry {
    entries: Vec<Option<Arc<dyn AtomicSparsity>>>,
}

impl AtomicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the next free id.
    pub fn register(&mut self, atomic: Arc<dyn AtomicSparsity>) -> AtomicId {
        self.entries.push(Some(atomic));
        AtomicId::from_index(self.entries.len() - 1)
    }

    /// Register under a caller-chosen id, replacing any previous entry.
    pub fn insert(&mut self, id: AtomicId, atomic: Arc<dyn AtomicSparsity>) {
        if self.entries.len() <= id.index() {
            self.entries.resize_with(id.index() + 1, || None);
        }
        self.entries[id.index()] = Some(atomic);
    }

    pub fn get(&self, id: AtomicId) -> Option<&dyn AtomicSparsity> {
        self.entries.get(id.index())?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for AtomicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.as_ref().map(|a| a.name().to_string())))
            .finish()
    }
}

/// Ask `atomic` which arguments influence the selected results, trying its
/// supported forms in preference order.
pub fn dependency_pattern(
    atomic: &dyn AtomicSparsity,
    op: OpId,
    call: &AtomicCall,
    select_y: &[bool],
    params: &[Option<f64>],
) -> Result<SparsityPattern, OptimizeError> {
    let supported = atomic.supported();
    let mut tried = Vec::new();
    for kind in SparsityKind::PREFERENCE {
        if !supported.contains(&kind) {
            continue;
        }
        tried.push(kind);
        let Some(form) = atomic.rev_sparsity(call.call_id, kind, select_y, params) else {
            debug!(name = atomic.name(), ?kind, "atomic sparsity form declined");
            continue;
        };
        let got = form.kind();
        return form
            .into_pattern(call.num_args, call.num_results)
            .ok_or_else(|| OptimizeError::InvalidPattern {
                op,
                name: atomic.name().to_string(),
                kind: got,
            });
    }
    Err(OptimizeError::AtomicSparsity {
        op,
        name: atomic.name().to_string(),
        call_id: call.call_id,
        tried,
    })
}
