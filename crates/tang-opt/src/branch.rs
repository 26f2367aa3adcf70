//! Per-operator branch memberships.

use serde::{Deserialize, Serialize};
use tang_tape::{CexpId, OpId};

/// "Needed only when conditional expression `cexp` evaluates to `outcome`."
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub cexp: CexpId,
    pub outcome: bool,
}

/// One sorted condition set per operator.
///
/// An inactive collection holds no sets at all; every query then answers
/// with the empty set and every update is a no-op.
#[derive(Clone, Debug, Default)]
pub struct BranchSets {
    sets: Vec<Vec<Condition>>,
}

impl BranchSets {
    pub fn inactive() -> Self {
        Self { sets: Vec::new() }
    }

    pub fn new(num_op: usize) -> Self {
        Self {
            sets: vec![Vec::new(); num_op],
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.sets.is_empty()
    }

    #[inline]
    pub fn get(&self, op: OpId) -> &[Condition] {
        self.sets.get(op.index()).map_or(&[], Vec::as_slice)
    }

    /// `set[dst] = conditions`.
    pub fn assign(&mut self, dst: OpId, conditions: &[Condition]) {
        if let Some(set) = self.sets.get_mut(dst.index()) {
            set.clear();
            set.extend_from_slice(conditions);
        }
    }

    /// `set[dst] = set[dst] ∩ conditions`.
    pub fn intersect(&mut self, dst: OpId, conditions: &[Condition]) {
        if let Some(set) = self.sets.get_mut(dst.index()) {
            set.retain(|c| conditions.binary_search(c).is_ok());
        }
    }

    /// `set[dst] = set[src]`.
    pub fn copy(&mut self, dst: OpId, src: OpId) {
        if !self.is_active() || dst == src {
            return;
        }
        let source = std::mem::take(&mut self.sets[src.index()]);
        self.assign(dst, &source);
        self.sets[src.index()] = source;
    }

    /// `set[dst] = set[dst] ∩ set[src]`.
    pub fn intersect_with(&mut self, dst: OpId, src: OpId) {
        if !self.is_active() || dst == src {
            return;
        }
        let source = std::mem::take(&mut self.sets[src.index()]);
        self.intersect(dst, &source);
        self.sets[src.index()] = source;
    }

    /// `set[op]` extended by one condition, as a fresh sorted vector.
    pub fn with(&self, op: OpId, extra: Condition) -> Vec<Condition> {
        let mut set = self.get(op).to_vec();
        if let Err(pos) = set.binary_search(&extra) {
            set.insert(pos, extra);
        }
        set
    }

    pub fn clear(&mut self, op: OpId) {
        if let Some(set) = self.sets.get_mut(op.index()) {
            set.clear();
        }
    }

    pub fn into_inner(self) -> Vec<Vec<Condition>> {
        self.sets
    }
}
