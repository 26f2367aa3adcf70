//! Per-run analysis context and the pass pipeline.

use serde::Serialize;
use tang_tape::{Op, OpId, Operand, Tape, VarId};
use tracing::{debug, info, trace};

use crate::arrays::ArrayLiveness;
use crate::atomic::AtomicRegistry;
use crate::branch::{BranchSets, Condition};
use crate::chain::ChainFusion;
use crate::error::OptimizeError;
use crate::options::OptimizeOptions;
use crate::producer::{CallBlock, ProducerMap};
use crate::reverse::UsagePropagation;
use crate::skip::{CexpInfo, SkipTable};
use crate::usage::Usage;
use crate::value_numbering::ValueNumbering;

/// All scratch state of one analysis run over one tape.
///
/// Passes receive it by mutable reference. Nothing here outlives the run or
/// is shared between runs.
pub struct Analyzer<'a> {
    pub(crate) tape: &'a Tape,
    pub(crate) atomics: &'a AtomicRegistry,
    pub(crate) options: &'a OptimizeOptions,
    pub(crate) producers: ProducerMap,
    pub(crate) usage: Vec<Usage>,
    pub(crate) conditions: BranchSets,
    pub(crate) arrays: ArrayLiveness,
    pub(crate) previous: Vec<Option<OpId>>,
    pub(crate) cexps: Vec<CexpInfo>,
}

impl<'a> Analyzer<'a> {
    /// Scan the tape and seed the roots: sentinels, independents and the
    /// producers of dependents start out used many times.
    pub fn new(tape: &'a Tape, atomics: &'a AtomicRegistry, options: &'a OptimizeOptions) -> Self {
        let num_op = tape.len();
        let producers = ProducerMap::scan(tape);
        let conditions = if options.conditional_skip && !producers.cexps().is_empty() {
            BranchSets::new(num_op)
        } else {
            BranchSets::inactive()
        };

        let mut usage = vec![Usage::Unused; num_op];
        for (i, op) in tape.ops().iter().enumerate() {
            if matches!(op, Op::Begin | Op::End | Op::Independent) {
                usage[i] = Usage::Many;
            }
        }
        for &dep in tape.dependents() {
            if let Some(op) = producers.producer(dep) {
                usage[op.index()] = Usage::Many;
            }
        }

        debug!(
            num_op,
            num_var = tape.num_var(),
            num_cexp = producers.cexps().len(),
            num_call = producers.calls().len(),
            tracking = conditions.is_active(),
            "analyzer initialized"
        );

        Self {
            tape,
            atomics,
            options,
            producers,
            usage,
            conditions,
            arrays: ArrayLiveness::new(tape.arrays().len()),
            previous: vec![None; num_op],
            cexps: Vec::new(),
        }
    }

    pub fn tape(&self) -> &'a Tape {
        self.tape
    }

    pub fn options(&self) -> &OptimizeOptions {
        self.options
    }

    pub fn producers(&self) -> &ProducerMap {
        &self.producers
    }

    pub fn usage(&self, op: OpId) -> Usage {
        self.usage[op.index()]
    }

    pub fn conditions(&self, op: OpId) -> &[Condition] {
        self.conditions.get(op)
    }

    pub fn previous(&self, op: OpId) -> Option<OpId> {
        self.previous[op.index()]
    }

    /// `parent` consumes the result of `arg`: one more use, and `arg` is
    /// needed at most under the conditions `parent` is needed under.
    pub(crate) fn parent2arg(&mut self, parent: OpId, arg: OpId) {
        let before = self.bump(arg);
        if !self.conditions.is_active() {
            return;
        }
        if before == Usage::Unused {
            self.conditions.copy(arg, parent);
        } else {
            self.conditions.intersect_with(arg, parent);
        }
    }

    /// As [`parent2arg`](Self::parent2arg) with an explicit parent set.
    pub(crate) fn parent_set2arg(&mut self, parent_set: &[Condition], arg: OpId) {
        let before = self.bump(arg);
        if !self.conditions.is_active() {
            return;
        }
        if before == Usage::Unused {
            self.conditions.assign(arg, parent_set);
        } else {
            self.conditions.intersect(arg, parent_set);
        }
    }

    fn bump(&mut self, op: OpId) -> Usage {
        let slot = &mut self.usage[op.index()];
        let before = *slot;
        *slot = before.promote();
        trace!(%op, ?before, after = ?*slot, "promoted");
        before
    }

    /// Producing operator of a variable operand.
    #[inline]
    pub(crate) fn producer_of(&self, x: Operand) -> Option<OpId> {
        x.var().and_then(|v| self.producers.producer(v))
    }

    /// Equivalence representative of the operator producing `var`.
    pub(crate) fn representative(&self, var: VarId) -> Option<OpId> {
        let op = self.producers.producer(var)?;
        Some(self.previous[op.index()].unwrap_or(op))
    }

    /// Freeze the annotations.
    pub fn finish(self) -> Analysis {
        let stats = AnalysisStats {
            num_op: self.tape.len(),
            unused: self.usage.iter().filter(|u| !u.is_used()).count(),
            matched: self.previous.iter().flatten().count(),
            fused: self.usage.iter().filter(|&&u| u == Usage::Fused).count(),
            skip_entries: self
                .cexps
                .iter()
                .map(|c| c.skip_on_true.len() + c.skip_on_false.len())
                .sum(),
            live_arrays: self.arrays.count_live(),
        };
        Analysis {
            calls: self.producers.calls().to_vec(),
            var2op: self.producers.into_var2op(),
            usage: self.usage,
            previous: self.previous,
            array_live: self.arrays.into_inner(),
            conditions: self.conditions.into_inner(),
            cexps: self.cexps,
            stats,
        }
    }
}

/// A single analysis pass.
pub trait AnalysisPass {
    /// Name of this pass (for logging).
    fn name(&self) -> &str;

    fn run(&self, cx: &mut Analyzer<'_>) -> Result<(), OptimizeError>;
}

/// Ordered list of passes.
pub struct Pipeline {
    passes: Vec<Box<dyn AnalysisPass>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    /// Usage propagation, value numbering, chain fusion, skip table.
    ///
    /// Each pass reads the usage levels finalized by the ones before it.
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        pipeline.add(UsagePropagation);
        pipeline.add(ValueNumbering);
        pipeline.add(ChainFusion);
        pipeline.add(SkipTable);
        pipeline
    }

    pub fn add(&mut self, pass: impl AnalysisPass + 'static) {
        self.passes.push(Box::new(pass));
    }

    pub fn run(&self, cx: &mut Analyzer<'_>) -> Result<(), OptimizeError> {
        for pass in &self.passes {
            debug!(pass = pass.name(), "running pass");
            pass.run(cx)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

/// Counters for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisStats {
    pub num_op: usize,
    pub unused: usize,
    pub matched: usize,
    pub fused: usize,
    pub skip_entries: usize,
    pub live_arrays: usize,
}

/// Everything a rewriter needs, indexed by operator (or variable for
/// `var2op`).
#[derive(Clone, Debug, Serialize)]
pub struct Analysis {
    pub var2op: Vec<Option<OpId>>,
    pub usage: Vec<Usage>,
    /// Earlier operator computing the same value.
    pub previous: Vec<Option<OpId>>,
    pub array_live: Vec<bool>,
    /// Branch memberships; empty when not tracked.
    pub conditions: Vec<Vec<Condition>>,
    pub cexps: Vec<CexpInfo>,
    pub calls: Vec<CallBlock>,
    pub stats: AnalysisStats,
}

impl Analysis {
    #[inline]
    pub fn usage(&self, op: OpId) -> Usage {
        self.usage[op.index()]
    }

    #[inline]
    pub fn previous(&self, op: OpId) -> Option<OpId> {
        self.previous[op.index()]
    }

    #[inline]
    pub fn producer(&self, var: VarId) -> Option<OpId> {
        self.var2op.get(var.index()).copied().flatten()
    }

    /// Producing operator of a variable operand.
    pub fn producer_of(&self, x: Operand) -> Option<OpId> {
        x.var().and_then(|v| self.producer(v))
    }

    pub fn conditions(&self, op: OpId) -> &[Condition] {
        self.conditions.get(op.index()).map_or(&[], Vec::as_slice)
    }
}

/// Run the standard pipeline over `tape`.
///
/// Either every annotation is produced or the run fails; a failing atomic
/// function aborts the whole tape.
pub fn analyze(
    tape: &Tape,
    atomics: &AtomicRegistry,
    options: &OptimizeOptions,
) -> Result<Analysis, OptimizeError> {
    let mut cx = Analyzer::new(tape, atomics, options);
    Pipeline::standard().run(&mut cx)?;
    let analysis = cx.finish();
    let s = &analysis.stats;
    info!(
        num_op = s.num_op,
        unused = s.unused,
        matched = s.matched,
        fused = s.fused,
        skip_entries = s.skip_entries,
        live_arrays = s.live_arrays,
        "tape analyzed"
    );
    Ok(analysis)
}
