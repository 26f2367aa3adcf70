//! Usage, duplicate and conditional-skip analysis of tang tapes.
//!
//! [`analyze`] runs four passes over an immutable [`Tape`](tang_tape::Tape):
//!
//! 1. reverse usage propagation, tracking for every operator the
//!    conditional-expression branches it is needed under,
//! 2. value numbering, linking duplicate computations to their first
//!    occurrence,
//! 3. chain fusion, marking single-use add/sub operators that fold into a
//!    cumulative sum,
//! 4. the conditional-skip table.
//!
//! The result is a set of annotations; rewriting the tape is left to the
//! caller.
//!
//! ```
//! use tang_opt::{analyze, AtomicRegistry, OptimizeOptions, Usage};
//! use tang_tape::{TapeBuilder, UnaryOp};
//!
//! let mut b = TapeBuilder::new();
//! let x = b.independent();
//! let unused = b.unary(UnaryOp::Sin, x);
//! let y = b.unary(UnaryOp::Exp, x);
//! let tape = b.finish(&[y.into()]).unwrap();
//!
//! let analysis = analyze(&tape, &AtomicRegistry::new(), &OptimizeOptions::default()).unwrap();
//! let sin = analysis.producer(unused).unwrap();
//! assert_eq!(analysis.usage(sin), Usage::Unused);
//! ```

pub mod analyzer;
pub mod arrays;
pub mod atomic;
pub mod branch;
pub mod chain;
pub mod error;
pub mod options;
pub mod producer;
pub mod reverse;
pub mod skip;
pub mod usage;
pub mod value_numbering;

pub use analyzer::{analyze, Analysis, AnalysisPass, AnalysisStats, Analyzer, Pipeline};
pub use arrays::ArrayLiveness;
pub use atomic::{
    dependency_pattern, AtomicRegistry, AtomicSparsity, SparsityForm, SparsityKind,
    SparsityPattern,
};
pub use branch::{BranchSets, Condition};
pub use chain::{chain_terms, ChainFusion};
pub use error::{OptimizeError, OptionsError};
pub use options::{OptimizeOptions, DEFAULT_HASH_TABLE_SIZE};
pub use producer::{CallBlock, ProducerMap};
pub use reverse::UsagePropagation;
pub use skip::{CexpInfo, SkipEntry, SkipTable};
pub use usage::Usage;
pub use value_numbering::ValueNumbering;
