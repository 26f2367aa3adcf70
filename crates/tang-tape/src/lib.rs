//! Recorded operation sequences for scalar computations.
//!
//! A [`Tape`] is a linear, replayable list of elementary operators bounded by
//! `Begin` and `End` sentinels. Operators refer to earlier results by
//! [`VarId`] and to constants by [`ParId`]; arrays, comparison records,
//! accumulations and opaque atomic calls are first-class operators.
//!
//! # Quick start
//!
//! ```
//! use tang_tape::{TapeBuilder, UnaryOp};
//!
//! let mut b = TapeBuilder::new();
//! let x = b.independent();
//! let y = b.independent();
//! let s = b.unary(UnaryOp::Sin, x);
//! let z = b.mul(s, y);
//! let tape = b.finish(&[z.into()]).unwrap();
//!
//! assert_eq!(tape.num_independent(), 2);
//! assert_eq!(tape.reverse().count(), tape.len());
//! ```

pub mod builder;
pub mod cursor;
mod display;
pub mod error;
pub mod id;
pub mod op;
pub mod tape;

pub use builder::TapeBuilder;
pub use cursor::{Cursor, OpView};
pub use error::TapeError;
pub use id::{ArrayId, AtomicId, CexpId, OpId, Operand, ParId, VarId};
pub use op::{AtomicCall, BinaryOp, CompareOp, CondExp, CondSkip, CumulativeSum, Op, UnaryOp};
pub use tape::{Tape, VecAd};
