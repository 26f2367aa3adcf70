//! Usage lattice.

use serde::{Deserialize, Serialize};

/// How many times an operator's result is consumed.
///
/// The reverse pass only ever moves a level up `Unused -> Once -> Many`.
/// `Fused` is written afterwards by chain fusion, only from `Once`, and is
/// terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Usage {
    #[default]
    Unused,
    Once,
    Many,
    /// Folded into the cumulative sum of its single consumer.
    Fused,
}

impl Usage {
    /// One more consumer.
    #[inline]
    pub fn promote(self) -> Self {
        match self {
            Self::Unused => Self::Once,
            Self::Once | Self::Many => Self::Many,
            Self::Fused => {
                debug_assert!(false, "fused operator promoted");
                Self::Fused
            }
        }
    }

    /// Least upper bound of two levels on the promotion chain.
    #[inline]
    pub fn join(self, other: Self) -> Self {
        match (self, other) {
            (Self::Fused, _) | (_, Self::Fused) => Self::Fused,
            (Self::Many, _) | (_, Self::Many) => Self::Many,
            (Self::Once, _) | (_, Self::Once) => Self::Once,
            _ => Self::Unused,
        }
    }

    #[inline]
    pub fn is_used(self) -> bool {
        self != Self::Unused
    }

    /// Rank on the promotion chain, for monotonicity checks.
    #[inline]
    pub fn rank(self) -> u8 {
        match self {
            Self::Unused => 0,
            Self::Once => 1,
            Self::Many => 2,
            Self::Fused => 3,
        }
    }
}
