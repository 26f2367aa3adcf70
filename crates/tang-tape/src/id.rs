//! Index handles into a tape.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Create a handle from a raw index.
            #[inline]
            pub fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            /// The raw index.
            #[inline]
            pub fn index(&self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

handle!(
    /// Variable index. Variable 0 is the phantom result of `Begin`.
    VarId,
    "v"
);
handle!(
    /// Operator index (position in the tape).
    OpId,
    "op"
);
handle!(
    /// Index into the tape's parameter table.
    ParId,
    "p"
);
handle!(
    /// Index of a dynamically indexed array object.
    ArrayId,
    "arr"
);
handle!(
    /// Index of an atomic (opaque) function in an atomic registry.
    AtomicId,
    "atom"
);
handle!(
    /// Rank of a conditional expression among all conditional expressions
    /// of a tape, in tape order.
    CexpId,
    "cexp"
);

impl VarId {
    /// The phantom variable owned by the begin sentinel.
    pub const PHANTOM: Self = Self(0);
}

/// An operator argument: either a parameter or a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Par(ParId),
    Var(VarId),
}

impl Operand {
    /// The variable, if this operand is one.
    #[inline]
    pub fn var(&self) -> Option<VarId> {
        match self {
            Self::Var(v) => Some(*v),
            Self::Par(_) => None,
        }
    }

    #[inline]
    pub fn is_var(&self) -> bool {
        matches!(self, Self::Var(_))
    }
}

impl From<VarId> for Operand {
    fn from(v: VarId) -> Self {
        Self::Var(v)
    }
}

impl From<ParId> for Operand {
    fn from(p: ParId) -> Self {
        Self::Par(p)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Par(p) => write!(f, "{p}"),
            Self::Var(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_print_with_prefix() {
        assert_eq!(format!("{:?}", VarId::from_index(3)), "v3");
        assert_eq!(OpId::from_index(12).to_string(), "op12");
        assert_eq!(Operand::Par(ParId(0)).to_string(), "p0");
    }

    #[test]
    fn operand_var() {
        let v = VarId::from_index(4);
        assert_eq!(Operand::from(v).var(), Some(v));
        assert_eq!(Operand::from(ParId(1)).var(), None);
        assert!(!Operand::Par(ParId(1)).is_var());
    }
}
