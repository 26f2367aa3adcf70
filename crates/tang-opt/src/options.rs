//! Analysis configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

/// Default number of value-numbering table slots (prime).
pub const DEFAULT_HASH_TABLE_SIZE: usize = 10_007;

/// Switches for the individual analyses.
///
/// Deserializes from partial documents; missing fields keep their defaults.
/// The classic option string is also accepted via `FromStr`:
///
/// ```
/// use tang_opt::OptimizeOptions;
///
/// let opts: OptimizeOptions = "no_conditional_skip hash_table_size=97".parse().unwrap();
/// assert!(!opts.conditional_skip);
/// assert_eq!(opts.hash_table_size, 97);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    /// Track branch memberships and build the conditional-skip table.
    pub conditional_skip: bool,
    /// Comparison operators keep their operands alive.
    pub compare_op: bool,
    /// Mark single-use add/sub operators for folding into cumulative sums.
    pub cumulative_sum: bool,
    /// Link duplicate computations to their first occurrence.
    pub value_numbering: bool,
    /// Slots in the value-numbering table.
    pub hash_table_size: usize,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            conditional_skip: true,
            compare_op: true,
            cumulative_sum: true,
            value_numbering: true,
            hash_table_size: DEFAULT_HASH_TABLE_SIZE,
        }
    }
}

impl OptimizeOptions {
    pub fn conditional_skip(mut self, on: bool) -> Self {
        self.conditional_skip = on;
        self
    }

    pub fn compare_op(mut self, on: bool) -> Self {
        self.compare_op = on;
        self
    }

    pub fn cumulative_sum(mut self, on: bool) -> Self {
        self.cumulative_sum = on;
        self
    }

    pub fn value_numbering(mut self, on: bool) -> Self {
        self.value_numbering = on;
        self
    }

    pub fn hash_table_size(mut self, slots: usize) -> Self {
        self.hash_table_size = slots;
        self
    }
}

impl FromStr for OptimizeOptions {
    type Err = OptionsError;

    /// Whitespace-separated words; each one turns a default off or sets a value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut opts = Self::default();
        for word in s.split_whitespace() {
            match word.split_once('=') {
                Some(("hash_table_size", value)) => {
                    opts.hash_table_size = match value.parse() {
                        Ok(n) if n > 0 => n,
                        _ => {
                            return Err(OptionsError::InvalidValue {
                                key: "hash_table_size".into(),
                                value: value.into(),
                            })
                        }
                    };
                }
                Some(_) => return Err(OptionsError::Unknown(word.into())),
                None => match word {
                    "no_conditional_skip" => opts.conditional_skip = false,
                    "no_compare_op" => opts.compare_op = false,
                    "no_cumulative_sum_op" => opts.cumulative_sum = false,
                    "no_value_numbering" => opts.value_numbering = false,
                    _ => return Err(OptionsError::Unknown(word.into())),
                },
            }
        }
        Ok(opts)
    }
}
