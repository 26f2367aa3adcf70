//! Array liveness.

use tang_tape::ArrayId;

/// One flag per array: has a used load from it been seen yet.
///
/// Flags are only ever raised. The reverse pass visits loads before the
/// stores that feed them, so a store into an array that is still dead at the
/// time it is visited can never be observed.
#[derive(Clone, Debug, Default)]
pub struct ArrayLiveness {
    live: Vec<bool>,
}

impl ArrayLiveness {
    pub fn new(num_arrays: usize) -> Self {
        Self {
            live: vec![false; num_arrays],
        }
    }

    /// Raise the flag. Returns `true` if it was not already raised.
    pub fn mark_live(&mut self, array: ArrayId) -> bool {
        !std::mem::replace(&mut self.live[array.index()], true)
    }

    #[inline]
    pub fn is_live(&self, array: ArrayId) -> bool {
        self.live[array.index()]
    }

    pub fn count_live(&self) -> usize {
        self.live.iter().filter(|&&l| l).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.live
    }

    pub fn into_inner(self) -> Vec<bool> {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_only_rise() {
        let mut arrays = ArrayLiveness::new(3);
        let a = ArrayId::from_index(1);
        assert!(!arrays.is_live(a));
        assert!(arrays.mark_live(a));
        assert!(!arrays.mark_live(a));
        assert!(arrays.is_live(a));
        assert_eq!(arrays.count_live(), 1);
        assert_eq!(arrays.into_inner(), vec![false, true, false]);
    }
}
