//! Row descriptors used to derive component input requirements.

use std::fmt;

/// Identifies the logical meaning of one matrix row: sequence `n`, time `t`
/// and an extra index `x`. The physical row position is separate from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Index {
    pub n: i32,
    pub t: i32,
    pub x: i32,
}

impl Index {
    pub fn new(n: i32, t: i32, x: i32) -> Self {
        Self { n, t, x }
    }

    /// The same index shifted by `offset` frames, or `None` if `t` would
    /// leave the `i32` range.
    pub fn with_time_offset(self, offset: i32) -> Option<Self> {
        let t = self.t.checked_add(offset)?;
        Some(Self { t, ..self })
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.n, self.t, self.x)
    }
}

/// Computation-wide context passed to index derivation.
///
/// Carries information the framework cannot express per row; no component
/// here needs any yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiscComputationInfo {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_offset_keeps_other_fields() {
        let idx = Index::new(2, 10, 1).with_time_offset(-3).unwrap();
        assert_eq!(idx, Index::new(2, 7, 1));
        assert_eq!(idx.to_string(), "(2,7,1)");
    }

    #[test]
    fn test_time_offset_overflow_is_none() {
        assert_eq!(Index::new(0, i32::MAX, 0).with_time_offset(1), None);
        assert_eq!(Index::new(0, i32::MIN, 0).with_time_offset(-1), None);
        assert_eq!(
            Index::new(0, i32::MAX, 0).with_time_offset(-1),
            Some(Index::new(0, i32::MAX - 1, 0))
        );
    }

    #[test]
    fn test_ordering_is_n_then_t_then_x() {
        let mut v = vec![Index::new(1, 0, 0), Index::new(0, 5, 0), Index::new(0, 1, 2)];
        v.sort();
        assert_eq!(v, vec![Index::new(0, 1, 2), Index::new(0, 5, 0), Index::new(1, 0, 0)]);
    }
}
