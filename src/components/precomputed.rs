//! Per-computation index metadata for non-simple components.

use std::any::Any;
use std::fmt::Debug;

/// Metadata a non-simple component derives once for a given pair of input and
/// output index lists, then consumes in `propagate` and `backprop`.
///
/// The object belongs to the caller for one propagate/backprop cycle and is
/// only valid for the row layout it was built from. Components check the row
/// counts below before trusting the contents.
pub trait ComponentPrecomputedIndexes: Any + Send + Sync + Debug {
    /// Number of input rows the metadata was built for.
    fn num_input_rows(&self) -> usize;

    /// Number of output rows the metadata was built for.
    fn num_output_rows(&self) -> usize;

    /// Downcast hook for the owning component type.
    fn as_any(&self) -> &dyn Any;
}
