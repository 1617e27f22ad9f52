//! Growable flat array of structured elements living in accelerator memory.
//!
//! Kernels that consume it walk the elements as one contiguous list, which is
//! why sparse data is flattened into it rather than kept as per-row lists.

/// Device-resident array. Copies are always deep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceArray<T: Clone> {
    data: Vec<T>,
}

impl<T: Clone> DeviceArray<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: Clone> FromIterator<T> for DeviceArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().collect(),
        }
    }
}
