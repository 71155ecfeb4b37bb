//! src/common.rs

/// Monotonic counter for compiler-generated names (temporaries, labels).
///
/// IR lowering resets one of these per function so that temp and label
/// numbering restarts at zero in every function.
pub struct UniqueIdGenerator {
    counter: usize,
}

impl UniqueIdGenerator {
    pub fn new() -> Self {
        UniqueIdGenerator { counter: 0 }
    }

    /// Returns the next id and advances the counter.
    pub fn next(&mut self) -> usize {
        let id = self.counter;
        self.counter += 1;
        id
    }

    /// Restarts numbering at zero.
    pub fn reset(&mut self) {
        self.counter = 0;
    }
}

impl Default for UniqueIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
