// ============================================================
// Layer 4 — Batcher
// ============================================================
// Slices an ordered sequence of records into fixed-size groups
// for the engine. Every batch except possibly the last holds
// exactly `size` items; concatenating the batches gives back
// the input unchanged.
//
//   records: [r0 r1 r2 r3 r4]   size = 2
//   batches: [r0 r1] [r2 r3] [r4]
//
// Batches borrow from the input slice, so nothing is copied
// until the engine stacks one batch into tensors.

use std::num::NonZeroUsize;
use std::slice::Chunks;

use crate::domain::error::{Result, StanceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batcher {
    size: NonZeroUsize,
}

impl Batcher {
    /// Create a batcher. A size of zero is a configuration error.
    pub fn new(size: usize) -> Result<Self> {
        NonZeroUsize::new(size)
            .map(|size| Self { size })
            .ok_or_else(|| StanceError::config("batch size must be a positive integer"))
    }

    /// Lazily split `records` into ordered batches.
    pub fn batch<'a, T>(&self, records: &'a [T]) -> Chunks<'a, T> {
        records.chunks(self.size.get())
    }

    /// How many batches `len` records produce.
    pub fn batch_count(&self, len: usize) -> usize {
        len.div_ceil(self.size.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_is_configuration_error() {
        assert!(matches!(Batcher::new(0), Err(StanceError::Configuration(_))));
    }

    #[test]
    fn test_flatten_reproduces_input() {
        let input: Vec<u32> = (0..13).collect();
        for size in [1, input.len(), input.len() + 5, 4] {
            let batcher = Batcher::new(size).unwrap();
            let batches: Vec<&[u32]> = batcher.batch(&input).collect();
            assert_eq!(batches.len(), batcher.batch_count(input.len()));
            assert_eq!(batches.len(), input.len().div_ceil(size));
            let flat: Vec<u32> = batches.concat();
            assert_eq!(flat, input);
        }
    }

    #[test]
    fn test_only_last_batch_is_partial() {
        let input: Vec<u32> = (0..10).collect();
        let batches: Vec<&[u32]> = Batcher::new(4).unwrap().batch(&input).collect();
        assert_eq!(batches.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![4, 4, 2]);
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        let input: Vec<u32> = Vec::new();
        assert_eq!(Batcher::new(8).unwrap().batch(&input).count(), 0);
    }
}
