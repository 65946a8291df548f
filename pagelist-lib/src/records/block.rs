//! Block arithmetic.

/// A fixed-size slice of a query's result set, fetched as one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    /// Zero-based block number.
    pub index: usize,
    /// Records per block.
    pub size: usize,
}

impl Block {
    /// Returns the block containing record `index`.
    pub fn containing(index: usize, size: usize) -> Self {
        Self {
            index: index / size,
            size,
        }
    }

    /// Absolute index of the first record in the block.
    pub fn offset(&self) -> usize {
        self.index * self.size
    }

    /// Absolute index of the record at `position` within the block.
    pub fn absolute(&self, position: usize) -> usize {
        self.offset() + position
    }
}
