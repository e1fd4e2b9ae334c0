//! Small collections shared by the AST analysis and the NFA generator.

mod bitset;
mod counter;
mod sparse_set;

pub use bitset::BitSet;
pub use counter::ThresholdCounter;
pub use sparse_set::SparseSet;
