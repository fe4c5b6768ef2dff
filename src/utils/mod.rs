//! Small shared helpers.

mod bitset;
mod duration;

pub use bitset::{BitSet, BitSetIter};
pub use duration::{format_duration, parse_duration};

pub(crate) use duration::text;
