//! On-disk encodings: varints, frequency tiers, and position streams

pub mod positions;
pub mod tiers;
pub mod varint;

pub use positions::{fill_positions_from_docs, read_positions_all, write_positions};
pub use tiers::{DocumentFrequency, Tier, TierIterator, TIER_SIZE};
pub use varint::{read_str, read_vnum, read_vnum_u32, write_str, write_vnum, write_vnum_fixed};
