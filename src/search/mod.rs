//! Query path: term location, lazy candidate accumulation, boolean
//! matching, and proximity re-ranking

pub mod filemap;
pub mod fingerprint;
pub mod matcher;
pub mod positions;
pub mod stub;
pub mod topdocs;

pub use filemap::FileMap;
pub use fingerprint::TermFingerprint;
pub use matcher::{and, and_streaming, backup_or, or, MatchLimits, MatchList};
pub use positions::{rerank_by_positions, RankedDoc, RankedDocs};
pub use stub::{StubIndex, TermLocation};
pub use topdocs::{ScoredDoc, TopDocs, TOP_K_RESULTS};
