//! Index build path: arena-backed posting accumulation, shard workers,
//! and on-disk serialization

pub mod arena;
pub mod builder;
pub mod posting_list;
pub mod types;
pub mod writer;

pub use builder::{BuiltIndex, DocumentInput, IndexBuilder};
pub use types::{DocFilePair, DocId, Posting, TermPostings};
pub use writer::IndexWriter;
