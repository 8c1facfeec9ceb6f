//! Core types shared by the build and query paths

use serde::{Deserialize, Serialize};

use crate::codec::tiers::DocumentFrequency;

/// Document identifier, unique within one published index.
pub type DocId = u32;

/// One occurrence of a term: the containing document and the byte offset of
/// the token's start in the source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Posting {
    pub document_id: DocId,
    pub position: u32,
}

impl Posting {
    pub fn new(document_id: DocId, position: u32) -> Self {
        Self {
            document_id,
            position,
        }
    }
}

/// A term key with every posting that mentions it, sorted by
/// (document id, position).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermPostings {
    pub key: String,
    pub postings: Vec<Posting>,
}

impl TermPostings {
    pub fn new(key: String, postings: Vec<Posting>) -> Self {
        Self { key, postings }
    }

    /// Derive the per-document frequency list: one entry per distinct
    /// document id, counting the term's occurrences there.
    pub fn frequencies(&self) -> Vec<DocumentFrequency> {
        let mut out: Vec<DocumentFrequency> = Vec::new();
        for posting in &self.postings {
            match out.last_mut() {
                Some(last) if last.document_id == posting.document_id => last.frequency += 1,
                _ => out.push(DocumentFrequency::new(posting.document_id, 1)),
            }
        }
        out
    }
}

/// Mapping from a document id to the file it was ingested from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocFilePair {
    pub document_id: DocId,
    pub file_name: String,
}

impl DocFilePair {
    pub fn new(document_id: DocId, file_name: impl Into<String>) -> Self {
        Self {
            document_id,
            file_name: file_name.into(),
        }
    }
}
