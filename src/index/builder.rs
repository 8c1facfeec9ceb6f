//! Parallel index build across a fixed pool of worker shards
//!
//! Documents are fanned out over a bounded channel to worker threads, each
//! of which accumulates an independent shard. Every shard sorts its own
//! output exactly once; the reduction step then folds the sorted shards
//! together with linear merges.

use crossbeam::channel;
use tracing::{debug, info};

use crate::config::IndexConfig;
use crate::error::Result;
use crate::index::posting_list::{PostingListBuilder, ShardIndex};
use crate::index::types::{DocFilePair, DocId, TermPostings};
use crate::tokenizer::Tokenizer;

/// Depth of the document feed channel; producers block once this many
/// documents are waiting.
const FEED_DEPTH: usize = 2_000;

/// One document handed to the builder.
#[derive(Clone, Debug)]
pub struct DocumentInput {
    pub document_id: DocId,
    pub file_name: String,
    pub text: String,
}

impl DocumentInput {
    pub fn new(document_id: DocId, file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            document_id,
            file_name: file_name.into(),
            text: text.into(),
        }
    }
}

/// A fully built, still in-memory index, ready for serialization.
#[derive(Debug, Default)]
pub struct BuiltIndex {
    pub entries: Vec<TermPostings>,
    pub filemap: Vec<DocFilePair>,
}

impl BuiltIndex {
    pub fn term_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds an in-memory index from raw documents.
pub struct IndexBuilder<'a> {
    config: &'a IndexConfig,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(config: &'a IndexConfig) -> Self {
        Self { config }
    }

    /// Tokenize and accumulate every document, returning the merged,
    /// globally sorted index plus the docid -> filename map.
    pub fn build(&self, documents: Vec<DocumentInput>) -> Result<BuiltIndex> {
        let shards = self.config.worker_shards.max(1);
        info!(documents = documents.len(), shards, "starting index build");

        let mut filemap: Vec<DocFilePair> = documents
            .iter()
            .map(|d| DocFilePair::new(d.document_id, d.file_name.clone()))
            .collect();
        filemap.sort_by_key(|p| p.document_id);

        let (tx, rx) = channel::bounded::<DocumentInput>(FEED_DEPTH);

        let merged = std::thread::scope(|scope| {
            let mut workers = Vec::with_capacity(shards);
            for shard_id in 0..shards {
                let rx = rx.clone();
                let tokenizer = Tokenizer::new(&self.config.tokenizer);
                workers.push(scope.spawn(move || {
                    let mut builder = PostingListBuilder::new();
                    let mut processed = 0usize;
                    for doc in rx.iter() {
                        let terms = tokenizer.index_document(&doc.text);
                        builder.add_document(doc.document_id, terms);
                        processed += 1;
                    }
                    debug!(shard_id, processed, "shard finished tokenizing");
                    builder.finish()
                }));
            }
            drop(rx);

            for doc in documents {
                // Workers only disappear on panic; surface that as a panic
                // here too rather than losing documents silently.
                tx.send(doc).expect("index build worker pool died");
            }
            drop(tx);

            workers
                .into_iter()
                .map(|w| w.join().expect("index build worker panicked"))
                .fold(ShardIndex::default(), ShardIndex::merge)
        });

        info!(terms = merged.term_count(), "index build complete");
        Ok(BuiltIndex {
            entries: merged.into_entries(),
            filemap,
        })
    }
}
