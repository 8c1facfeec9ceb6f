//! murex — a batch-built, read-mostly full-text search index
//!
//! An index is published as three parallel files (terms, frequencies,
//! positions) plus a docid -> filename map, written once and never
//! mutated. Queries locate terms through a sparse in-memory stub, pull
//! frequency tiers lazily (highest-frequency documents first), combine
//! terms with boolean AND/OR, and re-rank survivors by term proximity.
//!
//! ```no_run
//! use murex::{build_index, DocumentInput, Index, IndexConfig, SearchMode};
//!
//! let config = IndexConfig::new("./indices");
//! let suffix = build_index(
//!     &config,
//!     vec![
//!         DocumentInput::new(1, "a.txt", "the quick fox"),
//!         DocumentInput::new(2, "b.txt", "the slow fox"),
//!     ],
//! )?;
//!
//! let index = Index::open(&config, &suffix)?;
//! let results = index.search(&["QUICK", "FOX"], SearchMode::And, 10)?;
//! for doc in &results.docs {
//!     println!("{}: {:?}", doc.score, index.resolve_filename(doc.document_id));
//! }
//! # Ok::<(), murex::MurexError>(())
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod search;
pub mod tokenizer;

use std::fs::File;
use std::io::BufReader;

use tracing::debug;

pub use config::{IndexConfig, TokenizerConfig};
pub use error::{MurexError, Result};
pub use index::builder::{DocumentInput, IndexBuilder};
pub use index::types::{DocId, Posting};
pub use search::{RankedDoc, ScoredDoc};

use index::writer::IndexWriter;
use search::matcher::{self, MatchLimits, MatchList};
use search::positions::{rerank_by_positions, sort_ranked, RankedDocs, MAX_RERANK_TERMS};
use search::stub::StubIndex;
use search::topdocs::TopDocs;
use search::FileMap;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Boolean combination mode for multi-term queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchMode {
    /// Documents must contain every query term.
    And,
    /// Documents may contain any query term.
    Or,
}

/// Ranked query results. `complete` is false when a capacity cap truncated
/// the candidate set, meaning the list is valid but possibly not
/// exhaustive.
#[derive(Clone, Debug, Default)]
pub struct SearchResults {
    pub docs: Vec<RankedDoc>,
    pub complete: bool,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Tokenize, build, and publish an index over `documents`, returning the
/// published suffix.
pub fn build_index(config: &IndexConfig, documents: Vec<DocumentInput>) -> Result<String> {
    let built = IndexBuilder::new(config).build(documents)?;
    IndexWriter::new(config).publish(&built)
}

/// Read-only handle over one published index.
///
/// A handle is single-threaded per query; open as many independent handles
/// as you want parallel queries — the underlying files are immutable.
pub struct Index {
    stub: StubIndex,
    filemap: FileMap,
    limits: MatchLimits,
}

impl Index {
    /// Open a published suffix.
    pub fn open(config: &IndexConfig, suffix: &str) -> Result<Self> {
        let stub = StubIndex::open(config, suffix)?;
        let filemap = FileMap::open(&config.filemap_path(suffix))?;
        Ok(Self {
            stub,
            filemap,
            limits: MatchLimits {
                max_boolean_results: config.max_boolean_results,
            },
        })
    }

    /// Number of distinct terms in the index.
    pub fn term_count(&self) -> u64 {
        self.stub.term_count()
    }

    /// Resolve a document id back to the file it was ingested from.
    pub fn resolve_filename(&self, document_id: DocId) -> Option<&str> {
        self.filemap.resolve(document_id)
    }

    /// Run a boolean query over already-normalized terms, returning up to
    /// `wanted` ranked documents.
    pub fn search(&self, terms: &[&str], mode: SearchMode, wanted: usize) -> Result<SearchResults> {
        if terms.is_empty() || self.stub.is_empty() {
            return Ok(SearchResults {
                docs: Vec::new(),
                complete: true,
            });
        }

        let mut used_fallback = false;
        let matched = match mode {
            SearchMode::And => {
                let mut per_term: Vec<TopDocs<BufReader<File>>> = terms
                    .iter()
                    .map(|t| self.stub.search_one_term(t))
                    .collect::<Result<_>>()?;
                let matched = matcher::and_streaming(&mut per_term, wanted, &self.limits)?;
                if matched.is_empty() && terms.len() > 1 {
                    debug!(?terms, "AND found nothing, falling back to OR");
                    used_fallback = true;
                    self.materialized_or(terms, true)?
                } else {
                    matched
                }
            }
            SearchMode::Or => self.materialized_or(terms, false)?,
        };

        // Fallback results are unions; most candidates lack some term, so
        // proximity scoring would only add noise.
        let rerank_mode = if used_fallback { SearchMode::Or } else { mode };
        let mut ranked = self.rerank(terms, rerank_mode, &matched)?;
        ranked.docs.truncate(wanted);
        Ok(SearchResults {
            docs: ranked.docs,
            complete: ranked.complete,
        })
    }

    /// Union query over fully materialized per-term candidates.
    fn materialized_or(&self, terms: &[&str], backup: bool) -> Result<MatchList> {
        let mut per_term: Vec<TopDocs<BufReader<File>>> = terms
            .iter()
            .map(|t| self.stub.search_one_term(t))
            .collect::<Result<_>>()?;
        for td in per_term.iter_mut() {
            while td.extend_from_tiers()? {}
        }
        Ok(if backup {
            matcher::backup_or(&per_term, &self.limits)
        } else {
            matcher::or(&per_term, &self.limits)
        })
    }

    /// Re-rank AND survivors by term proximity; OR results and wide or
    /// single-term queries just get sorted.
    fn rerank(&self, terms: &[&str], mode: SearchMode, matched: &MatchList) -> Result<RankedDocs> {
        let skip = mode == SearchMode::Or
            || terms.len() < 2
            || terms.len() >= MAX_RERANK_TERMS
            || matched.is_empty();
        if skip {
            let mut docs: Vec<RankedDoc> = matched.docs.iter().map(|&d| d.into()).collect();
            sort_ranked(&mut docs);
            return Ok(RankedDocs {
                docs,
                complete: matched.complete,
            });
        }

        let candidate_ids: Vec<u32> = matched.docs.iter().map(|d| d.document_id).collect();
        let mut term_positions = Vec::with_capacity(terms.len());
        for term in terms {
            let positions = match self.stub.locate(term)? {
                Some(location) => {
                    let freqs = self.stub.read_frequencies(location)?;
                    self.stub.fill_positions(location, &freqs, &candidate_ids)?
                }
                None => Vec::new(),
            };
            term_positions.push((term.to_string(), positions));
        }
        Ok(rerank_by_positions(&term_positions, matched))
    }
}

/// Search several open indexes and merge their rankings.
///
/// Document ids must be distinct across the indexes (they are shards of
/// one corpus); equal scores then interleave deterministically.
pub fn collection_search(
    indexes: &[Index],
    terms: &[&str],
    mode: SearchMode,
    wanted: usize,
) -> Result<SearchResults> {
    let mut joined: Vec<RankedDoc> = Vec::new();
    let mut complete = true;
    for index in indexes {
        let results = index.search(terms, mode, wanted)?;
        complete &= results.complete;
        joined.extend(results.docs);
    }
    sort_ranked(&mut joined);
    joined.truncate(wanted);
    Ok(SearchResults {
        docs: joined,
        complete,
    })
}
