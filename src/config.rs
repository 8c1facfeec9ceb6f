use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Index configuration: where published files live and how builds and
/// queries are bounded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding published index files
    pub index_dir: PathBuf,
    /// Number of worker shards used during index build
    pub worker_shards: usize,
    /// One stub entry is kept per this many terms
    pub stub_interval: usize,
    /// Cap on candidate documents accumulated for a single term
    pub max_results_per_term: usize,
    /// Cap on confirmed AND/OR results; exceeding it truncates the result set
    pub max_boolean_results: usize,
    pub tokenizer: TokenizerConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./indices"),
            worker_shards: num_cpus::get(),
            stub_interval: 32,
            max_results_per_term: 100_000,
            max_boolean_results: 10_000,
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl IndexConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_worker_shards(mut self, shards: usize) -> Self {
        self.worker_shards = shards.max(1);
        self
    }

    pub fn with_stub_interval(mut self, interval: usize) -> Self {
        self.stub_interval = interval.max(1);
        self
    }

    /// Path of the terms file for a published suffix
    pub fn terms_path(&self, suffix: &str) -> PathBuf {
        self.index_dir.join(format!("terms-{suffix}"))
    }

    /// Path of the frequencies file for a published suffix
    pub fn frequencies_path(&self, suffix: &str) -> PathBuf {
        self.index_dir.join(format!("frequencies-{suffix}"))
    }

    /// Path of the positions file for a published suffix
    pub fn positions_path(&self, suffix: &str) -> PathBuf {
        self.index_dir.join(format!("positions-{suffix}"))
    }

    /// Path of the docid -> filename map for a published suffix
    pub fn filemap_path(&self, suffix: &str) -> PathBuf {
        self.index_dir.join(format!("filemap-{suffix}"))
    }

    /// Registry file listing every published suffix, one per line
    pub fn registry_path(&self) -> PathBuf {
        self.index_dir.join("index_files")
    }
}

/// Tokenizer configuration
///
/// Normalization is fixed (ASCII uppercase, non-alphabetic characters
/// stripped) because the term fingerprint ordering depends on it; only
/// filtering behavior is configurable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Tokens shorter than this are not indexed
    pub min_token_len: usize,
    /// Drop common English stop words at index time
    pub filter_stop_words: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_token_len: 3,
            filter_stop_words: false,
        }
    }
}
