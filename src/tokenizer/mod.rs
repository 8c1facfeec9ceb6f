//! Plain text splitting and normalization

mod tokenizer;

pub use tokenizer::{normalize_term, Tokenizer};
