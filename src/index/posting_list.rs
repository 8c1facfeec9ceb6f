//! Per-shard posting accumulation
//!
//! Each build worker owns one `PostingListBuilder`. Documents append raw
//! (term, postings) entries without any ordering work; the expensive global
//! sort happens exactly once, in `finish`, after which shard outputs are
//! merged with linear merges that never re-sort.

use std::collections::HashMap;

use crate::index::arena::{PooledPostings, PostingArena};
use crate::index::types::{DocId, Posting, TermPostings};

/// Accumulates one shard's postings during build.
#[derive(Default)]
pub struct PostingListBuilder {
    arena: PostingArena,
    entries: Vec<(String, PooledPostings)>,
}

impl PostingListBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one document's tokens. `terms` maps each normalized term to
    /// the byte offsets where it occurs.
    pub fn add_document(&mut self, document_id: DocId, terms: HashMap<String, Vec<u32>>) {
        for (key, offsets) in terms {
            let mut pooled = PooledPostings::new(&mut self.arena);
            for offset in offsets {
                pooled.push(&mut self.arena, Posting::new(document_id, offset));
            }
            self.entries.push((key, pooled));
        }
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Sort entries by key, concatenate same-key groups, and sort each
    /// term's postings by (document id, position). Duplicate postings are
    /// dropped.
    pub fn finish(mut self) -> ShardIndex {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut index: Vec<TermPostings> = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            let key = &self.entries[i].0;
            let mut postings = self.entries[i].1.drain_to_vec(&self.arena);
            let mut j = i + 1;
            while j < self.entries.len() && self.entries[j].0 == *key {
                postings.extend(self.entries[j].1.drain_to_vec(&self.arena));
                j += 1;
            }
            postings.sort_unstable();
            postings.dedup();
            index.push(TermPostings::new(key.clone(), postings));
            i = j;
        }

        ShardIndex { entries: index }
    }
}

/// A shard's finished output: terms sorted by key, postings sorted within
/// each term.
#[derive(Debug, Default)]
pub struct ShardIndex {
    entries: Vec<TermPostings>,
}

impl ShardIndex {
    pub fn entries(&self) -> &[TermPostings] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TermPostings> {
        self.entries
    }

    pub fn term_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge two sorted shard outputs. Equal keys merge their posting lists
    /// with a linear sorted merge; neither side is ever re-sorted.
    pub fn merge(self, other: ShardIndex) -> ShardIndex {
        let mut merged = Vec::with_capacity(self.entries.len() + other.entries.len());
        let mut left = self.entries.into_iter().peekable();
        let mut right = other.entries.into_iter().peekable();

        loop {
            match (left.peek(), right.peek()) {
                (Some(a), Some(b)) => match a.key.cmp(&b.key) {
                    std::cmp::Ordering::Less => merged.push(left.next().unwrap()),
                    std::cmp::Ordering::Greater => merged.push(right.next().unwrap()),
                    std::cmp::Ordering::Equal => {
                        let a = left.next().unwrap();
                        let b = right.next().unwrap();
                        merged.push(TermPostings::new(
                            a.key,
                            merge_postings(a.postings, b.postings),
                        ));
                    }
                },
                (Some(_), None) => merged.push(left.next().unwrap()),
                (None, Some(_)) => merged.push(right.next().unwrap()),
                (None, None) => break,
            }
        }
        ShardIndex { entries: merged }
    }
}

fn merge_postings(a: Vec<Posting>, b: Vec<Posting>) -> Vec<Posting> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let mut left = a.into_iter().peekable();
    let mut right = b.into_iter().peekable();
    loop {
        let next = match (left.peek(), right.peek()) {
            (Some(x), Some(y)) => {
                if x <= y {
                    left.next().unwrap()
                } else {
                    right.next().unwrap()
                }
            }
            (Some(_), None) => left.next().unwrap(),
            (None, Some(_)) => right.next().unwrap(),
            (None, None) => break,
        };
        if out.last() != Some(&next) {
            out.push(next);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_terms(pairs: &[(&str, &[u32])]) -> HashMap<String, Vec<u32>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn test_single_document() {
        let mut builder = PostingListBuilder::new();
        builder.add_document(1, doc_terms(&[("FOX", &[10]), ("QUICK", &[4])]));
        let shard = builder.finish();

        assert_eq!(shard.term_count(), 2);
        assert_eq!(shard.entries()[0].key, "FOX");
        assert_eq!(shard.entries()[0].postings, vec![Posting::new(1, 10)]);
        assert_eq!(shard.entries()[1].key, "QUICK");
    }

    #[test]
    fn test_same_term_across_documents_groups() {
        let mut builder = PostingListBuilder::new();
        builder.add_document(2, doc_terms(&[("FOX", &[9])]));
        builder.add_document(1, doc_terms(&[("FOX", &[10, 30])]));
        let shard = builder.finish();

        assert_eq!(shard.term_count(), 1);
        assert_eq!(
            shard.entries()[0].postings,
            vec![Posting::new(1, 10), Posting::new(1, 30), Posting::new(2, 9)]
        );
    }

    #[test]
    fn test_merge_shards() {
        let mut a = PostingListBuilder::new();
        a.add_document(1, doc_terms(&[("APPLE", &[0]), ("FOX", &[5])]));
        let mut b = PostingListBuilder::new();
        b.add_document(2, doc_terms(&[("FOX", &[7]), ("ZEBRA", &[1])]));

        let merged = a.finish().merge(b.finish());
        let keys: Vec<&str> = merged.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["APPLE", "FOX", "ZEBRA"]);
        assert_eq!(
            merged.entries()[1].postings,
            vec![Posting::new(1, 5), Posting::new(2, 7)]
        );
    }

    #[test]
    fn test_merge_dedups_identical_postings() {
        let mut a = PostingListBuilder::new();
        a.add_document(1, doc_terms(&[("FOX", &[5])]));
        let mut b = PostingListBuilder::new();
        b.add_document(1, doc_terms(&[("FOX", &[5])]));

        let merged = a.finish().merge(b.finish());
        assert_eq!(merged.entries()[0].postings, vec![Posting::new(1, 5)]);
    }

    #[test]
    fn test_empty_builder() {
        let shard = PostingListBuilder::new().finish();
        assert!(shard.is_empty());
        let merged = shard.merge(PostingListBuilder::new().finish());
        assert!(merged.is_empty());
    }
}
