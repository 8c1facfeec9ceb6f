//! Incremental candidate accumulation over tier iterators
//!
//! A `TopDocs` holds a docid-sorted, score-summed candidate list plus the
//! tier iterators still feeding it. Pulling one more tier from every
//! included term costs one bounded read per term, so callers expand the
//! candidate set only as far as a query actually needs.

use std::io::{Read, Seek};

use crate::codec::tiers::{Tier, TierIterator, TIER_SIZE};
use crate::error::Result;
use crate::index::types::DocId;

/// How many top results are fully ordered by `sort_by_frequencies`; the
/// tail beyond this is left unsorted.
pub const TOP_K_RESULTS: usize = 50;

/// A candidate document with its accumulated score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoredDoc {
    pub document_id: DocId,
    pub score: u64,
}

impl ScoredDoc {
    pub fn new(document_id: DocId, score: u64) -> Self {
        Self { document_id, score }
    }
}

struct IncludedTerm<R> {
    term: String,
    weight: u64,
    tiers: Option<TierIterator<R>>,
}

/// Growing candidate list for one or more terms.
pub struct TopDocs<R> {
    docs: Vec<ScoredDoc>,
    included: Vec<IncludedTerm<R>>,
    /// Stop pulling tiers once this many candidates have accumulated.
    term_cap: usize,
    truncated: bool,
}

impl<R: Read + Seek> TopDocs<R> {
    pub fn new() -> Self {
        Self {
            docs: Vec::new(),
            included: Vec::new(),
            term_cap: usize::MAX,
            truncated: false,
        }
    }

    /// Candidate list for a single term. The per-occurrence weight is the
    /// term's character length, so longer (rarer) terms count for more.
    pub fn for_term(term: impl Into<String>, tiers: Option<TierIterator<R>>, term_cap: usize) -> Self {
        let term = term.into();
        let weight = term.chars().count().max(1) as u64;
        Self {
            docs: Vec::new(),
            included: vec![IncludedTerm {
                term,
                weight,
                tiers,
            }],
            term_cap,
            truncated: false,
        }
    }

    /// Pre-scored candidates with no backing iterators (merge results,
    /// tests).
    pub fn from_scored(docs: Vec<ScoredDoc>) -> Self {
        debug_assert!(docs.windows(2).all(|w| w[0].document_id < w[1].document_id));
        Self {
            docs,
            included: Vec::new(),
            term_cap: usize::MAX,
            truncated: false,
        }
    }

    pub fn docs(&self) -> &[ScoredDoc] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Whether the candidate list was cut short by the per-term cap.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// First included term, if any.
    pub fn first_term(&self) -> Option<&str> {
        self.included.first().map(|t| t.term.as_str())
    }

    pub fn included_terms(&self) -> impl Iterator<Item = &str> {
        self.included.iter().map(|t| t.term.as_str())
    }

    /// Whether any included iterator may still produce a tier.
    pub fn has_more_tiers(&self) -> bool {
        self.included.iter().any(|t| t.tiers.is_some())
    }

    /// Pull exactly one more tier from every included term that has one and
    /// merge the new candidates in. Returns whether any iterator produced a
    /// tier (i.e. whether calling again could still grow the list).
    pub fn extend_from_tiers(&mut self) -> Result<bool> {
        if self.docs.len() >= self.term_cap {
            self.truncated = self.truncated || self.has_more_tiers();
            self.drop_iterators();
            return Ok(false);
        }

        let incoming = self.included.len();
        let mut front = std::mem::take(&mut self.docs);
        let mut back = Vec::with_capacity(front.len() + incoming * TIER_SIZE);
        let mut progressed = false;

        // Double-buffered merge: each pulled tier merges the current buffer
        // into the spare one, then the buffers swap roles.
        for term in &mut self.included {
            let Some(iter) = term.tiers.as_mut() else {
                continue;
            };
            match iter.read_next()? {
                Some(tier) => {
                    back.clear();
                    merge_tier(&front, &tier, term.weight, &mut back);
                    std::mem::swap(&mut front, &mut back);
                    progressed = true;
                }
                None => term.tiers = None,
            }
        }

        self.docs = front;
        if self.docs.len() >= self.term_cap {
            self.truncated = self.truncated || self.has_more_tiers();
            self.drop_iterators();
        }
        Ok(progressed)
    }

    /// Merge another candidate list into this one, summing scores on docid
    /// collisions and adopting the other's included terms.
    pub fn append_multi(&mut self, other: TopDocs<R>) {
        let mut merged = Vec::with_capacity(self.docs.len() + other.docs.len());
        merge_scored(&self.docs, &other.docs, &mut merged);
        self.docs = merged;
        self.included.extend(other.included);
        self.truncated |= other.truncated;
    }

    /// Partially sort so the best [`TOP_K_RESULTS`] come first by
    /// descending score; the tail stays unordered. Destroys docid order.
    pub fn sort_by_frequencies(&mut self) {
        partial_sort_by_score(&mut self.docs);
    }

    fn drop_iterators(&mut self) {
        for term in &mut self.included {
            term.tiers = None;
        }
    }
}

impl<R: Read + Seek> Default for TopDocs<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge a docid-sorted candidate list with one freshly pulled tier.
fn merge_tier(docs: &[ScoredDoc], tier: &Tier, weight: u64, out: &mut Vec<ScoredDoc>) {
    let scored = tier
        .entries
        .iter()
        .map(|df| ScoredDoc::new(df.document_id, u64::from(df.frequency) * weight));
    merge_iter(docs.iter().copied(), scored, out);
}

/// Merge two docid-sorted lists, summing scores of equal document ids.
pub fn merge_scored(a: &[ScoredDoc], b: &[ScoredDoc], out: &mut Vec<ScoredDoc>) {
    merge_iter(a.iter().copied(), b.iter().copied(), out);
}

fn merge_iter(
    a: impl Iterator<Item = ScoredDoc>,
    b: impl Iterator<Item = ScoredDoc>,
    out: &mut Vec<ScoredDoc>,
) {
    let mut a = a.peekable();
    let mut b = b.peekable();
    loop {
        let next = match (a.peek(), b.peek()) {
            (Some(x), Some(y)) => match x.document_id.cmp(&y.document_id) {
                std::cmp::Ordering::Less => a.next().unwrap(),
                std::cmp::Ordering::Greater => b.next().unwrap(),
                std::cmp::Ordering::Equal => {
                    let x = a.next().unwrap();
                    let y = b.next().unwrap();
                    ScoredDoc::new(x.document_id, x.score.saturating_add(y.score))
                }
            },
            (Some(_), None) => a.next().unwrap(),
            (None, Some(_)) => b.next().unwrap(),
            (None, None) => break,
        };
        match out.last_mut() {
            Some(last) if last.document_id == next.document_id => {
                last.score = last.score.saturating_add(next.score)
            }
            _ => out.push(next),
        }
    }
}

/// Order the best `TOP_K_RESULTS` first by descending score without fully
/// sorting the tail.
pub fn partial_sort_by_score(docs: &mut [ScoredDoc]) {
    let k = TOP_K_RESULTS.min(docs.len());
    if k == 0 {
        return;
    }
    if docs.len() > k {
        docs.select_nth_unstable_by(k - 1, |a, b| b.score.cmp(&a.score));
    }
    docs[..k].sort_unstable_by(|a, b| b.score.cmp(&a.score).then(a.document_id.cmp(&b.document_id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tiers::{write_tiers, DocumentFrequency};
    use std::io::Cursor;

    type MemTopDocs = TopDocs<Cursor<Vec<u8>>>;

    fn tier_iterator(entries: &[(u32, u32)]) -> TierIterator<Cursor<Vec<u8>>> {
        let list: Vec<_> = entries
            .iter()
            .map(|&(id, f)| DocumentFrequency::new(id, f))
            .collect();
        let mut buf = Vec::new();
        write_tiers(&mut buf, &list).unwrap();
        TierIterator::new(Cursor::new(buf), 0).unwrap()
    }

    #[test]
    fn test_extend_pulls_one_tier_per_call() {
        let entries: Vec<(u32, u32)> = (0..600).map(|i| (i, 1)).collect();
        let mut td: MemTopDocs =
            TopDocs::for_term("FOX", Some(tier_iterator(&entries)), usize::MAX);

        assert!(td.extend_from_tiers().unwrap());
        assert_eq!(td.len(), 256);
        assert!(td.extend_from_tiers().unwrap());
        assert_eq!(td.len(), 512);
        assert!(td.extend_from_tiers().unwrap());
        assert_eq!(td.len(), 600);
        assert!(!td.extend_from_tiers().unwrap());
        assert!(!td.has_more_tiers());
    }

    #[test]
    fn test_scores_weighted_by_term_length() {
        let mut td: MemTopDocs =
            TopDocs::for_term("QUICK", Some(tier_iterator(&[(3, 2)])), usize::MAX);
        td.extend_from_tiers().unwrap();
        assert_eq!(td.docs(), &[ScoredDoc::new(3, 10)]); // freq 2 * len 5
    }

    #[test]
    fn test_append_multi_sums_collisions() {
        let mut a: MemTopDocs = TopDocs::from_scored(vec![
            ScoredDoc::new(1, 5),
            ScoredDoc::new(3, 2),
            ScoredDoc::new(9, 1),
        ]);
        let b: MemTopDocs =
            TopDocs::from_scored(vec![ScoredDoc::new(3, 7), ScoredDoc::new(4, 4)]);
        a.append_multi(b);
        assert_eq!(
            a.docs(),
            &[
                ScoredDoc::new(1, 5),
                ScoredDoc::new(3, 9),
                ScoredDoc::new(4, 4),
                ScoredDoc::new(9, 1),
            ]
        );
    }

    #[test]
    fn test_docs_stay_docid_sorted_and_unique() {
        let mut td: MemTopDocs = TopDocs::new();
        td.append_multi(TopDocs::for_term(
            "ONE",
            Some(tier_iterator(&[(5, 1), (7, 2)])),
            usize::MAX,
        ));
        td.append_multi(TopDocs::for_term(
            "TWO",
            Some(tier_iterator(&[(5, 3), (6, 1)])),
            usize::MAX,
        ));
        while td.extend_from_tiers().unwrap() {}

        let ids: Vec<u32> = td.docs().iter().map(|d| d.document_id).collect();
        assert_eq!(ids, vec![5, 6, 7]);
        // doc 5: freq 1 * 3 ("ONE") + freq 3 * 3 ("TWO")
        assert_eq!(td.docs()[0].score, 12);
    }

    #[test]
    fn test_term_cap_truncates_and_drops_iterators() {
        let entries: Vec<(u32, u32)> = (0..600).map(|i| (i, 1)).collect();
        let mut td: MemTopDocs = TopDocs::for_term("FOX", Some(tier_iterator(&entries)), 300);

        assert!(td.extend_from_tiers().unwrap());
        assert!(td.extend_from_tiers().unwrap());
        assert_eq!(td.len(), 512);
        assert!(!td.extend_from_tiers().unwrap());
        assert!(td.truncated());
        assert!(!td.has_more_tiers());
    }

    #[test]
    fn test_partial_sort_orders_top_k() {
        let mut docs: Vec<ScoredDoc> = (0..200)
            .map(|i| ScoredDoc::new(i, u64::from((i * 7919) % 1000)))
            .collect();
        let mut full = docs.clone();
        full.sort_by(|a, b| b.score.cmp(&a.score).then(a.document_id.cmp(&b.document_id)));

        partial_sort_by_score(&mut docs);
        assert_eq!(&docs[..TOP_K_RESULTS], &full[..TOP_K_RESULTS]);
    }

    #[test]
    fn test_empty_topdocs() {
        let mut td: MemTopDocs = TopDocs::new();
        assert!(!td.extend_from_tiers().unwrap());
        assert!(td.is_empty());
        assert!(td.first_term().is_none());
    }
}
