//! Proximity re-ranking over exact token positions
//!
//! After boolean matching, surviving candidates are re-scored using the
//! distance between adjacent query terms' occurrences inside each document.
//! The gap metric is the minimal pairwise distance between the two terms'
//! occurrence lists, less the earlier term's length (so "QUICK FOX" printed
//! adjacently gaps to roughly zero); accumulated gaps map onto a step
//! scaler, chosen so that tightly clustered phrases dominate scattered
//! matches. See DESIGN.md for why this particular shape.

use tracing::warn;

use crate::index::types::{DocId, Posting};
use crate::search::matcher::MatchList;
use crate::search::topdocs::ScoredDoc;

/// Queries with this many terms or more skip re-ranking entirely.
pub const MAX_RERANK_TERMS: usize = 32;

/// Gap assigned when a candidate's positions cannot be found; maps to the
/// lowest scaler.
const MISSING_POSITIONS_GAP: u32 = 1 << 29;

/// How many matched positions are kept per document for highlighting.
pub const MATCH_SLOTS: usize = 4;

/// A re-ranked result: final score plus the first matched positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankedDoc {
    pub document_id: DocId,
    pub score: u64,
    pub matches: [u32; MATCH_SLOTS],
}

impl RankedDoc {
    pub fn new(document_id: DocId, score: u64) -> Self {
        Self {
            document_id,
            score,
            matches: [0; MATCH_SLOTS],
        }
    }

    fn record_match(&mut self, position: u32) {
        if let Some(slot) = self.matches.iter_mut().find(|p| **p == 0) {
            *slot = position;
        }
    }
}

impl From<ScoredDoc> for RankedDoc {
    fn from(doc: ScoredDoc) -> Self {
        RankedDoc::new(doc.document_id, doc.score)
    }
}

/// Final result set after re-ranking.
#[derive(Clone, Debug, Default)]
pub struct RankedDocs {
    pub docs: Vec<RankedDoc>,
    pub complete: bool,
}

/// Slice out the docid's run from a (docid, position)-sorted list.
fn doc_run(positions: &[Posting], document_id: DocId) -> &[Posting] {
    let start = positions.partition_point(|p| p.document_id < document_id);
    let end = start + positions[start..].partition_point(|p| p.document_id <= document_id);
    &positions[start..end]
}

/// Walk two position runs of the same document with two fingers, returning
/// the minimal non-negative distance from an occurrence in `first` to a
/// later occurrence in `second`.
fn two_finger_min_gap(first: &[Posting], second: &[Posting]) -> u32 {
    let mut best = u32::MAX;
    let (mut i, mut j) = (0, 0);
    while i < first.len() && j < second.len() {
        if first[i].position > second[j].position {
            j += 1;
        } else {
            best = best.min(second[j].position - first[i].position);
            if best <= 1 {
                break;
            }
            i += 1;
        }
    }
    best
}

fn gap_scaler(gap: u32) -> f64 {
    match gap {
        0..=2 => 100.0,
        3..=5 => 50.0,
        6..=10 => 25.0,
        11..=20 => 10.0,
        21..=50 => 1.0,
        _ => 0.9,
    }
}

/// Re-score `matched` using the per-term position lists (each filtered to
/// the candidate documents, in query-term order).
///
/// Single-term queries and very wide queries pass through unchanged.
pub fn rerank_by_positions(
    term_positions: &[(String, Vec<Posting>)],
    matched: &MatchList,
) -> RankedDocs {
    let passthrough = term_positions.len() < 2 || term_positions.len() >= MAX_RERANK_TERMS;
    let mut docs: Vec<RankedDoc> = matched.docs.iter().map(|&d| d.into()).collect();

    if !passthrough {
        for doc in &mut docs {
            let mut total_gap: u64 = 0;
            for pair in term_positions.windows(2) {
                let (first_term, first_list) = &pair[0];
                let (_, second_list) = &pair[1];

                let first_run = doc_run(first_list, doc.document_id);
                let second_run = doc_run(second_list, doc.document_id);
                if first_run.is_empty() || second_run.is_empty() {
                    warn!(
                        document_id = doc.document_id,
                        "candidate missing positions, demoting"
                    );
                    total_gap = u64::from(MISSING_POSITIONS_GAP);
                    break;
                }

                let raw = two_finger_min_gap(first_run, second_run);
                let adjusted = u64::from(raw).saturating_sub(first_term.len() as u64);
                total_gap = total_gap.saturating_add(adjusted);
                doc.record_match(first_run[0].position);
            }
            let clamped = u32::try_from(total_gap).unwrap_or(u32::MAX);
            doc.score = (doc.score as f64 * gap_scaler(clamped)) as u64;
        }
    }

    sort_ranked(&mut docs);
    RankedDocs {
        docs,
        complete: matched.complete,
    }
}

/// Descending score, document id as tiebreak.
pub fn sort_ranked(docs: &mut [RankedDoc]) {
    docs.sort_unstable_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.document_id.cmp(&b.document_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn postings(list: &[(u32, u32)]) -> Vec<Posting> {
        list.iter().map(|&(d, p)| Posting::new(d, p)).collect()
    }

    fn matched(docs: &[(u32, u64)]) -> MatchList {
        MatchList {
            docs: docs.iter().map(|&(d, s)| ScoredDoc::new(d, s)).collect(),
            complete: true,
        }
    }

    #[test]
    fn test_doc_run_brackets() {
        let list = postings(&[(1, 5), (1, 9), (3, 0), (3, 2), (9, 7)]);
        assert_eq!(doc_run(&list, 1), &postings(&[(1, 5), (1, 9)])[..]);
        assert_eq!(doc_run(&list, 3), &postings(&[(3, 0), (3, 2)])[..]);
        assert_eq!(doc_run(&list, 2), &[] as &[Posting]);
        assert_eq!(doc_run(&list, 10), &[] as &[Posting]);
    }

    #[test]
    fn test_two_finger_min_gap() {
        let first = postings(&[(1, 10), (1, 100)]);
        let second = postings(&[(1, 50), (1, 104)]);
        assert_eq!(two_finger_min_gap(&first, &second), 4);
    }

    #[test]
    fn test_two_finger_no_forward_occurrence() {
        // Every occurrence of `second` precedes every occurrence of `first`.
        let first = postings(&[(1, 100)]);
        let second = postings(&[(1, 10)]);
        assert_eq!(two_finger_min_gap(&first, &second), u32::MAX);
    }

    #[test]
    fn test_adjacent_terms_outrank_distant_ones() {
        // Doc 1: terms adjacent ("QUICK" at 4, "FOX" at 10, gap 6 - 5 = 1).
        // Doc 2: terms 990 bytes apart.
        let term_positions = vec![
            ("QUICK".to_string(), postings(&[(1, 4), (2, 10)])),
            ("FOX".to_string(), postings(&[(1, 10), (2, 1000)])),
        ];
        let ranked = rerank_by_positions(&term_positions, &matched(&[(1, 10), (2, 10)]));

        assert_eq!(ranked.docs[0].document_id, 1);
        assert_eq!(ranked.docs[0].score, 1000); // 10 * 100
        assert_eq!(ranked.docs[1].document_id, 2);
        assert_eq!(ranked.docs[1].score, 9); // 10 * 0.9
    }

    #[test]
    fn test_single_term_passes_through() {
        let term_positions = vec![("FOX".to_string(), postings(&[(1, 4)]))];
        let ranked = rerank_by_positions(&term_positions, &matched(&[(1, 7)]));
        assert_eq!(ranked.docs[0].score, 7);
    }

    #[test]
    fn test_missing_positions_demotes_not_errors() {
        let term_positions = vec![
            ("QUICK".to_string(), postings(&[(1, 4)])),
            ("FOX".to_string(), postings(&[])),
        ];
        let ranked = rerank_by_positions(&term_positions, &matched(&[(1, 100)]));
        assert_eq!(ranked.docs.len(), 1);
        assert_eq!(ranked.docs[0].score, 90); // 100 * 0.9
    }

    #[test]
    fn test_records_matched_positions() {
        let term_positions = vec![
            ("ONE".to_string(), postings(&[(1, 7)])),
            ("TWO".to_string(), postings(&[(1, 12)])),
        ];
        let ranked = rerank_by_positions(&term_positions, &matched(&[(1, 5)]));
        assert_eq!(ranked.docs[0].matches[0], 7);
    }

    #[test]
    fn test_sort_ranked_orders_by_score() {
        let mut docs = vec![
            RankedDoc::new(1, 5),
            RankedDoc::new(2, 50),
            RankedDoc::new(3, 50),
        ];
        sort_ranked(&mut docs);
        let ids: Vec<u32> = docs.iter().map(|d| d.document_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
