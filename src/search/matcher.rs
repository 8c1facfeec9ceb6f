//! Boolean AND/OR combination of per-term candidate lists
//!
//! AND walks the smallest list and probes the others with a galloping,
//! never-rewinding search; OR is a k-way merge with score accumulation.
//! Both are capped: blowing past the configured result cap truncates the
//! output and marks it partial instead of failing the query.

use std::io::{Read, Seek};

use tracing::{debug, warn};

use crate::error::Result;
use crate::search::topdocs::{merge_scored, ScoredDoc, TopDocs};

/// Scores from the OR fallback are divided by this, so genuine AND matches
/// always outrank them.
pub const OR_BACKUP_PENALTY: u64 = 5;

/// Caps applied while combining per-term results.
#[derive(Clone, Copy, Debug)]
pub struct MatchLimits {
    pub max_boolean_results: usize,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self {
            max_boolean_results: 10_000,
        }
    }
}

/// Combined result set. `complete` is false when a cap truncated the
/// combination or a contributing term's candidate list was itself cut
/// short — the documents present are valid, the set just may not be
/// exhaustive.
#[derive(Clone, Debug, Default)]
pub struct MatchList {
    pub docs: Vec<ScoredDoc>,
    pub complete: bool,
}

impl MatchList {
    fn empty() -> Self {
        Self {
            docs: Vec::new(),
            complete: true,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Galloping lower bound: find the first index `>= target` at or after
/// `from`, doubling the probe distance before binary-searching the final
/// range. The cursor never moves backwards across calls.
fn gallop_to(docs: &[ScoredDoc], from: usize, target: u32) -> usize {
    if from >= docs.len() || docs[from].document_id >= target {
        return from;
    }
    let mut bound = 1;
    while from + bound < docs.len() && docs[from + bound].document_id < target {
        bound *= 2;
    }
    let lo = from + bound / 2;
    let hi = (from + bound + 1).min(docs.len());
    lo + docs[lo..hi].partition_point(|d| d.document_id < target)
}

/// Intersect per-term candidate lists.
///
/// Only documents present in every list survive; a survivor's score is the
/// sum of its per-term scores.
pub fn and<R: Read + Seek>(results: &[TopDocs<R>], limits: &MatchLimits) -> MatchList {
    let inputs_truncated = results.iter().any(|td| td.truncated());
    match results.len() {
        0 => return MatchList::empty(),
        1 => {
            let mut docs = results[0].docs().to_vec();
            let complete = !inputs_truncated && docs.len() <= limits.max_boolean_results;
            docs.truncate(limits.max_boolean_results);
            return MatchList { docs, complete };
        }
        _ => {}
    }

    let driver_idx = (0..results.len())
        .min_by_key(|&i| results[i].len())
        .unwrap();
    let driver = results[driver_idx].docs();

    let mut cursors = vec![0usize; results.len()];
    let mut out = Vec::new();
    let mut hit_cap = false;

    'driver: for candidate in driver {
        let mut score = candidate.score;
        for (i, other) in results.iter().enumerate() {
            if i == driver_idx {
                continue;
            }
            let docs = other.docs();
            let found = gallop_to(docs, cursors[i], candidate.document_id);
            cursors[i] = found;
            if found >= docs.len() {
                // This list is exhausted; no later driver doc can match
                // everywhere either.
                break 'driver;
            }
            if docs[found].document_id != candidate.document_id {
                continue 'driver;
            }
            score = score.saturating_add(docs[found].score);
            cursors[i] = found + 1;
        }
        out.push(ScoredDoc::new(candidate.document_id, score));
        if out.len() >= limits.max_boolean_results {
            hit_cap = true;
            warn!(cap = limits.max_boolean_results, "AND result cap reached, truncating");
            break;
        }
    }

    MatchList {
        docs: out,
        complete: !hit_cap && !inputs_truncated,
    }
}

/// Union of per-term candidate lists with score accumulation.
pub fn or<R: Read + Seek>(results: &[TopDocs<R>], limits: &MatchLimits) -> MatchList {
    let inputs_truncated = results.iter().any(|td| td.truncated());
    let mut docs: Vec<ScoredDoc> = Vec::new();
    for td in results {
        let mut merged = Vec::with_capacity(docs.len() + td.len());
        merge_scored(&docs, td.docs(), &mut merged);
        docs = merged;
    }

    let hit_cap = docs.len() > limits.max_boolean_results;
    if hit_cap {
        warn!(cap = limits.max_boolean_results, "OR result cap reached, truncating");
        docs.truncate(limits.max_boolean_results);
    }
    MatchList {
        docs,
        complete: !hit_cap && !inputs_truncated,
    }
}

/// OR fallback used when an AND query matches nothing: union the per-term
/// results with scores knocked down by [`OR_BACKUP_PENALTY`].
pub fn backup_or<R: Read + Seek>(results: &[TopDocs<R>], limits: &MatchLimits) -> MatchList {
    let mut list = or(results, limits);
    for doc in &mut list.docs {
        doc.score /= OR_BACKUP_PENALTY;
    }
    list
}

/// Lazy AND: intersect what has been materialized so far, and only pull
/// more tiers while the confirmed intersection is smaller than `wanted`.
pub fn and_streaming<R: Read + Seek>(
    results: &mut [TopDocs<R>],
    wanted: usize,
    limits: &MatchLimits,
) -> Result<MatchList> {
    // Seed every term with its first tier so the initial AND sees data.
    for td in results.iter_mut() {
        if td.is_empty() {
            td.extend_from_tiers()?;
        }
    }

    let mut matched = and(results, limits);
    while matched.len() < wanted {
        let mut any_extended = false;
        for td in results.iter_mut() {
            if td.extend_from_tiers()? {
                any_extended = true;
            }
        }
        if !any_extended {
            break;
        }
        debug!(confirmed = matched.len(), wanted, "extending tier iterators");
        matched = and(results, limits);
    }
    Ok(matched)
}
