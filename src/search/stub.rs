//! Sparse in-memory skip index over the terms file
//!
//! Opening an index reads the terms file once, keeping one `StubEntry`
//! per `stub_interval` terms (plus the last term). Locating a term is a
//! binary search over the stub for the bracket containing its fingerprint,
//! then a bounded linear scan of the terms file inside that bracket. The
//! payload files are only touched after a hit, at the exact offsets the
//! terms file names, so lookups never load the index wholesale.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::PathBuf;

use tracing::debug;

use crate::codec::tiers::{DocumentFrequency, TierIterator};
use crate::codec::{fill_positions_from_docs, read_positions_all, read_str, read_vnum};
use crate::config::IndexConfig;
use crate::error::{MurexError, Result};
use crate::index::types::Posting;
use crate::search::fingerprint::TermFingerprint;
use crate::search::topdocs::TopDocs;

/// Score awarded to an exact term match by `prefix_score`; the dynamic
/// pruning cutoff never climbs past twice this in practice.
pub const PREFIX_CUTOFF: u64 = 100_000_000;

/// Bound on how many partial matches one prefix scan may accept.
pub const MAX_PREFIX_CANDIDATES: usize = 64;

/// Where a term lives in the three published files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TermLocation {
    pub terms_offset: u64,
    pub frequencies_offset: u64,
    pub positions_offset: u64,
}

#[derive(Clone, Copy, Debug)]
struct StubEntry {
    fingerprint: TermFingerprint,
    terms_offset: u64,
    frequencies_offset: u64,
}

/// A term accepted by a prefix scan.
#[derive(Clone, Debug)]
pub struct PrefixMatch {
    pub key: String,
    pub location: TermLocation,
    pub score: u64,
}

/// Read-only handle over one published index's term lookup structures.
///
/// Handles hold no locks and are independent of each other; re-opening the
/// same suffix yields a fresh handle over the same immutable files.
pub struct StubIndex {
    terms_path: PathBuf,
    frequencies_path: PathBuf,
    positions_path: PathBuf,
    entries: Vec<StubEntry>,
    term_count: u64,
    max_results_per_term: usize,
}

impl StubIndex {
    /// Open a published suffix, building the sparse stub from one
    /// sequential pass over the terms file.
    pub fn open(config: &IndexConfig, suffix: &str) -> Result<Self> {
        let terms_path = config.terms_path(suffix);
        let frequencies_path = config.frequencies_path(suffix);
        let positions_path = config.positions_path(suffix);

        let mut terms = BufReader::new(File::open(&terms_path)?);
        let mut frequencies = BufReader::new(File::open(&frequencies_path)?);

        let term_count = read_vnum(&mut terms)?;
        let frequencies_count = read_vnum(&mut frequencies)?;
        if term_count != frequencies_count {
            return Err(MurexError::format(format!(
                "terms file lists {term_count} terms but frequencies file lists {frequencies_count}"
            )));
        }

        let interval = config.stub_interval.max(1) as u64;
        let mut entries = Vec::with_capacity((term_count / interval) as usize + 1);
        let mut prev_fingerprint = None;

        for i in 0..term_count {
            let offset = terms.stream_position()?;
            let key = read_str(&mut terms)?;
            let frequencies_offset = read_vnum(&mut terms)?;
            read_vnum(&mut terms)?; // positions offset, not kept in the stub

            if i % interval == 0 || i + 1 == term_count {
                let fingerprint = TermFingerprint::new(&key);
                if let Some((prev_fp, prev_freq)) = prev_fingerprint {
                    // Both files are written front to back in term order; a
                    // stub that walks backwards means a corrupt index.
                    if fingerprint < prev_fp || frequencies_offset < prev_freq {
                        return Err(MurexError::format(
                            "terms file is not sorted by fingerprint",
                        ));
                    }
                }
                prev_fingerprint = Some((fingerprint, frequencies_offset));
                entries.push(StubEntry {
                    fingerprint,
                    terms_offset: offset,
                    frequencies_offset,
                });
            }
        }

        let frequencies_span = entries
            .last()
            .map(|e| e.frequencies_offset)
            .unwrap_or_default();
        debug!(
            terms = term_count,
            stub_entries = entries.len(),
            frequencies_span,
            "opened index stub"
        );
        Ok(Self {
            terms_path,
            frequencies_path,
            positions_path,
            entries,
            term_count,
            max_results_per_term: config.max_results_per_term,
        })
    }

    pub fn term_count(&self) -> u64 {
        self.term_count
    }

    pub fn is_empty(&self) -> bool {
        self.term_count == 0
    }

    /// Bracket of stub entries whose terms-file range may contain the
    /// fingerprint: scan start offset and exclusive upper offset (`None`
    /// means end of file).
    fn bracket(&self, fingerprint: TermFingerprint) -> Option<(u64, Option<u64>)> {
        if self.entries.is_empty() {
            return None;
        }
        let upper_idx = self.entries.partition_point(|e| e.fingerprint <= fingerprint);
        let start_idx = upper_idx.saturating_sub(1);
        let upper = self.entries.get(upper_idx).map(|e| e.terms_offset);
        Some((self.entries[start_idx].terms_offset, upper))
    }

    /// Find a term's exact location, or `None` if it was never indexed.
    pub fn locate(&self, term: &str) -> Result<Option<TermLocation>> {
        let fingerprint = TermFingerprint::new(term);
        let Some((start, upper)) = self.bracket(fingerprint) else {
            return Ok(None);
        };

        let mut terms = BufReader::new(File::open(&self.terms_path)?);
        terms.seek(SeekFrom::Start(start))?;

        loop {
            let offset = terms.stream_position()?;
            if let Some(upper) = upper {
                if offset > upper {
                    return Ok(None);
                }
            }
            let key = match read_str(&mut terms) {
                Ok(key) => key,
                // The last bracket runs to end of file.
                Err(MurexError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None)
                }
                Err(e) => return Err(e),
            };
            let frequencies_offset = read_vnum(&mut terms)?;
            let positions_offset = read_vnum(&mut terms)?;

            if key == term {
                return Ok(Some(TermLocation {
                    terms_offset: offset,
                    frequencies_offset,
                    positions_offset,
                }));
            }
            if TermFingerprint::new(&key) > fingerprint {
                return Ok(None);
            }
        }
    }

    /// Prefix-tolerant variant of [`StubIndex::locate`]: scans the same
    /// bracket (plus one stub block of slack) and accepts partial matches,
    /// pruning ever harder as candidates accumulate.
    pub fn locate_matching(&self, term: &str) -> Result<Vec<PrefixMatch>> {
        let fingerprint = TermFingerprint::new(term);
        let Some((start, upper)) = self.bracket(fingerprint) else {
            return Ok(Vec::new());
        };
        // Extend the scan one stub block past the bracket so slightly
        // longer keys with a different tenth character still get seen.
        let upper = upper.and_then(|bound| {
            let next = self
                .entries
                .partition_point(|e| e.terms_offset <= bound);
            self.entries.get(next).map(|e| e.terms_offset)
        });

        let mut terms = BufReader::new(File::open(&self.terms_path)?);
        terms.seek(SeekFrom::Start(start))?;

        let mut matches: Vec<PrefixMatch> = Vec::new();
        loop {
            let offset = terms.stream_position()?;
            if let Some(upper) = upper {
                if offset > upper {
                    break;
                }
            }
            let key = match read_str(&mut terms) {
                Ok(key) => key,
                Err(MurexError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };
            let frequencies_offset = read_vnum(&mut terms)?;
            let positions_offset = read_vnum(&mut terms)?;

            let cutoff = (matches.len() as u64).pow(4);
            let score = prefix_score(term, &key);
            if score > cutoff {
                matches.push(PrefixMatch {
                    key,
                    location: TermLocation {
                        terms_offset: offset,
                        frequencies_offset,
                        positions_offset,
                    },
                    score,
                });
                if matches.len() >= MAX_PREFIX_CANDIDATES {
                    debug!(term, "prefix scan hit candidate cap");
                    break;
                }
            }
        }
        Ok(matches)
    }

    /// Open a lazy tier iterator over a located term's frequencies.
    pub fn tier_iterator(&self, location: TermLocation) -> Result<TierIterator<BufReader<File>>> {
        let reader = BufReader::new(File::open(&self.frequencies_path)?);
        TierIterator::new(reader, location.frequencies_offset)
    }

    /// Fully materialize a located term's frequency list.
    pub fn read_frequencies(&self, location: TermLocation) -> Result<Vec<DocumentFrequency>> {
        self.tier_iterator(location)?.read_all()
    }

    /// Decode every position of a located term.
    pub fn read_positions(
        &self,
        location: TermLocation,
        freq_list: &[DocumentFrequency],
    ) -> Result<Vec<Posting>> {
        let mut reader = BufReader::new(File::open(&self.positions_path)?);
        reader.seek(SeekFrom::Start(location.positions_offset))?;
        read_positions_all(&mut reader, freq_list)
    }

    /// Decode only the positions belonging to `wanted` (sorted) documents.
    pub fn fill_positions(
        &self,
        location: TermLocation,
        freq_list: &[DocumentFrequency],
        wanted: &[u32],
    ) -> Result<Vec<Posting>> {
        let mut reader = BufReader::new(File::open(&self.positions_path)?);
        reader.seek(SeekFrom::Start(location.positions_offset))?;
        fill_positions_from_docs(&mut reader, freq_list, wanted)
    }

    /// Candidate list for one exact term; an absent term yields an empty
    /// list rather than an error.
    pub fn search_one_term(&self, term: &str) -> Result<TopDocs<BufReader<File>>> {
        match self.locate(term)? {
            Some(location) => Ok(TopDocs::for_term(
                term,
                Some(self.tier_iterator(location)?),
                self.max_results_per_term,
            )),
            None => Ok(TopDocs::for_term(term, None, self.max_results_per_term)),
        }
    }

    /// Candidate list for a term and its close prefix matches, merged.
    pub fn search_matching_terms(&self, term: &str) -> Result<TopDocs<BufReader<File>>> {
        let matches = self.locate_matching(term)?;
        let mut merged = TopDocs::for_term(term, None, self.max_results_per_term);
        for m in matches {
            let mut td = TopDocs::for_term(
                m.key.clone(),
                Some(self.tier_iterator(m.location)?),
                self.max_results_per_term,
            );
            td.extend_from_tiers()?;
            merged.append_multi(td);
        }
        Ok(merged)
    }
}

/// Score how well `shorter` works as a prefix of `longer`.
///
/// Exact equality scores `PREFIX_CUTOFF * 2`. A comparison that leaves
/// fewer than two characters of `shorter` unmatched scores
/// `matched^4 / (length difference + 1)`; anything worse scores zero.
pub fn prefix_score(shorter: &str, longer: &str) -> u64 {
    let s = shorter.as_bytes();
    let l = longer.as_bytes();
    if l.len() < s.len() {
        return 0;
    }

    let matched = s.iter().zip(l).take_while(|(a, b)| a == b).count();
    if matched == s.len() && s.len() == l.len() {
        return PREFIX_CUTOFF * 2;
    }
    let unmatched = s.len() - matched;
    if unmatched < 2 {
        (matched as u64).pow(4) / (l.len() - s.len() + 1) as u64
    } else {
        0
    }
}
