//! Frequency-tiered blocks of per-document counts
//!
//! A term's (document id, frequency) list is stored as a sequence of tiers:
//! the list is sorted by frequency descending, cut into blocks of
//! [`TIER_SIZE`], and each block is re-sorted by document id. Tier 0 holds
//! the highest-frequency documents, so a reader that only consumes the first
//! few tiers still sees the most interesting documents for the term.
//!
//! Layout per term:
//!
//! ```text
//! [vnum tier_count]
//! per tier:
//!   [vnum entry_count]        -- last tier only; earlier tiers hold TIER_SIZE
//!   [entry_count docid deltas, fixed-width vnums]
//!   [entry_count frequencies, fixed-width vnums]
//! ```
//!
//! Ids and frequencies are two contiguous runs per tier, not interleaved,
//! and both runs are fixed-width so they can be bulk-read at constant
//! stride. Docid deltas restart at each tier (the first entry is absolute).

use std::io::{Read, Seek, SeekFrom, Write};

use crate::codec::varint::{read_fixed_u32_run, read_vnum_u32, write_vnum, write_vnum_fixed};
use crate::error::{MurexError, Result};

/// Number of entries per full tier.
pub const TIER_SIZE: usize = 256;

/// One document containing a term, with the term's occurrence count there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DocumentFrequency {
    pub document_id: u32,
    pub frequency: u32,
}

impl DocumentFrequency {
    pub fn new(document_id: u32, frequency: u32) -> Self {
        Self {
            document_id,
            frequency,
        }
    }
}

/// One decoded tier, docid-ascending.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tier {
    pub entries: Vec<DocumentFrequency>,
}

impl Tier {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_sorted_unique(entries: &[DocumentFrequency]) -> bool {
    entries
        .windows(2)
        .all(|w| w[0].document_id < w[1].document_id)
}

/// Serialize a term's frequency list as tiers.
///
/// `entries` must be docid-sorted with unique document ids; a violation
/// means the build produced garbage and aborts instead of publishing it.
pub fn write_tiers<W: Write>(writer: &mut W, entries: &[DocumentFrequency]) -> Result<()> {
    if !is_sorted_unique(entries) {
        return Err(MurexError::corrupt(
            "frequency list not sorted by unique document id",
        ));
    }

    let mut by_freq = entries.to_vec();
    by_freq.sort_by(|a, b| {
        b.frequency
            .cmp(&a.frequency)
            .then(a.document_id.cmp(&b.document_id))
    });

    let tier_count = by_freq.chunks(TIER_SIZE).count();
    write_vnum(writer, tier_count as u64)?;

    for (i, tier) in by_freq.chunks_mut(TIER_SIZE).enumerate() {
        tier.sort_by_key(|df| df.document_id);

        if i + 1 == tier_count {
            write_vnum(writer, tier.len() as u64)?;
        } else {
            debug_assert_eq!(tier.len(), TIER_SIZE);
        }

        let mut prev_id = 0u32;
        for df in tier.iter() {
            write_vnum_fixed(writer, u64::from(df.document_id - prev_id))?;
            prev_id = df.document_id;
        }
        for df in tier.iter() {
            write_vnum_fixed(writer, u64::from(df.frequency))?;
        }
    }
    Ok(())
}

/// Lazy reader over one term's tiers.
///
/// Holds an explicit cursor (`position`) so that partially consumed
/// iterators can be resumed with [`TierIterator::seek_to`]; iteration is
/// otherwise forward-only and never implicitly restarts.
pub struct TierIterator<R> {
    reader: R,
    remaining: u32,
    position: u64,
}

impl<R: Read + Seek> TierIterator<R> {
    /// Open an iterator at a term's offset in the frequencies stream.
    pub fn new(mut reader: R, offset: u64) -> Result<Self> {
        reader.seek(SeekFrom::Start(offset))?;
        let remaining = read_vnum_u32(&mut reader)?;
        let position = reader.stream_position()?;
        Ok(Self {
            reader,
            remaining,
            position,
        })
    }

    /// Number of tiers not yet consumed.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Saved stream position of the next tier.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Resume from a previously saved `(position, remaining)` pair.
    pub fn seek_to(&mut self, position: u64, remaining: u32) {
        self.position = position;
        self.remaining = remaining;
    }

    /// Decode the next tier, or `None` once every tier has been consumed.
    pub fn read_next(&mut self) -> Result<Option<Tier>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.reader.seek(SeekFrom::Start(self.position))?;

        let count = if self.remaining == 1 {
            read_vnum_u32(&mut self.reader)? as usize
        } else {
            TIER_SIZE
        };

        let deltas = read_fixed_u32_run(&mut self.reader, count)?;
        let freqs = read_fixed_u32_run(&mut self.reader, count)?;

        let mut entries = Vec::with_capacity(count);
        let mut doc_id = 0u32;
        for (i, (&delta, &freq)) in deltas.iter().zip(&freqs).enumerate() {
            doc_id = doc_id.checked_add(delta).ok_or_else(|| {
                MurexError::format("document id overflow while summing tier deltas")
            })?;
            if i > 0 && delta == 0 {
                return Err(MurexError::format("tier entries not docid-ascending"));
            }
            entries.push(DocumentFrequency::new(doc_id, freq));
        }

        self.remaining -= 1;
        self.position = self.reader.stream_position()?;
        Ok(Some(Tier { entries }))
    }

    /// Drain every remaining tier and merge into one docid-sorted list.
    pub fn read_all(&mut self) -> Result<Vec<DocumentFrequency>> {
        let mut merged: Vec<DocumentFrequency> = Vec::new();
        while let Some(tier) = self.read_next()? {
            merged = merge_by_doc_id(&merged, &tier.entries);
        }
        Ok(merged)
    }
}

/// Merge two docid-sorted frequency lists. Document ids never repeat across
/// a term's tiers, so no summing is needed here.
fn merge_by_doc_id(a: &[DocumentFrequency], b: &[DocumentFrequency]) -> Vec<DocumentFrequency> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].document_id <= b[j].document_id {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn freq_list(pairs: &[(u32, u32)]) -> Vec<DocumentFrequency> {
        pairs
            .iter()
            .map(|&(id, freq)| DocumentFrequency::new(id, freq))
            .collect()
    }

    #[test]
    fn test_single_tier_roundtrip() {
        let entries = freq_list(&[(1, 3), (5, 1), (9, 7)]);
        let mut buf = Vec::new();
        write_tiers(&mut buf, &entries).unwrap();

        let mut iter = TierIterator::new(Cursor::new(buf), 0).unwrap();
        assert_eq!(iter.remaining(), 1);

        let tier = iter.read_next().unwrap().unwrap();
        assert_eq!(tier.entries, entries);
        assert!(iter.read_next().unwrap().is_none());
    }

    #[test]
    fn test_600_entries_make_three_tiers() {
        let entries: Vec<_> = (0..600)
            .map(|i| DocumentFrequency::new(i * 2, i % 40 + 1))
            .collect();
        let mut buf = Vec::new();
        write_tiers(&mut buf, &entries).unwrap();

        let mut iter = TierIterator::new(Cursor::new(buf), 0).unwrap();
        assert_eq!(iter.remaining(), 3);

        let sizes: Vec<usize> = std::iter::from_fn(|| iter.read_next().unwrap())
            .map(|t| t.len())
            .collect();
        assert_eq!(sizes, vec![256, 256, 88]);
    }

    #[test]
    fn test_read_all_restores_docid_order() {
        let entries: Vec<_> = (0..600)
            .map(|i| DocumentFrequency::new(i * 3 + 1, (i * 7) % 100 + 1))
            .collect();
        let mut buf = Vec::new();
        write_tiers(&mut buf, &entries).unwrap();

        let mut iter = TierIterator::new(Cursor::new(buf), 0).unwrap();
        assert_eq!(iter.read_all().unwrap(), entries);
    }

    #[test]
    fn test_tier_zero_has_highest_frequencies() {
        let entries: Vec<_> = (0..600).map(|i| DocumentFrequency::new(i, i + 1)).collect();
        let mut buf = Vec::new();
        write_tiers(&mut buf, &entries).unwrap();

        let mut iter = TierIterator::new(Cursor::new(buf), 0).unwrap();
        let first = iter.read_next().unwrap().unwrap();
        let min_first: u32 = first.entries.iter().map(|df| df.frequency).min().unwrap();

        let mut rest_max = 0;
        while let Some(tier) = iter.read_next().unwrap() {
            assert!(!tier.entries.is_empty());
            rest_max = rest_max.max(tier.entries.iter().map(|df| df.frequency).max().unwrap());
        }
        assert!(min_first >= rest_max);
    }

    #[test]
    fn test_idempotent_reserialization() {
        let entries: Vec<_> = (0..300)
            .map(|i| DocumentFrequency::new(i * 5, (i * 13) % 50 + 1))
            .collect();
        let mut first = Vec::new();
        write_tiers(&mut first, &entries).unwrap();

        let decoded = TierIterator::new(Cursor::new(first.clone()), 0)
            .unwrap()
            .read_all()
            .unwrap();
        let mut second = Vec::new();
        write_tiers(&mut second, &decoded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_seek_to_resumes() {
        let entries: Vec<_> = (0..600).map(|i| DocumentFrequency::new(i, 1)).collect();
        let mut buf = Vec::new();
        write_tiers(&mut buf, &entries).unwrap();

        let mut iter = TierIterator::new(Cursor::new(buf.clone()), 0).unwrap();
        iter.read_next().unwrap().unwrap();
        let (pos, remaining) = (iter.position(), iter.remaining());
        let second = iter.read_next().unwrap().unwrap();

        iter.seek_to(pos, remaining);
        let replayed = iter.read_next().unwrap().unwrap();
        assert_eq!(replayed, second);
        assert_eq!(iter.remaining(), 1);
    }

    #[test]
    fn test_rejects_unsorted_input() {
        let entries = freq_list(&[(5, 1), (1, 2)]);
        let mut buf = Vec::new();
        assert!(write_tiers(&mut buf, &entries).is_err());
    }

    #[test]
    fn test_rejects_duplicate_docids() {
        let entries = freq_list(&[(5, 1), (5, 2)]);
        let mut buf = Vec::new();
        assert!(write_tiers(&mut buf, &entries).is_err());
    }

    #[test]
    fn test_empty_term_yields_no_tiers() {
        let mut buf = Vec::new();
        write_tiers(&mut buf, &[]).unwrap();
        let mut iter = TierIterator::new(Cursor::new(buf), 0).unwrap();
        assert!(iter.read_next().unwrap().is_none());
    }

    #[test]
    fn test_truncated_tier_is_format_error() {
        let entries: Vec<_> = (0..10).map(|i| DocumentFrequency::new(i, 1)).collect();
        let mut buf = Vec::new();
        write_tiers(&mut buf, &entries).unwrap();
        buf.truncate(buf.len() - 3);

        let mut iter = TierIterator::new(Cursor::new(buf), 0).unwrap();
        assert!(iter.read_next().is_err());
    }
}
