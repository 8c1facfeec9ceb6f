//! Delta-encoded position streams
//!
//! Per term the positions stream holds every (document id, byte position)
//! posting, grouped by ascending document id:
//!
//! ```text
//! [u32 LE magic]
//! [vnum posting_count]
//! [vnum payload_byte_len]
//! payload:
//!   first posting of a docid run:  [vnum docid_delta] [vnum position]
//!   later postings in the run:     [vnum position_delta]
//! ```
//!
//! Run boundaries are not self-describing: the reader replays the writer's
//! grouping using the term's frequency list (frequency = run length). The
//! two sides of that contract live in this module so they cannot drift.

use std::io::{Read, Write};

use crate::codec::tiers::DocumentFrequency;
use crate::codec::varint::{read_vnum, read_vnum_u32, write_vnum};
use crate::error::{MurexError, Result};
use crate::index::types::Posting;

/// Frame marker; not decodable as a vnum, so a misaligned read fails fast.
pub const POSITIONS_MAGIC: u32 = 0xFFAD_CFF0;

fn is_sorted(postings: &[Posting]) -> bool {
    postings
        .windows(2)
        .all(|w| (w[0].document_id, w[0].position) < (w[1].document_id, w[1].position))
}

/// Serialize one term's postings.
///
/// `postings` must be sorted by (document id, position) and duplicate-free.
pub fn write_positions<W: Write>(writer: &mut W, postings: &[Posting]) -> Result<()> {
    if !is_sorted(postings) {
        return Err(MurexError::corrupt("positions list not sorted"));
    }

    let mut payload = Vec::new();
    let mut prev_doc = 0u32;
    let mut prev_pos = 0u32;
    let mut run_open = false;
    for posting in postings {
        if !run_open || posting.document_id != prev_doc {
            write_vnum(&mut payload, u64::from(posting.document_id - prev_doc))?;
            write_vnum(&mut payload, u64::from(posting.position))?;
            run_open = true;
        } else {
            write_vnum(&mut payload, u64::from(posting.position - prev_pos))?;
        }
        prev_doc = posting.document_id;
        prev_pos = posting.position;
    }

    writer.write_all(&POSITIONS_MAGIC.to_le_bytes())?;
    write_vnum(writer, postings.len() as u64)?;
    write_vnum(writer, payload.len() as u64)?;
    writer.write_all(&payload)?;
    Ok(())
}

fn read_header<R: Read>(reader: &mut R, freq_list: &[DocumentFrequency]) -> Result<u64> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if u32::from_le_bytes(magic) != POSITIONS_MAGIC {
        return Err(MurexError::format("positions frame out of sync"));
    }

    let total = read_vnum(reader)?;
    let expected: u64 = freq_list.iter().map(|df| u64::from(df.frequency)).sum();
    if total != expected {
        return Err(MurexError::format(format!(
            "posting count {total} disagrees with frequency list total {expected}"
        )));
    }
    read_vnum(reader) // payload length
}

fn read_run<R: Read>(
    reader: &mut R,
    df: &DocumentFrequency,
    prev_doc: &mut u32,
    keep: bool,
    out: &mut Vec<Posting>,
) -> Result<()> {
    if df.frequency == 0 {
        return Err(MurexError::format("frequency list entry with zero count"));
    }
    let delta = read_vnum_u32(reader)?;
    let doc_id = prev_doc.checked_add(delta).ok_or_else(|| {
        MurexError::format("document id overflow while decoding positions")
    })?;
    if doc_id != df.document_id {
        return Err(MurexError::format(format!(
            "positions stream lists document {doc_id} where the frequency list expects {}",
            df.document_id
        )));
    }
    *prev_doc = doc_id;

    let mut position = read_vnum_u32(reader)?;
    if keep {
        out.push(Posting::new(doc_id, position));
    }
    for _ in 1..df.frequency {
        let step = read_vnum_u32(reader)?;
        position = position
            .checked_add(step)
            .ok_or_else(|| MurexError::format("position overflow while decoding positions"))?;
        if keep {
            out.push(Posting::new(doc_id, position));
        }
    }
    Ok(())
}

/// Fully decode a term's positions stream.
///
/// `freq_list` is the term's complete docid-sorted frequency list; it
/// supplies the run lengths the payload does not carry.
pub fn read_positions_all<R: Read>(
    reader: &mut R,
    freq_list: &[DocumentFrequency],
) -> Result<Vec<Posting>> {
    read_header(reader, freq_list)?;
    let mut out = Vec::with_capacity(
        freq_list
            .iter()
            .map(|df| df.frequency as usize)
            .sum::<usize>(),
    );
    let mut prev_doc = 0u32;
    for df in freq_list {
        read_run(reader, df, &mut prev_doc, true, &mut out)?;
    }
    Ok(out)
}

/// Decode only the runs belonging to `wanted` document ids (sorted).
///
/// Runs for other documents are parsed and discarded, so large terms do not
/// pay the allocation cost of positions nobody asked for.
pub fn fill_positions_from_docs<R: Read>(
    reader: &mut R,
    freq_list: &[DocumentFrequency],
    wanted: &[u32],
) -> Result<Vec<Posting>> {
    debug_assert!(wanted.windows(2).all(|w| w[0] < w[1]));

    read_header(reader, freq_list)?;
    let mut out = Vec::new();
    let mut prev_doc = 0u32;
    let mut cursor = 0usize;
    for df in freq_list {
        while cursor < wanted.len() && wanted[cursor] < df.document_id {
            cursor += 1;
        }
        let keep = cursor < wanted.len() && wanted[cursor] == df.document_id;
        read_run(reader, df, &mut prev_doc, keep, &mut out)?;
    }
    Ok(out)
}
