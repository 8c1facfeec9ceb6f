//! Serialization of a built index into its published files
//!
//! A published index is four files sharing one random suffix:
//!
//! - `terms-<suffix>`: `[vnum term_count]` then per term
//!   `[vnum key_len][key][vnum frequencies_offset][vnum positions_offset]`
//! - `frequencies-<suffix>`: `[vnum term_count]` then per term its tier
//!   blocks
//! - `positions-<suffix>`: `[vnum term_count]` then per term its delta
//!   posting stream
//! - `filemap-<suffix>`: `[vnum pair_count]` then per pair
//!   `[vnum docid][vnum len][file name]`
//!
//! All four are written as `.tmp` files, synced, and renamed into place, so
//! a reader never observes a half-written index.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crc32fast::Hasher;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

use crate::codec::tiers::write_tiers;
use crate::codec::{write_positions, write_str, write_vnum};
use crate::config::IndexConfig;
use crate::error::{MurexError, Result};
use crate::index::builder::BuiltIndex;

const SUFFIX_LEN: usize = 5;

/// Byte-counting, checksumming wrapper so per-term offsets can be recorded
/// without flushing or seeking the underlying file.
struct CountingWriter<W> {
    inner: W,
    written: u64,
    hasher: Hasher,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            written: 0,
            hasher: Hasher::new(),
        }
    }

    fn position(&self) -> u64 {
        self.written
    }

    fn finish(mut self) -> std::io::Result<(W, u32)> {
        self.inner.flush()?;
        Ok((self.inner, self.hasher.finalize()))
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Writes a [`BuiltIndex`] to disk and atomically publishes it.
pub struct IndexWriter<'a> {
    config: &'a IndexConfig,
}

impl<'a> IndexWriter<'a> {
    pub fn new(config: &'a IndexConfig) -> Self {
        Self { config }
    }

    /// Serialize and publish, returning the new index's suffix.
    pub fn publish(&self, built: &BuiltIndex) -> Result<String> {
        if !built.entries.windows(2).all(|w| w[0].key < w[1].key) {
            return Err(MurexError::corrupt("index terms not globally sorted"));
        }

        std::fs::create_dir_all(&self.config.index_dir)?;
        let suffix = self.fresh_suffix();

        let tmp = |path: &Path| path.with_extension("tmp");
        let terms_path = self.config.terms_path(&suffix);
        let frequencies_path = self.config.frequencies_path(&suffix);
        let positions_path = self.config.positions_path(&suffix);
        let filemap_path = self.config.filemap_path(&suffix);

        let mut terms = CountingWriter::new(BufWriter::new(File::create(tmp(&terms_path))?));
        let mut frequencies =
            CountingWriter::new(BufWriter::new(File::create(tmp(&frequencies_path))?));
        let mut positions =
            CountingWriter::new(BufWriter::new(File::create(tmp(&positions_path))?));

        let count = built.entries.len() as u64;
        write_vnum(&mut terms, count)?;
        write_vnum(&mut frequencies, count)?;
        write_vnum(&mut positions, count)?;

        for entry in &built.entries {
            write_str(&mut terms, &entry.key)?;
            write_vnum(&mut terms, frequencies.position())?;
            write_vnum(&mut terms, positions.position())?;

            write_tiers(&mut frequencies, &entry.frequencies())?;
            write_positions(&mut positions, &entry.postings)?;
        }

        let mut filemap = CountingWriter::new(BufWriter::new(File::create(tmp(&filemap_path))?));
        write_vnum(&mut filemap, built.filemap.len() as u64)?;
        for pair in &built.filemap {
            write_vnum(&mut filemap, u64::from(pair.document_id))?;
            write_str(&mut filemap, &pair.file_name)?;
        }

        let mut combined = Hasher::new();
        for writer in [terms, frequencies, positions, filemap] {
            let (buffered, crc) = writer.finish()?;
            buffered.into_inner().map_err(|e| e.into_error())?.sync_all()?;
            combined.update(&crc.to_le_bytes());
        }
        let checksum = u64::from(combined.finalize());

        for path in [&terms_path, &frequencies_path, &positions_path, &filemap_path] {
            std::fs::rename(tmp(path), path)?;
        }

        let mut registry = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.registry_path())?;
        writeln!(registry, "{suffix}")?;

        info!(
            %suffix,
            terms = built.entries.len(),
            documents = built.filemap.len(),
            checksum,
            "published index"
        );
        Ok(suffix)
    }

    fn fresh_suffix(&self) -> String {
        let mut suffix = random_suffix(SUFFIX_LEN);
        // A collision with an already-published suffix gets a longer, far
        // less collidable one.
        if self.config.terms_path(&suffix).exists() {
            suffix.push_str(&random_suffix(SUFFIX_LEN * 10));
        }
        suffix
    }
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
