//! Document id to filename resolution

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::codec::{read_str, read_vnum_u32};
use crate::error::Result;
use crate::index::types::DocId;

/// In-memory copy of one published filemap.
#[derive(Debug, Default)]
pub struct FileMap {
    map: HashMap<DocId, String>,
}

impl FileMap {
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let count = read_vnum_u32(&mut reader)?;
        let mut map = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let document_id = read_vnum_u32(&mut reader)?;
            let file_name = read_str(&mut reader)?;
            map.insert(document_id, file_name);
        }
        Ok(Self { map })
    }

    /// Look up a document's filename; an unknown id is `None`, not an
    /// error.
    pub fn resolve(&self, document_id: DocId) -> Option<&str> {
        self.map.get(&document_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
