use crate::error::PersistError;
use crate::records::DetailSnapshot;
use crate::{DocId, Document, Index};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHeader {
    pub version: u32,
    pub created_at: String,
    pub num_docs: usize,
    pub num_terms: usize,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    header: IndexHeader,
    index: &'a Index,
}

#[derive(Deserialize)]
struct IndexFile {
    header: IndexHeader,
    index: Index,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PersistError {
    let path = path.to_path_buf();
    move |source| PersistError::Io { path, source }
}

fn ensure_parent(path: &Path) -> Result<(), PersistError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }
    Ok(())
}

/// Writes `bytes` next to `path` and renames over it, so readers never see a half-written file.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    ensure_parent(path)?;
    let tmp = path.with_extension("tmp");
    {
        let mut f = File::create(&tmp).map_err(io_err(&tmp))?;
        f.write_all(bytes).map_err(io_err(&tmp))?;
        f.sync_all().map_err(io_err(&tmp))?;
    }
    fs::rename(&tmp, path).map_err(io_err(path))
}

/// Persist the whole index as one bincode blob with a versioned header.
pub fn save_index(path: &Path, index: &Index) -> Result<IndexHeader, PersistError> {
    let header = IndexHeader {
        version: INDEX_VERSION,
        created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        num_docs: index.num_docs(),
        num_terms: index.num_terms(),
    };
    let bytes = bincode::serialize(&IndexFileRef { header: header.clone(), index })?;
    write_atomically(path, &bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "index saved");
    Ok(header)
}

pub fn load_index(path: &Path) -> Result<Index, PersistError> {
    let mut f = File::open(path).map_err(io_err(path))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf).map_err(io_err(path))?;
    let file: IndexFile = bincode::deserialize(&buf)?;
    if file.header.version != INDEX_VERSION {
        return Err(PersistError::Version { found: file.header.version, expected: INDEX_VERSION });
    }
    tracing::info!(
        path = %path.display(),
        num_docs = file.header.num_docs,
        created_at = %file.header.created_at,
        "index loaded"
    );
    Ok(file.index)
}

pub fn save_documents(path: &Path, documents: &BTreeMap<DocId, Document>) -> Result<(), PersistError> {
    let json = serde_json::to_vec_pretty(documents)?;
    write_atomically(path, &json)
}

pub fn load_documents(path: &Path) -> Result<BTreeMap<DocId, Document>, PersistError> {
    let f = File::open(path).map_err(io_err(path))?;
    Ok(serde_json::from_reader(BufReader::new(f))?)
}

/// Loads the detail snapshot; a missing file is an empty snapshot.
pub fn load_snapshot(path: &Path) -> Result<DetailSnapshot, PersistError> {
    if !path.exists() {
        return Ok(DetailSnapshot::default());
    }
    let f = File::open(path).map_err(io_err(path))?;
    Ok(serde_json::from_reader(BufReader::new(f))?)
}

pub fn save_snapshot(path: &Path, snapshot: &DetailSnapshot) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    write_atomically(path, &bytes)
}
