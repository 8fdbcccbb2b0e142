//! Durable crawl state: append-only JSONL record stores and the in-memory seen set.

use crate::error::CrawlError;
use parking_lot::Mutex;
use pubsearch_core::records::{PersonRecord, PublicationStub};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Trailing slashes stripped, lowercased. This is the dedup key for every stored url.
pub fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_lowercase()
}

/// Lowercased with whitespace and periods removed, so "J. Doe" and "j doe" collide.
pub fn normalize_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace() && *c != '.').flat_map(char::to_lowercase).collect()
}

/// Records that carry their own url key.
pub trait UrlKeyed {
    fn url(&self) -> &str;
}

impl UrlKeyed for PersonRecord {
    fn url(&self) -> &str { &self.url }
}

impl UrlKeyed for PublicationStub {
    fn url(&self) -> &str { &self.url }
}

/// Reads every decodable line of a JSONL file. A missing file reads as empty; undecodable
/// lines (a torn final write, say) are skipped with a warning.
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, CrawlError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        match serde_json::from_str(&line) {
            Ok(rec) => records.push(rec),
            Err(err) => tracing::warn!(path = %path.display(), line = lineno + 1, %err, "skipping undecodable record"),
        }
    }
    Ok(records)
}

/// Append-only JSONL store. Every append goes straight to the file under a lock, so a record
/// is on disk as soon as `append` returns and concurrent appends never interleave.
pub struct RecordStore<T> {
    file: Mutex<File>,
    _records: PhantomData<fn(T)>,
}

impl<T: Serialize + DeserializeOwned> RecordStore<T> {
    /// Opens (creating if needed) the store at `path` and returns the records already in it.
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, Vec<T>), CrawlError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let existing = load_records(&path)?;
        let mut file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;
        if needs_newline(&mut file)? {
            file.write_all(b"\n")?;
        }
        Ok((Self { file: Mutex::new(file), _records: PhantomData }, existing))
    }

    pub fn append(&self, record: &T) -> Result<(), CrawlError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

fn needs_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.seek(SeekFrom::End(0))?;
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Normalized urls already handled, shared by every task of a phase.
#[derive(Default)]
pub struct SeenSet(Mutex<HashSet<String>>);

impl SeenSet {
    pub fn from_records<R: UrlKeyed>(records: &[R]) -> Self {
        Self(Mutex::new(records.iter().map(|r| normalize_url(r.url())).collect()))
    }

    /// Marks `url` as seen; false if it already was.
    pub fn claim(&self, url: &str) -> bool {
        self.0.lock().insert(url.to_string())
    }
}
