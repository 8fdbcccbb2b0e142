use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable document identifier, `DOC_0001`, `DOC_0002`, ...
///
/// Ordering is plain string ordering, which the search engine uses to break score ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    pub fn from_seq(seq: usize) -> Self { Self(format!("DOC_{seq:04}")) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<String> for DocId {
    fn from(s: String) -> Self { Self(s) }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// "Surname, I. I." form.
    pub name: String,
    pub profile_url: Option<String>,
}

/// Canonical indexable publication.
// No skip_serializing_if here: the index blob is bincode and needs every field present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: DocId,
    pub title: String,
    pub year: Option<u16>,
    pub authors: Vec<Author>,
    pub publication_url: String,
    pub journal: String,
    pub volume: String,
    pub pages: String,
    pub doi: String,
    pub citations: u32,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Normalized title + abstract, ready for the tokenizer.
    pub content: String,
}
