use crate::records::{DetailSnapshot, PublicationDetail};
use crate::tokenizer::normalize_text;
use crate::{Author, DocId, Document};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

lazy_static! {
    static ref YEAR: Regex = Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid regex");
}

/// "Jane Q Public" -> "Public, J. Q."; names with fewer than two words are left alone.
pub fn format_author_name(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.as_slice() {
        [] => name.to_string(),
        [single] => single.to_string(),
        [given @ .., surname] => {
            let initials: Vec<String> = given
                .iter()
                .filter_map(|p| p.chars().next())
                .map(|c| format!("{}.", c.to_uppercase()))
                .collect();
            format!("{}, {}", surname, initials.join(" "))
        }
    }
}

/// First 19xx/20xx year anywhere in a free-text date.
pub fn extract_year(date: &str) -> Option<u16> {
    YEAR.find(date).and_then(|m| m.as_str().parse().ok())
}

fn to_document(doc_id: DocId, detail: &PublicationDetail) -> Document {
    let title = detail.title.clone().unwrap_or_default();
    let abstract_text = detail.abstract_text.clone().unwrap_or_default();
    let authors = detail
        .authors
        .iter()
        .map(|a| Author { name: format_author_name(&a.name), profile_url: a.url.clone() })
        .collect();
    Document {
        doc_id,
        year: detail.publication_date.as_deref().and_then(extract_year),
        authors,
        publication_url: detail.url.clone(),
        journal: detail.journal.clone().unwrap_or_default(),
        volume: detail.volume.clone().unwrap_or_default(),
        pages: detail.pages.clone().unwrap_or_default(),
        doi: detail.doi.clone().unwrap_or_default(),
        citations: detail.citations.unwrap_or(0),
        content: normalize_text(&format!("{title} {abstract_text}")),
        title,
        abstract_text,
    }
}

/// Turns the crawler snapshot into canonical documents.
///
/// Ids are handed out in snapshot order starting at `DOC_0001`; a url seen twice only yields
/// the first copy.
pub fn normalize(snapshot: &DetailSnapshot) -> BTreeMap<DocId, Document> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut documents = BTreeMap::new();
    for detail in &snapshot.publications {
        if !seen.insert(detail.url.as_str()) {
            continue;
        }
        let doc_id = DocId::from_seq(documents.len() + 1);
        documents.insert(doc_id.clone(), to_document(doc_id, detail));
    }
    tracing::info!(documents = documents.len(), "normalized publications");
    documents
}
