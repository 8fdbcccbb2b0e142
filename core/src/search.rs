use crate::error::PersistError;
use crate::index::TermVector;
use crate::persist::load_index;
use crate::tokenizer::tokenize;
use crate::{DocId, Document, Index};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

/// One ranked result, borrowed from the engine's index.
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    pub doc_id: &'a DocId,
    pub score: f64,
    pub document: &'a Document,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub total_documents: usize,
    pub total_terms: usize,
    pub avg_doc_length: f64,
}

/// Query vector keyed by stem.
pub type QueryVector<'q> = HashMap<&'q str, f64>;

pub fn norm<'a, I: IntoIterator<Item = &'a f64>>(weights: I) -> f64 {
    weights.into_iter().map(|w| w * w).sum::<f64>().sqrt()
}

/// `dot(q, d) / (|q| * |d|)`, or 0 when either norm is zero.
pub fn cosine_similarity(query: &QueryVector<'_>, query_norm: f64, doc: &TermVector, doc_norm: f64) -> f64 {
    if query_norm == 0.0 || doc_norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = query.iter().filter_map(|(term, q)| doc.get(*term).map(|d| q * d)).sum();
    dot / (query_norm * doc_norm)
}

/// TF-IDF cosine search over an in-memory index. The index is never mutated after
/// construction, so one engine can serve any number of concurrent searches.
pub struct SearchEngine {
    index: Index,
}

impl SearchEngine {
    pub fn new(index: Index) -> Self {
        tracing::info!(documents = index.num_docs(), terms = index.num_terms(), "search engine initialized");
        Self { index }
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        Ok(Self::new(load_index(path)?))
    }

    pub fn index(&self) -> &Index { &self.index }

    pub fn document(&self, doc_id: &DocId) -> Option<&Document> { self.index.documents.get(doc_id) }

    /// Raw query term frequency times corpus idf; terms the corpus never saw weigh 0.
    pub fn query_vector<'q>(&self, terms: &'q [String]) -> QueryVector<'q> {
        let mut counts: HashMap<&'q str, u32> = HashMap::new();
        for term in terms {
            *counts.entry(term.as_str()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|(term, tf)| (term, tf as f64 * self.index.idf.get(term).copied().unwrap_or(0.0)))
            .collect()
    }

    /// Every document with a positive score, best first. Ties go to the larger doc id.
    pub fn rank(&self, query: &str) -> Vec<Hit<'_>> {
        let terms = tokenize(query);
        if terms.is_empty() {
            tracing::debug!(query, "query produced no terms");
            return Vec::new();
        }
        let query_vec = self.query_vector(&terms);
        let query_norm = norm(query_vec.values());

        let mut hits: Vec<Hit<'_>> = self
            .index
            .doc_vectors
            .iter()
            .filter_map(|(doc_id, vector)| {
                let doc_norm = self.index.doc_norms.get(doc_id).copied().unwrap_or(0.0);
                let score = cosine_similarity(&query_vec, query_norm, vector, doc_norm);
                if score <= 0.0 {
                    return None;
                }
                let document = self.index.documents.get(doc_id)?;
                Some(Hit { doc_id, score, document })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then_with(|| b.doc_id.cmp(a.doc_id))
        });
        hits
    }

    pub fn search(&self, query: &str, top_n: usize) -> Vec<Hit<'_>> {
        let mut hits = self.rank(query);
        hits.truncate(top_n);
        hits
    }

    pub fn statistics(&self) -> EngineStats {
        let total_documents = self.index.num_docs();
        let total_tokens: u64 = self.index.tf_index.values().flat_map(|docs| docs.values()).map(|&tf| tf as u64).sum();
        EngineStats {
            total_documents,
            total_terms: self.index.num_terms(),
            avg_doc_length: if total_documents == 0 { 0.0 } else { total_tokens as f64 / total_documents as f64 },
        }
    }
}
