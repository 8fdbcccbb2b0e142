use crate::tokenizer::tokenize;
use crate::{DocId, Document};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// term -> doc -> ordered token positions
pub type PositionalIndex = BTreeMap<String, BTreeMap<DocId, Vec<u32>>>;
/// term -> doc -> raw frequency
pub type TfIndex = BTreeMap<String, BTreeMap<DocId, u32>>;
/// Sparse tf-idf vector, nonzero terms only.
pub type TermVector = BTreeMap<String, f64>;

/// Smoothed inverse document frequency, `ln((N+1)/(df+1)) + 1`. Positive for every `df <= N`.
pub fn smoothed_idf(num_docs: usize, df: usize) -> f64 {
    ((num_docs as f64 + 1.0) / (df as f64 + 1.0)).ln() + 1.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub documents: BTreeMap<DocId, Document>,
    pub inverted_index: PositionalIndex,
    pub tf_index: TfIndex,
    pub idf: BTreeMap<String, f64>,
    pub doc_vectors: BTreeMap<DocId, TermVector>,
    pub doc_norms: BTreeMap<DocId, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub unique_terms: usize,
    pub total_postings: usize,
    pub avg_norm: f64,
}

/// Accumulates postings for one build. Nested entries are only ever created through
/// `positions_mut` and `frequency_mut`.
#[derive(Default)]
struct IndexBuilder {
    inverted_index: PositionalIndex,
    tf_index: TfIndex,
}

impl IndexBuilder {
    fn positions_mut(&mut self, term: &str, doc_id: &DocId) -> &mut Vec<u32> {
        self.inverted_index.entry(term.to_owned()).or_default().entry(doc_id.clone()).or_default()
    }

    fn frequency_mut(&mut self, term: &str, doc_id: &DocId) -> &mut u32 {
        self.tf_index.entry(term.to_owned()).or_default().entry(doc_id.clone()).or_insert(0)
    }

    fn add(&mut self, doc_id: &DocId, tokens: &[String]) -> BTreeMap<String, u32> {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for (pos, term) in tokens.iter().enumerate() {
            self.positions_mut(term, doc_id).push(pos as u32);
            *self.frequency_mut(term, doc_id) += 1;
            *counts.entry(term.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl Index {
    /// Builds the full index in one pass per document. A document whose content yields no
    /// tokens gets an empty vector and a zero norm.
    pub fn build(documents: BTreeMap<DocId, Document>) -> Self {
        let n = documents.len();
        tracing::info!(num_docs = n, "building positional index");

        let mut builder = IndexBuilder::default();
        let mut per_doc: Vec<(DocId, BTreeMap<String, u32>)> = Vec::with_capacity(n);
        for (doc_id, doc) in &documents {
            let tokens = tokenize(&doc.content);
            let counts = builder.add(doc_id, &tokens);
            per_doc.push((doc_id.clone(), counts));
        }

        let idf: BTreeMap<String, f64> = builder
            .tf_index
            .iter()
            .map(|(term, postings)| (term.clone(), smoothed_idf(n, postings.len())))
            .collect();

        let mut doc_vectors = BTreeMap::new();
        let mut doc_norms = BTreeMap::new();
        for (doc_id, counts) in per_doc {
            let vector: TermVector = counts
                .into_iter()
                .map(|(term, tf)| {
                    let weight = tf as f64 * idf[&term];
                    (term, weight)
                })
                .filter(|(_, w)| *w != 0.0)
                .collect();
            let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt();
            doc_norms.insert(doc_id.clone(), norm);
            doc_vectors.insert(doc_id, vector);
        }

        let index = Self {
            documents,
            inverted_index: builder.inverted_index,
            tf_index: builder.tf_index,
            idf,
            doc_vectors,
            doc_norms,
        };
        let stats = index.stats();
        tracing::info!(
            documents = stats.documents,
            unique_terms = stats.unique_terms,
            total_postings = stats.total_postings,
            avg_norm = stats.avg_norm,
            "index build complete"
        );
        index
    }

    pub fn num_docs(&self) -> usize { self.documents.len() }
    pub fn num_terms(&self) -> usize { self.idf.len() }

    pub fn stats(&self) -> IndexStats {
        let avg_norm = if self.doc_norms.is_empty() {
            0.0
        } else {
            self.doc_norms.values().sum::<f64>() / self.doc_norms.len() as f64
        };
        IndexStats {
            documents: self.documents.len(),
            unique_terms: self.inverted_index.len(),
            total_postings: self.inverted_index.values().map(|docs| docs.len()).sum(),
            avg_norm,
        }
    }
}
