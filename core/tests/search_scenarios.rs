use pubsearch_core::index::smoothed_idf;
use pubsearch_core::persist::{load_index, save_index};
use pubsearch_core::records::{DetailSnapshot, PublicationDetail};
use pubsearch_core::tokenizer::tokenize;
use pubsearch_core::{normalize, DocId, Document, Index, SearchEngine};
use std::collections::BTreeMap;
use tempfile::tempdir;

fn doc(seq: usize, content: &str) -> (DocId, Document) {
    let doc_id = DocId::from_seq(seq);
    let d = Document {
        doc_id: doc_id.clone(),
        title: content.to_string(),
        year: Some(2020),
        authors: vec![],
        publication_url: format!("https://example.org/en/publications/{seq}"),
        journal: String::new(),
        volume: String::new(),
        pages: String::new(),
        doi: String::new(),
        citations: 0,
        abstract_text: String::new(),
        content: content.to_string(),
    };
    (doc_id, d)
}

fn corpus(contents: &[&str]) -> BTreeMap<DocId, Document> {
    contents.iter().enumerate().map(|(i, c)| doc(i + 1, c)).collect()
}

fn ids(engine: &SearchEngine, query: &str) -> Vec<String> {
    engine.search(query, 10).iter().map(|h| h.doc_id.to_string()).collect()
}

#[test]
fn machine_learning_scenario() {
    let engine = SearchEngine::new(Index::build(corpus(&[
        "machine learning health",
        "machine learning finance",
        "cooking recipes",
    ])));
    let hits = engine.search("machine learning", 10);
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.score > 0.0));
    let found: Vec<_> = hits.iter().map(|h| h.doc_id.as_str()).collect();
    assert!(found.contains(&"DOC_0001"));
    assert!(found.contains(&"DOC_0002"));
    assert!(!found.contains(&"DOC_0003"));
}

#[test]
fn ties_prefer_the_larger_doc_id() {
    let engine = SearchEngine::new(Index::build(corpus(&[
        "neural network pruning",
        "neural network pruning",
        "graph theory",
    ])));
    let hits = engine.search("neural pruning", 10);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].score, hits[1].score);
    assert_eq!(hits[0].doc_id.as_str(), "DOC_0002");
    assert_eq!(hits[1].doc_id.as_str(), "DOC_0001");
}

#[test]
fn better_matches_rank_first_and_top_n_truncates() {
    let engine = SearchEngine::new(Index::build(corpus(&[
        "ocean temperature",
        "ocean temperature salinity currents",
        "ocean",
        "volcano",
    ])));
    let ranked = ids(&engine, "ocean temperature");
    // the short "ocean" document is closer in direction than the long one
    assert_eq!(ranked, vec!["DOC_0001", "DOC_0003", "DOC_0002"]);
    assert_eq!(engine.search("ocean temperature", 1).len(), 1);
    assert!(engine.search("ocean", 0).is_empty());
}

#[test]
fn stopword_only_or_unknown_queries_are_empty() {
    let engine = SearchEngine::new(Index::build(corpus(&["solar cells", "wind turbines"])));
    assert!(engine.search("the and of", 5).is_empty());
    assert!(engine.search("!!!", 5).is_empty());
    assert!(engine.search("zeppelin", 5).is_empty());
}

#[test]
fn doc_norm_is_zero_exactly_for_empty_content() {
    let index = Index::build(corpus(&["bridge design", "", "the of and to", "steel"]));
    for (doc_id, document) in &index.documents {
        let empty = tokenize(&document.content).is_empty();
        assert_eq!(index.doc_norms[doc_id] == 0.0, empty, "{doc_id}");
        assert_eq!(index.doc_vectors[doc_id].is_empty(), empty);
    }
}

#[test]
fn idf_is_positive_and_falls_with_document_frequency() {
    let index = Index::build(corpus(&["apple banana cherry", "banana cherry", "cherry"]));
    let idf = |word: &str| index.idf[&tokenize(word)[0]];
    assert!(idf("cherry") > 0.0);
    assert!(idf("apple") > idf("banana"));
    assert!(idf("banana") > idf("cherry"));
    assert!((idf("cherry") - smoothed_idf(3, 3)).abs() < 1e-12);
}

#[test]
fn scaling_term_frequencies_keeps_rank() {
    let query = "alpha";
    let base = SearchEngine::new(Index::build(corpus(&["alpha beta", "alpha gamma gamma", "delta"])));
    let scaled = SearchEngine::new(Index::build(corpus(&[
        "alpha beta alpha beta alpha beta",
        "alpha gamma gamma",
        "delta",
    ])));
    assert_eq!(ids(&base, query), ids(&scaled, query));
    let before = base.search(query, 10);
    let after = scaled.search(query, 10);
    for (b, a) in before.iter().zip(after.iter()) {
        assert!((b.score - a.score).abs() < 1e-9);
    }
}

#[test]
fn persisted_index_reloads_identically() {
    let index = Index::build(corpus(&["lattice boltzmann methods", "boltzmann machines", ""]));
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.bin");
    let header = save_index(&path, &index).unwrap();
    assert_eq!(header.num_docs, 3);

    let loaded = load_index(&path).unwrap();
    assert_eq!(loaded.documents, index.documents);
    assert_eq!(loaded.doc_vectors, index.doc_vectors);
    assert_eq!(loaded.doc_norms, index.doc_norms);
    assert_eq!(loaded, index);

    let engine = SearchEngine::load(&path).unwrap();
    assert_eq!(ids(&engine, "boltzmann"), ids(&SearchEngine::new(index), "boltzmann"));
}

#[test]
fn publication_without_properties_is_still_retrievable_by_title() {
    let snapshot = DetailSnapshot {
        publications: vec![
            PublicationDetail {
                url: "https://example.org/en/publications/bare".into(),
                title: Some("Stochastic Epidemic Modelling".into()),
                ..Default::default()
            },
            PublicationDetail {
                url: "https://example.org/en/publications/full".into(),
                title: Some("Coastal Erosion".into()),
                abstract_text: Some("Sediment transport along beaches.".into()),
                journal: Some("Coastal Engineering".into()),
                doi: Some("10.1000/xyz".into()),
                citations: Some(12),
                ..Default::default()
            },
        ],
    };
    let documents = normalize(&snapshot);
    let bare = &documents[&DocId::from_seq(1)];
    assert_eq!((bare.journal.as_str(), bare.volume.as_str(), bare.doi.as_str()), ("", "", ""));

    let engine = SearchEngine::new(Index::build(documents));
    let hits = engine.search("epidemic", 5);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.title, "Stochastic Epidemic Modelling");
    assert_eq!(hits[0].document.citations, 0);
}

#[test]
fn statistics_and_lookup() {
    let engine = SearchEngine::new(Index::build(corpus(&["graph coloring", "graph"])));
    let stats = engine.statistics();
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.total_terms, 2);
    assert!((stats.avg_doc_length - 1.5).abs() < 1e-12);
    assert!(engine.document(&DocId::from_seq(2)).is_some());
    assert!(engine.document(&DocId::from_seq(9)).is_none());
}
