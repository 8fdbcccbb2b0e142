//! Raw records produced by the crawler and consumed by the normalizer.

use serde::de::{Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One line of the persons store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub url: String,
    pub name: String,
    pub department: String,
    pub interested: bool,
}

impl PersonRecord {
    /// Stand-in for a person page that could not be fetched. Persisting it keeps the url
    /// out of every later run.
    pub fn placeholder(url: impl Into<String>) -> Self {
        Self { url: url.into(), name: String::new(), department: String::new(), interested: false }
    }
}

/// One line of the publications store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationStub {
    pub url: String,
    pub interested: bool,
}

impl PublicationStub {
    pub fn placeholder(url: impl Into<String>) -> Self {
        Self { url: url.into(), interested: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAuthor {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Fields scraped from a publication page. Anything the page did not carry stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicationDetail {
    pub url: String,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub authors: Vec<RawAuthor>,
    #[serde(alias = "citations_scopus")]
    pub citations: Option<u32>,
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub pages: Option<String>,
    pub article_number: Option<String>,
    pub doi: Option<String>,
    pub publication_date: Option<String>,
    pub early_online_date: Option<String>,
}

/// The detail snapshot (`data.json`): publication details in discovery order, unique by url.
///
/// Written as a list. Snapshots keyed by url (`{"publications": {url: {...}}}`) load too,
/// in file order, with the key filling in a missing `url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailSnapshot {
    #[serde(default, deserialize_with = "list_or_url_map")]
    pub publications: Vec<PublicationDetail>,
}

fn list_or_url_map<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<PublicationDetail>, D::Error> {
    struct Publications;

    impl<'de> Visitor<'de> for Publications {
        type Value = Vec<PublicationDetail>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a list of publications or a map of url to publication")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut publications = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(detail) = seq.next_element()? {
                publications.push(detail);
            }
            Ok(publications)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut publications = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((url, mut detail)) = map.next_entry::<String, PublicationDetail>()? {
                if detail.url.is_empty() {
                    detail.url = url;
                }
                publications.push(detail);
            }
            Ok(publications)
        }
    }

    deserializer.deserialize_any(Publications)
}

impl DetailSnapshot {
    pub fn len(&self) -> usize { self.publications.len() }
    pub fn is_empty(&self) -> bool { self.publications.is_empty() }

    pub fn urls(&self) -> HashSet<&str> {
        self.publications.iter().map(|p| p.url.as_str()).collect()
    }

    /// Appends details whose url is not in the snapshot yet; returns how many were added.
    pub fn merge<I: IntoIterator<Item = PublicationDetail>>(&mut self, details: I) -> usize {
        let mut known: HashSet<String> = self.publications.iter().map(|p| p.url.clone()).collect();
        let mut added = 0;
        for detail in details {
            if known.insert(detail.url.clone()) {
                self.publications.push(detail);
                added += 1;
            }
        }
        added
    }
}
