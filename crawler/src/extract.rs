//! Field extraction for the three page types the crawler visits.
//!
//! Callers hand over raw HTML and get plain structs back; nothing about the markup parser
//! leaks out of this module.

use lazy_static::lazy_static;
use pubsearch_core::records::RawAuthor;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

lazy_static! {
    static ref HEADING: Selector = Selector::parse("h1").expect("valid selector");
    static ref ORGANISATION: Selector = Selector::parse(r#"a[rel~="Organisation"]"#).expect("valid selector");
    static ref RELATED_PERSONS: Selector = Selector::parse("p.relations.persons").expect("valid selector");
    static ref ABSTRACT: Selector =
        Selector::parse(r#"div[class*="rendering_abstractportal"] .textblock"#).expect("valid selector");
    static ref CITATIONS: Selector = Selector::parse("div.metric.scopus-citations span.count").expect("valid selector");
    static ref PROPERTY_ROWS: Selector = Selector::parse("table.properties tr").expect("valid selector");
    static ref TH: Selector = Selector::parse("th").expect("valid selector");
    static ref TD: Selector = Selector::parse("td").expect("valid selector");
    static ref DOI_LINK: Selector = Selector::parse(r#"a[href*="doi.org"]"#).expect("valid selector");
}

pub trait PageExtract: Sized {
    fn extract(doc: &Html, base: &Url) -> Self;

    fn from_html(html: &str, base: &Url) -> Self {
        Self::extract(&Html::parse_document(html), base)
    }
}

/// Element text with runs of whitespace collapsed to one space.
fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector).next().map(element_text).filter(|t| !t.is_empty())
}

fn absolutize(base: &Url, href: &str) -> String {
    if href.starts_with("http") {
        return href.to_string();
    }
    base.join(href).map(String::from).unwrap_or_else(|_| format!("{}{}", base.as_str().trim_end_matches('/'), href))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonPage {
    pub name: String,
    pub department: String,
}

impl PageExtract for PersonPage {
    fn extract(doc: &Html, _base: &Url) -> Self {
        Self {
            name: first_text(doc, &HEADING).unwrap_or_default(),
            department: first_text(doc, &ORGANISATION).unwrap_or_default(),
        }
    }
}

/// Author list from the "related persons" paragraph: plain comma separated names mixed with
/// links to person profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedPersons(pub Vec<RawAuthor>);

impl PageExtract for RelatedPersons {
    fn extract(doc: &Html, base: &Url) -> Self {
        let mut authors = Vec::new();
        let Some(block) = doc.select(&RELATED_PERSONS).next() else {
            return Self(authors);
        };
        for child in block.children() {
            match child.value() {
                Node::Text(text) => {
                    for name in text.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                        authors.push(RawAuthor { name: name.split_whitespace().collect::<Vec<_>>().join(" "), url: None });
                    }
                }
                Node::Element(el) if el.name() == "a" => {
                    let Some(link) = ElementRef::wrap(child) else { continue };
                    let name = element_text(link);
                    if name.is_empty() { continue; }
                    let url = el.attr("href").map(|href| absolutize(base, href));
                    authors.push(RawAuthor { name, url });
                }
                _ => {}
            }
        }
        Self(authors)
    }
}

impl RelatedPersons {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|a| a.name.as_str())
    }
}

/// Rows of the properties table that the snapshot keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    pub journal: Option<String>,
    pub volume: Option<String>,
    pub pages: Option<String>,
    pub article_number: Option<String>,
    pub doi: Option<String>,
    pub publication_date: Option<String>,
    pub early_online_date: Option<String>,
}

impl Properties {
    fn extract(doc: &Html) -> Self {
        let mut props = Self::default();
        for row in doc.select(&PROPERTY_ROWS) {
            let (Some(th), Some(td)) = (row.select(&TH).next(), row.select(&TD).next()) else { continue };
            let label = element_text(th).to_lowercase();
            let value = element_text(td);
            let slot = match label.as_str() {
                "journal" => &mut props.journal,
                "volume" => &mut props.volume,
                "number of pages" => &mut props.pages,
                "article number" => &mut props.article_number,
                "dois" => {
                    props.doi = Some(td.select(&DOI_LINK).next().map(element_text).unwrap_or(value));
                    continue;
                }
                "publication status" => &mut props.publication_date,
                "early online date" => &mut props.early_online_date,
                _ => continue,
            };
            *slot = Some(value);
        }
        props
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationPage {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub authors: Vec<RawAuthor>,
    /// Scopus citation count; `None` when missing or not a number.
    pub citations: Option<u32>,
    pub properties: Properties,
}

impl PageExtract for PublicationPage {
    fn extract(doc: &Html, base: &Url) -> Self {
        Self {
            title: first_text(doc, &HEADING),
            abstract_text: first_text(doc, &ABSTRACT),
            authors: RelatedPersons::extract(doc, base).0,
            citations: first_text(doc, &CITATIONS).and_then(|c| c.parse().ok()),
            properties: Properties::extract(doc),
        }
    }
}
