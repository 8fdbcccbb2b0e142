pub mod document;
pub mod error;
pub mod index;
pub mod normalize;
pub mod persist;
pub mod records;
pub mod search;
pub mod tokenizer;

pub use document::{Author, DocId, Document};
pub use error::PersistError;
pub use index::{Index, IndexStats};
pub use normalize::normalize;
pub use search::{EngineStats, Hit, SearchEngine};
