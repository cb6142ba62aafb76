pub mod codec;
pub mod error;
mod index;
pub mod indexes;
pub mod mapping;
pub mod page;
pub mod posting;
pub mod relation;
pub mod store;
pub mod tokenizer;
pub mod vsm;

pub use error::{IndexError, Result};
pub use index::{max_frequency, DocId, PageRecord, Posting, TermFrequency, TermId};
pub use indexes::{IndexPaths, IndexSet};
pub use store::{KvStore, StoreOptions};
pub use tokenizer::{EnglishTokenizer, Tokenizer};
pub use vsm::VectorSpaceModel;
