pub mod error;
pub mod index;
pub mod pagerank;
pub mod query;
pub mod store;
pub mod tokenizer;

pub use error::StoreError;
pub use index::{LinkId, LinkRow, PageCommit, PageLink, PageUnit, Position, StoreStats, UrlId, WordId};
pub use store::IndexStore;
