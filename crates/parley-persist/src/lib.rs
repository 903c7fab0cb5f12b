pub mod error;
pub mod history;
pub mod memory;
pub mod models;
pub mod row_store;

#[cfg(feature = "mongodb")]
pub mod dbs;

pub use error::{PersistError, Result};
pub use history::HistoryStore;
pub use memory::MemoryRowStore;
pub use models::{MessageRow, PurgeReport};
pub use row_store::RowStore;

#[cfg(feature = "mongodb")]
pub use dbs::mongo::MongoRowStore;
