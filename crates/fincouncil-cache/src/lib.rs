pub mod error;
pub mod memory;
pub mod response;
pub mod sqlite;
pub mod store;
pub mod tiered;

pub use error::StoreError;
pub use memory::MemoryCache;
pub use response::ResponseCache;
pub use sqlite::SqliteSessionStore;
pub use store::{MemorySessionStore, SessionStore};
pub use tiered::TieredSessionStore;
