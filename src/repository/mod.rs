pub mod documents;
pub mod memory;
pub mod record;

pub use documents::{DocumentSource, FsDocumentSource, MemoryDocumentSource};
pub use memory::MemoryStore;
pub use record::{ConflictRepository, RecordStore, SurrealStore};
