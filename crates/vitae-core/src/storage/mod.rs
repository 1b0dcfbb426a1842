pub mod mapping;
pub mod record_cache;

pub use mapping::IdentifierMap;
pub use record_cache::{CachedRecord, RecordCache};
