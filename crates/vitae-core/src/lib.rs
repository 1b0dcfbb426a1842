pub mod accessor;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod storage;

pub use config::AppConfig;
pub use error::{ExitCode, Result, VitaeError};
pub use extract::{extract_data, extract_publications};
pub use models::*;
pub use storage::{CachedRecord, IdentifierMap, RecordCache};
