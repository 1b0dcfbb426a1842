//! Walks a canonical ORCID record and produces the in-memory entity set.
//!
//! Missing or malformed substructures degrade to omission; nothing here
//! returns an error.

pub mod data;
pub mod publications;

pub use data::extract_data;
pub use publications::extract_publications;
