pub mod data;
pub mod publication;
pub mod record;
pub mod year_filter;

pub use data::*;
pub use publication::*;
pub use record::*;
pub use year_filter::*;
