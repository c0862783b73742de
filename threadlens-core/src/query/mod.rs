// Query layer — deterministic SQL construction and result memoization.

pub mod builder;
pub mod cache;

pub use builder::{BuiltQuery, QueryBuilder, SqlValue};
pub use cache::ResultCache;
