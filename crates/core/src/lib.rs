pub mod config;
pub mod error;
pub mod filter;
pub mod ids;
pub mod model;
pub mod query;
pub mod stack;
pub mod summary;

pub use error::{CallscopeError, Result};
pub use summary::{Summary, aggregate};
