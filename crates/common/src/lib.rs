//! Proctest Common Library
//!
//! Shared value model, fixture loading and process selection for the
//! process conformance suite.

pub mod datetime;
pub mod error;
pub mod graph;
pub mod registry;
pub mod selection;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use datetime::{datetime_to_isostr, isostr_to_datetime, Timestamp};
pub use error::{Error, Result};
pub use registry::ProcessRegistry;
pub use selection::{csv_to_list, ProcessFilters, Selection};
pub use types::*;
pub use value::{Map, Value};

/// Proctest version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
