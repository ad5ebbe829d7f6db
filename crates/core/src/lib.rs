// Endpoint catalog and discovery engine for the IBM Security Verify gateway

pub mod catalog;
pub mod categories;
pub mod error;
pub mod search;
pub mod types;

pub use catalog::EndpointCatalog;
pub use categories::{CategoryIndex, CategorySummary};
pub use error::{CoreError, CoreResult};
pub use search::{MatchTier, SearchEngine, SearchRequest, SearchResult};
pub use types::*;
