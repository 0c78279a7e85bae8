pub mod engine;
mod matcher;
pub mod types;
pub mod worker;

pub use engine::{DEFAULT_LIMIT, MIN_SCOPED_RESULTS, SuggestionEngine, merge_candidates};
pub use matcher::SeedMatcher;
pub use types::{QueryError, SuggestionQuery, WorkerRequest, WorkerResponse};
pub use worker::WorkerHandle;
