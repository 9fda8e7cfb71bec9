pub mod context;
pub mod enricher;
pub mod error;

pub use context::EnrichmentContext;
pub use enricher::{CaseEnricher, CaseFailure, CaseOutcome, EnrichedCase, PersistenceStatus};
pub use error::{EnrichmentError, EnrichmentWarning, Stage};
