//! Remote data sources for the two lookup stages.
//!
//! A `DependentSource` pairs a resolve call (free text to candidates) with a detail call
//! (one candidate to the final payload). The orchestrator only ever talks to this trait.

mod open_meteo;
pub mod weather_codes;

pub use open_meteo::{OpenMeteoConfig, OpenMeteoSource};

use crate::error::LookupError;
use crate::model::{Candidate, Query};
use async_trait::async_trait;

#[async_trait]
pub trait DependentSource: Send + Sync + 'static {
    /// Data stage 2 needs from a stage-1 match (e.g. coordinates).
    type Payload: Clone + Send + Sync + 'static;
    /// Final stage-2 result.
    type Detail: Send + 'static;

    /// Stage 1: raw candidates in source order, before any matching against the query.
    async fn resolve(&self, query: &Query) -> Result<Vec<Candidate<Self::Payload>>, LookupError>;

    /// Stage 2: fetch the detail for exactly one candidate.
    async fn fetch_detail(
        &self,
        candidate: &Candidate<Self::Payload>,
    ) -> Result<Self::Detail, LookupError>;
}
