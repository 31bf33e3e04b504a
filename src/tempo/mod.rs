//! Tempo search and trace API access.
//!
//! [`TraceBackend`] is the seam the aggregator depends on; [`TempoClient`]
//! implements it over HTTP.

mod client;
mod types;


pub use client::TempoClient;
pub use types::*;

use async_trait::async_trait;

use crate::error::TempoResult;

/// Read access to a tracing backend.
///
/// Every method fails with a [`crate::error::TempoError`] when the backend
/// has nothing usable for the query: non-200 status, unparsable or empty
/// body, or a transport failure. Callers treat all of these as "no data".
#[async_trait]
pub trait TraceBackend: Send + Sync {
    /// List all known values of `tag`.
    async fn tag_values(&self, tag: &str) -> TempoResult<TagValuesResponse>;

    /// Search traces where `tag == value` inside `window`.
    async fn search(
        &self,
        tag: &str,
        value: &str,
        window: SearchWindow,
    ) -> TempoResult<SearchResponse>;

    /// Fetch all spans of one trace.
    async fn trace(&self, trace_id: &str, mode: SearchMode) -> TempoResult<TraceResponse>;
}
