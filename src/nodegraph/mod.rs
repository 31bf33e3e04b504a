//! Nodegraph provider synchronization.
//!
//! Makes the remote graph store hold exactly the graph of the last cycle,
//! either with one atomic replace ([`NodeGraphClient::sync_batch`]) or
//! entity by entity ([`NodeGraphClient::sync_incremental`]).

mod client;

pub use client::*;

/// Outcome of an incremental sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entities created after a "not found" lookup
    pub created: usize,
    /// Entities updated after a "found" lookup
    pub updated: usize,
    /// Entities whose lookup or write failed
    pub failed: usize,
}

impl SyncReport {
    /// True when every entity was written.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub(crate) fn record(&mut self, outcome: Upsert) {
        match outcome {
            Upsert::Created => self.created += 1,
            Upsert::Updated => self.updated += 1,
        }
    }
}

/// What an existence-checked write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}
