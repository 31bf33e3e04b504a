//! Aggregation and sync scheduling.
//!
//! A cycle aggregates the traces of the search window ending now and
//! publishes the result, or clears the graph when nothing was observed.

use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::config::{Config, SyncStrategy};
use crate::error::AppResult;
use crate::graph::{AggregationQuery, GraphAggregator};
use crate::nodegraph::NodeGraphClient;
use crate::tempo::{SearchWindow, TempoClient, TraceBackend};

/// What a cycle did to the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The aggregated graph was written.
    Synced {
        nodes: usize,
        edges: usize,
        /// False when the store rejected part or all of the graph
        complete: bool,
    },
    /// Nothing was observed, the stored graph was deleted.
    Cleared,
}

/// Runs aggregation cycles against one graph.
pub struct Driver<B: TraceBackend> {
    aggregator: GraphAggregator<B>,
    store: NodeGraphClient,
    strategy: SyncStrategy,
    search_from_secs: u64,
    interval: Duration,
}

impl Driver<TempoClient> {
    /// Wire the Tempo and nodegraph provider clients from configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let tempo = TempoClient::new(&config.tempo)?;
        let store = NodeGraphClient::new(&config.nodegraph_provider, &config.graph.name)?;
        let aggregator = GraphAggregator::new(tempo, AggregationQuery::from_config(config));

        Ok(Self::new(
            aggregator,
            store,
            config.graph.sync,
            config.search.from_secs,
            Duration::from_secs(config.schedule.interval_secs),
        ))
    }
}

impl<B: TraceBackend> Driver<B> {
    pub fn new(
        aggregator: GraphAggregator<B>,
        store: NodeGraphClient,
        strategy: SyncStrategy,
        search_from_secs: u64,
        interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            store,
            strategy,
            search_from_secs,
            interval,
        }
    }

    /// Run one cycle for the window ending at `now` (unix seconds).
    pub async fn run_cycle(&self, now: i64) -> CycleOutcome {
        let window = SearchWindow::ending_at(now, self.search_from_secs);
        let graph = self.aggregator.execute(window).await;

        if !graph.is_publishable() {
            info!(
                graph = %self.store.graph(),
                nodes = graph.nodes.len(),
                edges = graph.edges.len(),
                "Nothing to publish, clearing graph"
            );
            self.store.delete_graph().await;
            return CycleOutcome::Cleared;
        }

        let complete = self.store.sync(&graph, self.strategy).await;
        CycleOutcome::Synced {
            nodes: graph.nodes.len(),
            edges: graph.edges.len(),
            complete,
        }
    }

    /// Run cycles until the interval is zero or ctrl-c is received.
    pub async fn run(&self) {
        loop {
            self.run_cycle(Utc::now().timestamp()).await;

            if self.interval.is_zero() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }
    }
}
