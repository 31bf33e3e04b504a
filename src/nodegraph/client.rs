use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::{SyncReport, Upsert};
use crate::config::{ConnectionConfig, SyncStrategy};
use crate::error::{AppResult, GraphStoreError, GraphStoreResult};
use crate::graph::{Edge, Graph, Node};

/// Client for the nodegraph provider REST API, bound to one graph.
#[derive(Clone)]
pub struct NodeGraphClient {
    client: Client,
    connection: ConnectionConfig,
    graph: String,
}

impl NodeGraphClient {
    /// Create a new client for `graph`
    pub fn new(connection: &ConnectionConfig, graph: impl Into<String>) -> AppResult<Self> {
        let client = connection.http_client()?;
        let mut connection = connection.clone();
        connection.url = connection.url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            connection,
            graph: graph.into(),
        })
    }

    /// Name of the graph this client writes
    pub fn graph(&self) -> &str {
        &self.graph
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.connection.url
    }

    /// Remove every node and edge of the graph.
    ///
    /// Best effort: failures are logged and reported as `false`, never raised.
    pub async fn delete_graph(&self) -> bool {
        match self.try_delete_graph().await {
            Ok(()) => {
                info!(graph = %self.graph, "Deleted graph");
                true
            }
            Err(GraphStoreError::Transport(e)) => {
                error!(graph = %self.graph, error = %e, "Connection to nodegraph provider failed");
                false
            }
            Err(e) => {
                warn!(graph = %self.graph, error = %e, "Failed to delete graph");
                false
            }
        }
    }

    async fn try_delete_graph(&self) -> GraphStoreResult<()> {
        let url = format!("{}/api/graphs/{}", self.connection.url, self.graph);
        let response = self.send(self.client.delete(&url)).await?;
        ensure_success(response, || format!("delete graph {}", self.graph))?;
        Ok(())
    }

    /// Write `graph` using `strategy`; true when the store received all of it.
    pub async fn sync(&self, graph: &Graph, strategy: SyncStrategy) -> bool {
        match strategy {
            SyncStrategy::Batch => self.sync_batch(graph).await.is_ok(),
            SyncStrategy::Incremental => self.sync_incremental(graph).await.is_complete(),
        }
    }

    /// Replace the whole graph with one request.
    ///
    /// The provider answers 201 on success; anything else leaves the graph
    /// as it was.
    pub async fn sync_batch(&self, graph: &Graph) -> GraphStoreResult<()> {
        let start = Instant::now();
        let url = format!("{}/api/graphs/{}", self.connection.url, self.graph);
        let body = serde_json::to_vec(graph)?;

        let response = self
            .send(
                self.client
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .body(body),
            )
            .await
            .map_err(|e| {
                error!(graph = %self.graph, error = %e, "Connection to nodegraph provider failed");
                e
            })?;

        let status = response.status();
        if status != StatusCode::CREATED {
            warn!(
                graph = %self.graph,
                status_code = status.as_u16(),
                "Failed to replace graph"
            );
            return Err(GraphStoreError::Status {
                operation: format!("replace graph {}", self.graph),
                status: status.as_u16(),
            });
        }

        info!(
            graph = %self.graph,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Updated nodegraph provider"
        );
        Ok(())
    }

    /// Delete the graph, then create or update every node and edge after
    /// probing for its existence.
    ///
    /// A failing entity is logged and counted; the remaining entities are
    /// still written.
    pub async fn sync_incremental(&self, graph: &Graph) -> SyncReport {
        let start = Instant::now();
        self.delete_graph().await;

        let mut report = SyncReport::default();

        for node in &graph.nodes {
            match self.upsert_node(node).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!(graph = %self.graph, node = %node.id, error = %e, "Failed to create/update node");
                    report.failed += 1;
                }
            }
        }

        for edge in &graph.edges {
            match self.upsert_edge(edge).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!(graph = %self.graph, edge = %edge.id(), error = %e, "Failed to create/update edge");
                    report.failed += 1;
                }
            }
        }

        info!(
            graph = %self.graph,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            elapsed_ms = start.elapsed().as_millis(),
            "Updated nodegraph provider"
        );
        report
    }

    async fn upsert_node(&self, node: &Node) -> GraphStoreResult<Upsert> {
        let collection = format!("{}/api/nodes/{}", self.connection.url, self.graph);
        let item = format!("{}/{}", collection, node.id);

        let lookup = self.send(self.client.get(&item)).await?;
        match lookup.status() {
            StatusCode::NOT_FOUND => {
                let response = self.send(self.client.post(&collection).json(node)).await?;
                ensure_success(response, || format!("create node {}", node.id))?;
                Ok(Upsert::Created)
            }
            StatusCode::OK => {
                let response = self
                    .send(self.client.put(&item).query(&node.to_params()))
                    .await?;
                ensure_success(response, || format!("update node {}", node.id))?;
                Ok(Upsert::Updated)
            }
            status => Err(GraphStoreError::Status {
                operation: format!("look up node {}", node.id),
                status: status.as_u16(),
            }),
        }
    }

    async fn upsert_edge(&self, edge: &Edge) -> GraphStoreResult<Upsert> {
        let collection = format!("{}/api/edges/{}", self.connection.url, self.graph);
        let item = format!("{}/{}/{}", collection, edge.source, edge.target);

        let lookup = self.send(self.client.get(&item)).await?;
        match lookup.status() {
            StatusCode::NOT_FOUND => {
                let response = self.send(self.client.post(&collection).json(edge)).await?;
                ensure_success(response, || format!("create edge {}", edge.id()))?;
                Ok(Upsert::Created)
            }
            StatusCode::OK => {
                let response = self
                    .send(self.client.put(&item).query(&edge.to_params()))
                    .await?;
                ensure_success(response, || format!("update edge {}", edge.id()))?;
                Ok(Upsert::Updated)
            }
            status => Err(GraphStoreError::Status {
                operation: format!("look up edge {}", edge.id()),
                status: status.as_u16(),
            }),
        }
    }

    async fn send(&self, request: RequestBuilder) -> GraphStoreResult<Response> {
        let response = self.connection.authorize(request).send().await?;
        debug!(
            graph = %self.graph,
            url = %response.url(),
            status = response.status().as_u16(),
            "Nodegraph provider request completed"
        );
        Ok(response)
    }
}

fn ensure_success(
    response: Response,
    operation: impl FnOnce() -> String,
) -> GraphStoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GraphStoreError::Status {
            operation: operation(),
            status: status.as_u16(),
        })
    }
}
