use std::collections::{HashMap, HashSet};
use std::time::Instant;

use regex::Regex;
use tracing::{debug, info, warn};

use super::{node_id, service_node_id, Edge, Graph, Node};
use crate::config::Config;
use crate::error::TempoError;
use crate::tempo::{Batch, SearchMode, SearchWindow, Span, TraceBackend};

/// What to aggregate and how to classify it.
#[derive(Debug, Clone)]
pub struct AggregationQuery {
    /// Tag whose values enumerate the services
    pub tag: String,
    /// Tag values are kept when the expression matches anywhere in them
    pub tag_filter: Regex,
    /// Create an ingress node per tag value, parent of root spans
    pub use_tag_as_node: bool,
    /// Subtitle of ingress nodes
    pub service_subtitle: String,
    /// Average latency above which a node is failed
    pub threshold_ms: f64,
    /// Where traces are fetched from
    pub mode: SearchMode,
}

impl AggregationQuery {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tag: config.query.tag.clone(),
            tag_filter: config.query.tag_filter.clone(),
            use_tag_as_node: config.query.use_tag_as_node,
            service_subtitle: config.query.service_subtitle.clone(),
            threshold_ms: config.query.threshold_ms,
            mode: config.search.mode,
        }
    }
}

/// Builds a service dependency graph from the traces of a tracing backend.
pub struct GraphAggregator<B: TraceBackend> {
    backend: B,
    query: AggregationQuery,
}

impl<B: TraceBackend> GraphAggregator<B> {
    pub fn new(backend: B, query: AggregationQuery) -> Self {
        Self { backend, query }
    }

    pub fn query(&self) -> &AggregationQuery {
        &self.query
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run one aggregation over `window`.
    ///
    /// Backend failures only skip the item they concern. When tag discovery
    /// itself yields nothing the returned graph is empty.
    pub async fn execute(&self, window: SearchWindow) -> Graph {
        let start = Instant::now();
        let path = format!("/search/tag/{}/values", self.query.tag);

        let tag_values = match self.backend.tag_values(&self.query.tag).await {
            Ok(response) => response.tag_values,
            Err(e) => {
                warn!(url = %path, error = %e, "Empty response");
                return Graph::default();
            }
        };

        let mut state = WorkingState::default();
        for tag_value in &tag_values {
            if !self.query.tag_filter.is_match(tag_value) {
                debug!(tag_value = %tag_value, "Tag value does not match filter");
                continue;
            }
            self.collect_tag_value(&mut state, tag_value, window).await;
        }

        let graph = state.into_graph();
        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Read traces from tempo"
        );
        graph
    }

    async fn collect_tag_value(&self, state: &mut WorkingState, tag_value: &str, window: SearchWindow) {
        let search = match self.backend.search(&self.query.tag, tag_value, window).await {
            Ok(search) => search,
            Err(e) => {
                log_skipped("/search", tag_value, &e);
                return;
            }
        };

        let service_node = self
            .query
            .use_tag_as_node
            .then(|| state.ensure_service_node(tag_value, &self.query.service_subtitle));

        for trace in &search.traces {
            if !trace.is_complete() {
                debug!(
                    trace_id = %trace.trace_id,
                    root_service = trace.root_service_name.as_deref().unwrap_or_default(),
                    duration_ms = ?trace.duration_ms,
                    "Root span not yet received, skipping trace"
                );
                continue;
            }

            let spans = match self.backend.trace(&trace.trace_id, self.query.mode).await {
                Ok(spans) => spans,
                Err(e) => {
                    log_skipped("/traces", &trace.trace_id, &e);
                    continue;
                }
            };

            if spans.skipped_batches > 0 {
                warn!(
                    trace_id = %trace.trace_id,
                    skipped = spans.skipped_batches,
                    "Malformed batches in trace, skipping them"
                );
            }
            for batch in &spans.batches {
                state.add_batch(batch, service_node.as_deref(), self.query.threshold_ms);
            }
        }
    }
}

fn log_skipped(url: &str, item: &str, error: &TempoError) {
    if error.is_empty_result() {
        info!(url = %url, item = %item, error = %error, "Empty response");
    } else {
        warn!(url = %url, item = %item, error = %error, "Tempo query failed, skipping");
    }
}

/// Accumulation maps for one `execute` call.
#[derive(Debug, Default)]
struct WorkingState {
    nodes: HashMap<String, Node>,
    /// span id → node ids the span was mapped to
    span_to_node: HashMap<String, HashSet<String>>,
    /// node id → parent span id → number of child spans referencing it
    node_parent_spans: HashMap<String, HashMap<String, u32>>,
}

impl WorkingState {
    fn ensure_service_node(&mut self, tag_value: &str, subtitle: &str) -> String {
        let id = service_node_id(tag_value);
        if !self.nodes.contains_key(&id) {
            self.nodes
                .insert(id.clone(), Node::new(id.clone(), tag_value, subtitle));
            // Root spans name the ingress node as parent; resolve it to itself.
            self.span_to_node
                .entry(id.clone())
                .or_default()
                .insert(id.clone());
        }
        id
    }

    fn add_batch(&mut self, batch: &Batch, service_node: Option<&str>, threshold_ms: f64) {
        let Some(service) = batch.service_name() else {
            warn!("Batch has no service name resource attribute, skipping");
            return;
        };

        for span in batch.spans() {
            let Some(name) = span.name.as_deref() else {
                continue;
            };
            let Some(duration) = span.duration_nanos() else {
                warn!(service = %service, span = %name, "Span without timestamps, skipping");
                continue;
            };
            self.add_span(service, name, span, duration, service_node, threshold_ms);
        }
    }

    fn add_span(
        &mut self,
        service: &str,
        name: &str,
        span: &Span,
        duration_nanos: u64,
        service_node: Option<&str>,
        threshold_ms: f64,
    ) {
        let id = node_id(service, name);
        self.nodes
            .entry(id.clone())
            .or_insert_with(|| Node::new(id.clone(), service, name))
            .record_span(duration_nanos, threshold_ms);

        if let Some(service_id) = service_node {
            if let Some(node) = self.nodes.get_mut(service_id) {
                node.increment_calls();
            }
        }

        let parent = span.parent().or(service_node);
        if let Some(parent) = parent {
            *self
                .node_parent_spans
                .entry(id.clone())
                .or_default()
                .entry(parent.to_string())
                .or_insert(0) += 1;
        }

        if let Some(span_id) = span.span_id.as_deref().filter(|s| !s.is_empty()) {
            self.span_to_node
                .entry(span_id.to_string())
                .or_default()
                .insert(id);
        }
    }

    fn into_graph(self) -> Graph {
        let mut edges: HashMap<(String, String), Edge> = HashMap::new();

        for (target, parents) in &self.node_parent_spans {
            for (parent_span, count) in parents {
                let Some(sources) = self.span_to_node.get(parent_span) else {
                    info!(
                        parent_span = %parent_span,
                        target = %target,
                        "Parent span not found, skipping edge"
                    );
                    continue;
                };
                for source in sources {
                    edges
                        .entry((source.clone(), target.clone()))
                        .or_insert_with(|| Edge::new(source.clone(), target.clone()))
                        .main_stat += f64::from(*count);
                }
            }
        }

        let mut nodes: Vec<Node> = self.nodes.into_values().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let mut edges: Vec<Edge> = edges.into_values().collect();
        edges.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));

        Graph { nodes, edges }
    }
}
