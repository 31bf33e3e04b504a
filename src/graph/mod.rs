//! Service dependency graph model.
//!
//! Nodes are (service, operation) pairs or synthetic per-service ingress
//! nodes; edges are caller → callee relationships inferred from span
//! parentage. Wire serialization lists every field explicitly so the
//! payload format does not depend on struct layout.

mod aggregator;


pub use aggregator::*;

use serde::ser::{Serialize, SerializeStruct, Serializer};
use sha2::{Digest, Sha256};

const OPERATION_DOMAIN: &[u8] = b"operation";
const INGRESS_DOMAIN: &[u8] = b"ingress";

/// Identity of the node for operation `span_name` of `service`.
pub fn node_id(service: &str, span_name: &str) -> String {
    hash_id(OPERATION_DOMAIN, &format!("{}##{}", service, span_name))
}

/// Identity of the ingress node for tag value `tag_value`.
///
/// Hashed in its own domain, so an operation literally named `service`
/// never resolves to the ingress node of its own service.
pub fn service_node_id(tag_value: &str) -> String {
    hash_id(INGRESS_DOMAIN, &format!("{}##service", tag_value))
}

fn hash_id(domain: &[u8], key: &str) -> String {
    let digest = Sha256::new()
        .chain_update(domain)
        .chain_update([0u8])
        .chain_update(key.as_bytes())
        .finalize();
    hex::encode(digest)
}

/// Latency health of a node relative to the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Health {
    #[default]
    Passed,
    Failed,
}

impl Health {
    /// Failed when the average strictly exceeds the threshold.
    pub fn classify(average_ms: f64, threshold_ms: f64) -> Self {
        if average_ms > threshold_ms {
            Health::Failed
        } else {
            Health::Passed
        }
    }

    /// Value of the `arc__passed` field.
    pub fn arc_passed(&self) -> f64 {
        match self {
            Health::Passed => 1.0,
            Health::Failed => 0.0,
        }
    }

    /// Value of the `arc__failed` field.
    pub fn arc_failed(&self) -> f64 {
        1.0 - self.arc_passed()
    }
}

/// A graph vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub title: String,
    pub sub_title: String,
    /// Number of spans (or, for ingress nodes, child spans) seen.
    pub main_stat: f64,
    /// Running average duration in milliseconds.
    pub secondary_stat: f64,
    pub health: Health,
    pub detail_role: String,
}

impl Node {
    /// Create a node with zeroed statistics.
    pub fn new(id: impl Into<String>, title: impl Into<String>, sub_title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            sub_title: sub_title.into(),
            main_stat: 0.0,
            secondary_stat: 0.0,
            health: Health::Passed,
            detail_role: String::new(),
        }
    }

    /// Account one span of `duration_nanos` and reclassify health.
    ///
    /// `avg += ((avg + duration_nanos) / count) / 1e6`, with `count` already
    /// incremented. This is not a textbook incremental mean and must not be
    /// replaced by one: threshold classification depends on its exact values.
    pub fn record_span(&mut self, duration_nanos: u64, threshold_ms: f64) {
        self.main_stat += 1.0;
        self.secondary_stat +=
            ((self.secondary_stat + duration_nanos as f64) / self.main_stat) / 1_000_000.0;
        self.health = Health::classify(self.secondary_stat, threshold_ms);
    }

    /// Count one call without touching latency.
    pub fn increment_calls(&mut self) {
        self.main_stat += 1.0;
    }

    pub fn arc_passed(&self) -> f64 {
        self.health.arc_passed()
    }

    pub fn arc_failed(&self) -> f64 {
        self.health.arc_failed()
    }

    /// Query parameters for an update, every field except `id`.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("arc__failed", format_stat(self.arc_failed())),
            ("arc__passed", format_stat(self.arc_passed())),
            ("detail__role", self.detail_role.clone()),
            ("mainStat", format_stat(self.main_stat)),
            ("secondaryStat", format_stat(self.secondary_stat)),
            ("subTitle", self.sub_title.clone()),
            ("title", self.title.clone()),
        ]
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Node", 8)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("title", &self.title)?;
        state.serialize_field("subTitle", &self.sub_title)?;
        state.serialize_field("mainStat", &self.main_stat)?;
        state.serialize_field("secondaryStat", &self.secondary_stat)?;
        state.serialize_field("arc__passed", &self.arc_passed())?;
        state.serialize_field("arc__failed", &self.arc_failed())?;
        state.serialize_field("detail__role", &self.detail_role)?;
        state.end()
    }
}

/// A directed caller → callee relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    /// Number of parent/child span relationships aggregated into the edge.
    pub main_stat: f64,
    /// Reserved.
    pub secondary_stat: f64,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            main_stat: 0.0,
            secondary_stat: 0.0,
        }
    }

    pub fn id(&self) -> String {
        format!("{}:{}", self.source, self.target)
    }

    /// Query parameters for an update.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("source", self.source.clone()),
            ("target", self.target.clone()),
            ("mainStat", format_stat(self.main_stat)),
            ("secondaryStat", format_stat(self.secondary_stat)),
        ]
    }
}

impl Serialize for Edge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Edge", 4)?;
        state.serialize_field("source", &self.source)?;
        state.serialize_field("target", &self.target)?;
        state.serialize_field("mainStat", &self.main_stat)?;
        state.serialize_field("secondaryStat", &self.secondary_stat)?;
        state.end()
    }
}

/// Result of one aggregation cycle.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// A graph is only published when it has both nodes and edges.
    pub fn is_publishable(&self) -> bool {
        !self.nodes.is_empty() && !self.edges.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }
}

/// Format a statistic for a query parameter, keeping a decimal point on
/// whole numbers (`1.0`, not `1`).
fn format_stat(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_node_id_is_stable() {
        assert_eq!(node_id("svc", "root"), node_id("svc", "root"));
        assert_eq!(node_id("svc", "root").len(), 64);
    }

    #[test]
    fn test_node_id_distinguishes_pairs() {
        assert_ne!(node_id("svc", "root"), node_id("svc", "child"));
        assert_ne!(node_id("a", "b"), node_id("b", "a"));
        assert_ne!(node_id("svc", "service"), service_node_id("svc"));
    }

    #[test]
    fn test_service_node_id_is_stable() {
        assert_eq!(service_node_id("svc"), service_node_id("svc"));
        assert_eq!(service_node_id("svc").len(), 64);
        assert_ne!(service_node_id("svc"), service_node_id("other"));
    }

    #[test]
    fn test_health_classify_threshold_is_exclusive() {
        assert_eq!(Health::classify(40.0, 40.0), Health::Passed);
        assert_eq!(Health::classify(40.01, 40.0), Health::Failed);
    }

    #[test]
    fn test_health_partition() {
        for health in [Health::Passed, Health::Failed] {
            assert_eq!(health.arc_passed() + health.arc_failed(), 1.0);
        }
        assert_eq!(Health::Failed.arc_failed(), 1.0);
        assert_eq!(Health::Passed.arc_passed(), 1.0);
    }

    #[test]
    fn test_record_span_recurrence() {
        let mut node = Node::new("id", "svc", "op");
        node.record_span(10_000_000, 40.0);
        assert_eq!(node.main_stat, 1.0);
        assert_eq!(node.secondary_stat, 10.0);
        assert_eq!(node.health, Health::Passed);

        // (10 + 50_000_000) / 2 / 1e6 added to 10
        node.record_span(50_000_000, 40.0);
        assert_eq!(node.main_stat, 2.0);
        assert!((node.secondary_stat - 35.000005).abs() < 1e-9);
        assert_eq!(node.health, Health::Passed);

        node.record_span(50_000_000, 40.0);
        assert!(node.secondary_stat > 40.0);
        assert_eq!(node.health, Health::Failed);
        assert_eq!(node.arc_passed() + node.arc_failed(), 1.0);
    }

    #[test]
    fn test_node_serialization() {
        let mut node = Node::new("abc", "svc", "GET /");
        node.record_span(50_000_000, 40.0);

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "abc",
                "title": "svc",
                "subTitle": "GET /",
                "mainStat": 1.0,
                "secondaryStat": 50.0,
                "arc__passed": 0.0,
                "arc__failed": 1.0,
                "detail__role": ""
            })
        );
    }

    #[test]
    fn test_node_params_exclude_id() {
        let node = Node::new("abc", "svc", "op");
        let params = node.to_params();
        assert!(params.iter().all(|(k, _)| *k != "id"));
        assert!(params.contains(&("mainStat", "0.0".to_string())));
        assert!(params.contains(&("arc__passed", "1.0".to_string())));
        assert!(params.contains(&("subTitle", "op".to_string())));
    }

    #[test]
    fn test_edge_serialization_and_params() {
        let mut edge = Edge::new("a", "b");
        edge.main_stat = 3.0;

        assert_eq!(edge.id(), "a:b");
        assert_eq!(
            serde_json::to_value(&edge).unwrap(),
            json!({"source": "a", "target": "b", "mainStat": 3.0, "secondaryStat": 0.0})
        );
        assert_eq!(
            edge.to_params(),
            vec![
                ("source", "a".to_string()),
                ("target", "b".to_string()),
                ("mainStat", "3.0".to_string()),
                ("secondaryStat", "0.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_graph_publishable() {
        let mut graph = Graph::default();
        assert!(!graph.is_publishable());

        graph.nodes.push(Node::new("a", "svc", "op"));
        assert!(!graph.is_publishable());

        graph.edges.push(Edge::new("a", "a"));
        assert!(graph.is_publishable());
    }

    #[test]
    fn test_format_stat() {
        assert_eq!(format_stat(1.0), "1.0");
        assert_eq!(format_stat(0.5), "0.5");
    }
}
