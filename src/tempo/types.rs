use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

/// Where Tempo looks for a trace when fetching it by id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Recent data still held by the ingesters
    #[default]
    Ingesters,
    /// Flushed backend blocks
    Blocks,
    /// Both ingesters and blocks
    All,
}

impl SearchMode {
    /// Value of the `mode` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Ingesters => "ingesters",
            SearchMode::Blocks => "blocks",
            SearchMode::All => "all",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ingesters" | "ingester" => Ok(SearchMode::Ingesters),
            "blocks" => Ok(SearchMode::Blocks),
            "all" => Ok(SearchMode::All),
            _ => Err(format!("Unknown search mode: {}", s)),
        }
    }
}

/// Search window in unix seconds, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub start: i64,
    pub end: i64,
}

impl SearchWindow {
    /// Window of `from_secs` seconds ending at `now`.
    pub fn ending_at(now: i64, from_secs: u64) -> Self {
        let from = i64::try_from(from_secs).unwrap_or(i64::MAX);
        Self {
            start: now.saturating_sub(from),
            end: now,
        }
    }
}

/// Response of `GET /search/tag/{tag}/values`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagValuesResponse {
    #[serde(rename = "tagValues", default)]
    pub tag_values: Vec<String>,
}

/// Response of `GET /search`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub traces: Vec<TraceSummary>,
}

/// One search hit
#[derive(Debug, Clone, Deserialize)]
pub struct TraceSummary {
    #[serde(rename = "traceID")]
    pub trace_id: String,
    #[serde(rename = "rootServiceName")]
    pub root_service_name: Option<String>,
    #[serde(rename = "rootTraceName")]
    pub root_trace_name: Option<String>,
    #[serde(rename = "durationMs")]
    pub duration_ms: Option<u64>,
}

impl TraceSummary {
    /// A trace is complete once its root span has been received, which
    /// Tempo signals by reporting a root trace name.
    pub fn is_complete(&self) -> bool {
        self.root_trace_name
            .as_deref()
            .is_some_and(|name| !name.is_empty())
    }
}

/// Response of `GET /traces/{traceID}`
///
/// Batches are decoded one at a time: a malformed batch is counted in
/// `skipped_batches` and dropped without affecting its siblings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "RawTraceResponse")]
pub struct TraceResponse {
    pub batches: Vec<Batch>,
    pub skipped_batches: usize,
}

#[derive(Deserialize)]
struct RawTraceResponse {
    #[serde(default, alias = "resourceSpans")]
    batches: Vec<serde_json::Value>,
}

impl From<RawTraceResponse> for TraceResponse {
    fn from(raw: RawTraceResponse) -> Self {
        let total = raw.batches.len();
        let batches: Vec<Batch> = raw
            .batches
            .into_iter()
            .filter_map(|batch| serde_json::from_value(batch).ok())
            .collect();
        Self {
            skipped_batches: total - batches.len(),
            batches,
        }
    }
}

/// Spans emitted by one resource (one service instance).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Batch {
    #[serde(default)]
    pub resource: Resource,
    #[serde(rename = "scopeSpans", default)]
    pub scope_spans: Vec<ScopeSpans>,
    /// Pre-1.0 OTLP name of `scopeSpans`
    #[serde(rename = "instrumentationLibrarySpans", default)]
    pub instrumentation_library_spans: Vec<ScopeSpans>,
}

impl Batch {
    /// Owning service of every span in this batch.
    ///
    /// Tempo lists the service name as the first resource attribute; a batch
    /// without a string-valued first attribute has no usable owner.
    pub fn service_name(&self) -> Option<&str> {
        self.resource
            .attributes
            .first()
            .and_then(|attr| attr.value.string_value.as_deref())
    }

    /// All spans of the batch, across instrumentation scopes.
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.scope_spans
            .iter()
            .chain(&self.instrumentation_library_spans)
            .flat_map(|scope| scope.spans.iter())
    }
}

/// Resource description of a batch
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
}

/// OTLP key/value attribute
#[derive(Debug, Clone, Deserialize)]
pub struct KeyValue {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: AnyValue,
}

/// OTLP attribute value; only string values are read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnyValue {
    #[serde(rename = "stringValue")]
    pub string_value: Option<String>,
}

/// Spans of one instrumentation scope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScopeSpans {
    #[serde(default)]
    pub spans: Vec<Span>,
}

/// A single span
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Span {
    #[serde(rename = "spanId")]
    pub span_id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "parentSpanId")]
    pub parent_span_id: Option<String>,
    #[serde(
        rename = "startTimeUnixNano",
        default,
        deserialize_with = "deserialize_nanos"
    )]
    pub start_time_unix_nano: Option<u64>,
    #[serde(
        rename = "endTimeUnixNano",
        default,
        deserialize_with = "deserialize_nanos"
    )]
    pub end_time_unix_nano: Option<u64>,
}

impl Span {
    /// Span duration in nanoseconds, `None` when a timestamp is missing.
    pub fn duration_nanos(&self) -> Option<u64> {
        match (self.start_time_unix_nano, self.end_time_unix_nano) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }

    /// Parent span id; an empty string means no parent.
    pub fn parent(&self) -> Option<&str> {
        self.parent_span_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// OTLP JSON encodes 64-bit integers as strings, older Tempo versions as numbers.
fn deserialize_nanos<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Nanos {
        Number(u64),
        Text(String),
    }

    match Option::<Nanos>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Nanos::Number(n)) => Ok(Some(n)),
        Some(Nanos::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
