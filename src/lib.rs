//! # Tempo Trace Aggregation
//!
//! Periodically queries a Tempo tracing backend, derives a service
//! dependency graph from span parentage, and publishes it to a nodegraph
//! provider for visualization.
//!
//! ## Architecture
//!
//! ```text
//! Driver → GraphAggregator → Tempo (HTTP)
//!    ↓
//! NodeGraphClient → nodegraph provider (HTTP)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use tempo_trace_aggregation::{Cli, Config, Driver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(&Cli::default())?;
//!     let driver = Driver::from_config(&config)?;
//!     driver.run().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration loading from CLI flags and YAML.
pub mod config;
/// Cycle scheduling: aggregate, then sync or clear.
pub mod driver;
/// Error types and result aliases for the application.
pub mod error;
/// Graph model and trace aggregation.
pub mod graph;
/// Nodegraph provider client.
pub mod nodegraph;
/// Tempo API client and wire types.
pub mod tempo;

pub use config::{Cli, Config};
pub use driver::{CycleOutcome, Driver};
pub use error::{AppError, AppResult};
pub use graph::{Edge, Graph, GraphAggregator, Node};
