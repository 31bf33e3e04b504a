use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Tempo error: {0}")]
    Tempo(#[from] TempoError),

    #[error("Graph store error: {0}")]
    GraphStore(#[from] GraphStoreError),
}

/// Tempo (tracing backend) errors.
///
/// Every variant means "no data for this query" to the aggregator; they
/// differ only in how the failure is logged.
#[derive(Debug, Error)]
pub enum TempoError {
    #[error("Empty response from {path}")]
    Empty { path: String },

    #[error("Unexpected status {status} from {path}")]
    Status { path: String, status: u16 },

    #[error("Invalid response from {path}: {message}")]
    InvalidResponse { path: String, message: String },

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl TempoError {
    /// True when the backend answered but had nothing usable.
    pub fn is_empty_result(&self) -> bool {
        !matches!(self, TempoError::Transport(_))
    }
}

/// Nodegraph provider (graph store) errors
#[derive(Debug, Error)]
pub enum GraphStoreError {
    #[error("{operation} failed with status {status}")]
    Status { operation: String, status: u16 },

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for Tempo queries
pub type TempoResult<T> = Result<T, TempoError>;

/// Result type alias for graph store operations
pub type GraphStoreResult<T> = Result<T, GraphStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "tempo.url is required".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: tempo.url is required");
    }

    #[test]
    fn test_tempo_error_display() {
        let err = TempoError::Empty {
            path: "/search/tag/service.name/values".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Empty response from /search/tag/service.name/values"
        );

        let err = TempoError::Status {
            path: "/traces/abc".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "Unexpected status 404 from /traces/abc");

        let err = TempoError::InvalidResponse {
            path: "/search".to_string(),
            message: "expected value".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid response from /search: expected value");
    }

    #[test]
    fn test_tempo_error_empty_classification() {
        assert!(TempoError::Empty {
            path: "/x".to_string()
        }
        .is_empty_result());
        assert!(TempoError::Status {
            path: "/x".to_string(),
            status: 500
        }
        .is_empty_result());
        assert!(TempoError::InvalidResponse {
            path: "/x".to_string(),
            message: "bad".to_string()
        }
        .is_empty_result());
    }

    #[test]
    fn test_graph_store_error_display() {
        let err = GraphStoreError::Status {
            operation: "replace graph micro".to_string(),
            status: 500,
        };
        assert_eq!(err.to_string(), "replace graph micro failed with status 500");
    }

    #[test]
    fn test_tempo_error_conversion_to_app_error() {
        let err: AppError = TempoError::Empty {
            path: "/x".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::Tempo(_)));
    }

    #[test]
    fn test_graph_store_error_conversion_to_app_error() {
        let err: AppError = GraphStoreError::Status {
            operation: "delete graph".to_string(),
            status: 503,
        }
        .into();
        assert!(matches!(err, AppError::GraphStore(_)));
    }
}
