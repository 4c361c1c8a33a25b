use std::fmt;
use thiserror::Error;

/// Which external collaborator a backend failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStage {
    Encoder,
    Index,
}

impl fmt::Display for BackendStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendStage::Encoder => f.write_str("dense encoder"),
            BackendStage::Index => f.write_str("vector index"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid retrieval mode {0:?}, expected one of dense, sparse, hybrid")]
    InvalidMode(String),

    #[error("query is empty")]
    EmptyQuery,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("retrieval backend failed ({stage})")]
    Backend {
        stage: BackendStage,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SearchError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SearchError::Configuration(msg.into())
    }

    pub(crate) fn backend(stage: BackendStage, source: anyhow::Error) -> Self {
        SearchError::Backend { stage, source }
    }

    /// True for errors caused by the caller's input rather than by the
    /// service or its collaborators.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SearchError::InvalidMode(_) | SearchError::EmptyQuery)
    }
}

/// Failure of the result cache. Never fatal to a request: callers treat it
/// as a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}
