use actor_runtime::{ActorError, CompletesError};
use thiserror::Error;

/// Errors surfaced by [`ProcessingSystem`](super::ProcessingSystem).
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Actor runtime error: {0}")]
    Runtime(#[from] ActorError),

    #[error("Query '{query}' failed: {source}")]
    Query {
        query: &'static str,
        #[source]
        source: CompletesError,
    },
}

impl SystemError {
    pub(crate) fn query(query: &'static str) -> impl FnOnce(CompletesError) -> Self {
        move |source| SystemError::Query { query, source }
    }
}
