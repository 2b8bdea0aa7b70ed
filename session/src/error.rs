use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    Identifier(#[from] arvex_types::IdentifierError),

    #[error("routing error: {0}")]
    Routing(#[from] arvex_routing::RoutingError),

    #[error("worker error: {0}")]
    Worker(#[from] arvex_worker::WorkerError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
