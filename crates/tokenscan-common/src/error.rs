use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenscanError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TokenscanError {
    pub fn status_code(&self) -> u16 {
        match self {
            TokenscanError::NotFound(_) => 404,
            TokenscanError::InvalidInput(_) => 400,
            TokenscanError::Rpc(_) => 502,
            TokenscanError::Database(_)
            | TokenscanError::Cache(_)
            | TokenscanError::Config(_)
            | TokenscanError::Internal(_) => 500,
        }
    }
}
