use snicket_core::StoreError;
use snicket_generator::GeneratorError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("short code generation failed: {0}")]
    Generator(#[from] GeneratorError),
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}
