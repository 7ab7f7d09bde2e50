use thiserror::Error;

use crate::buffer::BufferError;
use crate::locator::SignatureError;
use crate::mutation::errors::MutationError;
use crate::sandbox::errors::SandboxError;

/// Umbrella error for callers that drive the whole pipeline.
#[derive(Debug, Error)]
pub enum MorphError {
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),

    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
}

pub type MorphResult<T> = std::result::Result<T, MorphError>;
