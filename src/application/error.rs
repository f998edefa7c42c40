use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::render::{FailureKind, RenderFailure},
    config::LoadError,
    infra::error::InfraError,
};

/// Flatten an error and its sources into one line per cause.
pub fn error_chain(error: &dyn StdError) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error("render failed ({kind}): {message}")]
    Render { kind: FailureKind, message: String },
    #[error("validation failed: {0}")]
    Validation(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Process exit status for the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Render { .. } | AppError::Validation(_) => 1,
            AppError::Config(_) => 78,
            AppError::Infra(_) => 70,
        }
    }
}

impl From<RenderFailure> for AppError {
    fn from(failure: RenderFailure) -> Self {
        Self::Render {
            kind: failure.kind,
            message: failure.message,
        }
    }
}
