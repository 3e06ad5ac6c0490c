use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::content::ContentError, application::query::ComposeError,
    application::repos::RepoError, domain::error::DomainError, infra::error::InfraError,
};

/// Error surfaced by the `folio` binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for the CLI: 2 for caller mistakes, 3 when a
    /// dependency is down, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::NotFound
            | AppError::Validation(_)
            | AppError::Domain(DomainError::Validation { .. })
            | AppError::Domain(DomainError::UnknownKind { .. })
            | AppError::Infra(InfraError::Configuration { .. })
            | AppError::Content(ContentError::NotFound { .. })
            | AppError::Content(ContentError::Unsupported { .. })
            | AppError::Content(ContentError::Compose(_))
            | AppError::Content(ContentError::Slug(_))
            | AppError::Content(ContentError::Repo(RepoError::InvalidInput { .. })) => 2,
            AppError::Infra(InfraError::Database { .. })
            | AppError::Content(ContentError::Repo(
                RepoError::Persistence(_) | RepoError::Timeout,
            )) => 3,
            _ => 1,
        }
    }

    /// Message chain from this error down through its sources.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }
}

impl From<ComposeError> for AppError {
    fn from(err: ComposeError) -> Self {
        AppError::Content(ContentError::Compose(err))
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        AppError::Content(ContentError::Repo(err))
    }
}
