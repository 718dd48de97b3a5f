// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("Conflict updating {0}: object changed since it was read")]
    Conflict(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Failed to set owner reference: {0}")]
    OwnerReference(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<kube::Error> for OperatorError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ref ae) if ae.code == 409 => OperatorError::Conflict(ae.message.clone()),
            other => OperatorError::KubeError(other),
        }
    }
}

impl OperatorError {
    /// Validation failures will not go away by retrying the same input.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, OperatorError::Validation(_))
    }

    /// Status code reported back to the API server when an admission request is rejected.
    pub fn http_status(&self) -> u16 {
        match self {
            OperatorError::Validation(_) => 400,
            OperatorError::Conflict(_) => 409,
            OperatorError::Cancelled(_) => 504,
            OperatorError::KubeError(_)
            | OperatorError::OwnerReference(_)
            | OperatorError::Serialization(_)
            | OperatorError::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
