//! Error types for the Hoper operator

use thiserror::Error;

/// Main error type for Hoper operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error for Tenant specs or CLI input
    #[error("validation error: {0}")]
    Validation(String),

    /// Owner reference could not be attached to a child resource
    #[error("owner reference error: {0}")]
    OwnerReference(String),

    /// Client or operator configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The invocation was cancelled before it could finish
    #[error("reconciliation cancelled")]
    Cancelled,

    /// The invocation ran past its deadline
    #[error("reconciliation deadline exceeded")]
    DeadlineExceeded,
}

/// How the controller should treat a failed reconciliation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// May succeed on a later attempt with the same inputs
    Transient,
    /// Will fail again with the same inputs; needs a spec or code change
    Fatal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an owner reference error with the given message
    pub fn owner_reference(msg: impl Into<String>) -> Self {
        Self::OwnerReference(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify this error for retry decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Kube(_) | Self::Cancelled | Self::DeadlineExceeded => ErrorClass::Transient,
            Self::Validation(_) | Self::OwnerReference(_) | Self::Config(_) => ErrorClass::Fatal,
        }
    }

    /// Returns true if retrying with the same inputs may succeed
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Returns true if the API server reported the object as missing
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// Returns true if the API server rejected a create because the object exists
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists")
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} ({})", reason, code),
        reason: reason.to_string(),
        code,
    })
}
