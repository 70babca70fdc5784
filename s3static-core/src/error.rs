//! Error taxonomy for request handling

use thiserror::Error;

/// Failure classes a request can end in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The request path could not be percent-decoded
    MalformedRequest,
    /// No object and no prefix matches the request
    NotFound,
    /// The store could not be reached while listing
    StoreUnavailable,
    /// The store failed while fetching an object
    FetchFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedRequest => "MalformedRequest",
            Self::NotFound => "NotFound",
            Self::StoreUnavailable => "StoreUnavailable",
            Self::FetchFailed => "FetchFailed",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedRequest => 400,
            Self::NotFound => 404,
            Self::StoreUnavailable | Self::FetchFailed => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised while turning a request into a response
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ServeError {
    pub code: ErrorCode,
    pub message: String,
    pub resource: Option<String>,
}

impl ServeError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedRequest, message)
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, "no object or prefix matches").with_resource(resource)
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreUnavailable, message)
    }

    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FetchFailed, message)
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}
