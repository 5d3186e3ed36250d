//! Error types for the blog service.
//!
//! This module defines the central `Error` enum, which captures every failure
//! the service reports to callers. It implements `From<Error>` for
//! `tonic::Status` so handlers can propagate errors with `?` and clients see a
//! coarse-grained status code with a descriptive message.
//!
//! ## Error Cases
//! - `InvalidId`: The identifier is not a valid store key.
//! - `InvalidRequest`: The request is missing a required payload.
//! - `NotFound`: No document matches a well-formed identifier.
//! - `Store`: The document store failed (connectivity, decode, write).
//! - `UnexpectedKey`: The store generated a key of an unexpected type.
//! - `ChannelError`: An internal communication failure while streaming.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the blog service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The identifier could not be parsed into the store's key format.
    #[error("Invalid blog id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    /// The client request was malformed.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// No document exists for the identifier.
    #[error("Blog {id} not found")]
    NotFound { id: String },

    /// The document store reported a failure.
    #[error("Store error: {context}")]
    Store { context: String },

    /// The store returned a generated key that is not the expected key type.
    #[error("Unexpected key: {context}")]
    UnexpectedKey { context: String },

    /// Internal channel send/receive failure (e.g., closed channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            e @ Error::InvalidId { .. } => Status::invalid_argument(e.to_string()),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            e @ Error::NotFound { .. } => Status::not_found(e.to_string()),
            Error::Store { context } => Status::internal(format!("Store error: {context}")),
            Error::UnexpectedKey { context } => {
                Status::internal(format!("Cannot convert generated key: {context}"))
            }
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn maps_each_variant_to_its_status_code() {
        let cases = [
            (
                Error::InvalidId {
                    id: "nope".into(),
                    reason: "bad hex".into(),
                },
                Code::InvalidArgument,
            ),
            (
                Error::InvalidRequest {
                    reason: "missing blog".into(),
                },
                Code::InvalidArgument,
            ),
            (Error::NotFound { id: "abc".into() }, Code::NotFound),
            (
                Error::Store {
                    context: "connection reset".into(),
                },
                Code::Internal,
            ),
            (
                Error::UnexpectedKey {
                    context: "String(\"x\")".into(),
                },
                Code::Internal,
            ),
            (
                Error::ChannelError {
                    context: "closed".into(),
                },
                Code::Internal,
            ),
            (Error::ServiceShutdown, Code::Unavailable),
        ];

        for (err, code) in cases {
            assert_eq!(Status::from(err.clone()).code(), code, "{err}");
        }
    }

    #[test]
    fn not_found_message_names_the_id() {
        let status = Status::from(Error::NotFound {
            id: "65f0c0ffee0000000000beef".into(),
        });
        assert!(status.message().contains("65f0c0ffee0000000000beef"));
    }

    #[test]
    fn invalid_request_passes_reason_through() {
        let status = Status::from(Error::InvalidRequest {
            reason: "missing blog".into(),
        });
        assert_eq!(status.message(), "missing blog");
    }
}
