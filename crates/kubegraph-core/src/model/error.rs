//! Resource ingestion error types.

use thiserror::Error;

use super::kind::ResourceKind;

/// Errors raised while turning a raw object into a [`super::Resource`].
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The payload is not a JSON object.
    #[error("{kind} payload is not an object")]
    NotAnObject { kind: ResourceKind },

    /// A field required to identify the resource is absent.
    #[error("{kind} object is missing required field {field}")]
    MissingField {
        kind: ResourceKind,
        field: &'static str,
    },

    /// The payload declares a different kind than the stream it arrived on.
    #[error("object declares kind {declared} but arrived on the {expected} stream")]
    KindMismatch {
        expected: ResourceKind,
        declared: String,
    },
}
