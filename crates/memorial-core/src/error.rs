use thiserror::Error;

use crate::ResourceType;

pub type MemorialResult<T> = Result<T, MemorialError>;

#[derive(Error, Debug)]
pub enum MemorialError {
    /// An empty title was provided for a clip.
    #[error("Title cannot be empty")]
    EmptyTitle,
    /// An empty video reference was provided for a clip.
    #[error("Video reference cannot be empty")]
    EmptyVideoReference,
    /// An empty body was provided for a message.
    #[error("Message cannot be empty")]
    EmptyBody,
    /// A field exceeds its maximum length.
    #[error("Max allowed size of {field}: {max_size}, current size: {curr_size}")]
    InvalidLength {
        field: &'static str,
        max_size: usize,
        curr_size: usize,
    },
    /// Any other malformed submission, e.g. an unparsable request body.
    #[error("{msg}")]
    InvalidRequest { msg: String },
    #[error("Unknown resource type: {name}")]
    UnknownResource { name: String },
    /// The requested ID does not exist in the collection.
    #[error("No {kind} post exists with id {id}")]
    NotFound { kind: ResourceType, id: String },
    /// The presented credentials do not allow the operation.
    #[error("Not allowed to delete this post")]
    Forbidden,
    #[error("Storage error: {msg}")]
    Storage { msg: String },
}

impl MemorialError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage { msg: msg.into() }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest { msg: msg.into() }
    }

    pub fn not_found(kind: ResourceType, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// True for the validation class of errors: the caller sent something
    /// malformed and retrying the same request cannot succeed. An unknown
    /// collection is not part of it; it names a resource that does not
    /// exist, like `NotFound`.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyTitle
                | Self::EmptyVideoReference
                | Self::EmptyBody
                | Self::InvalidLength { .. }
                | Self::InvalidRequest { .. }
        )
    }
}

impl From<sqlite::Error> for MemorialError {
    fn from(err: sqlite::Error) -> Self {
        Self::storage(err.to_string())
    }
}
