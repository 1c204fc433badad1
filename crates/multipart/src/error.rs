use std::io;
use thiserror::Error;

/// Errors raised while building or streaming a multipart body.
///
/// Construction problems (boundary, field names, file headers) surface from
/// [`MultipartBodyBuilder::build`](crate::MultipartBodyBuilder::build) and never at read time.
#[derive(Error, Debug)]
pub enum MultipartError {
    #[error("invalid boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("invalid field name {name:?}: {reason}")]
    InvalidFieldName { name: String, reason: String },

    #[error("duplicate field name {name:?}")]
    DuplicateField { name: String },

    #[error("invalid file header: {reason}")]
    InvalidHeader { reason: String },

    #[error("multipart body is not seekable")]
    NotSeekable,

    #[error("rewind of file #{index} failed although it reported seekable: {source}")]
    RewindFailed { index: usize, source: io::Error },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl MultipartError {
    pub fn invalid_boundary<S: ToString>(str: S) -> Self {
        Self::InvalidBoundary { reason: str.to_string() }
    }

    pub fn invalid_field_name<N: ToString, S: ToString>(name: N, reason: S) -> Self {
        Self::InvalidFieldName { name: name.to_string(), reason: reason.to_string() }
    }

    pub fn duplicate_field<N: ToString>(name: N) -> Self {
        Self::DuplicateField { name: name.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn rewind_failed(index: usize, source: io::Error) -> Self {
        Self::RewindFailed { index, source }
    }
}

impl From<MultipartError> for io::Error {
    fn from(e: MultipartError) -> Self {
        match e {
            MultipartError::Io { source } => source,
            MultipartError::NotSeekable => io::Error::new(io::ErrorKind::Unsupported, e),
            other => io::Error::other(other),
        }
    }
}
