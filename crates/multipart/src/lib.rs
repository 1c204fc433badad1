//! A streaming multipart/form-data request body
//!
//! This crate encodes named form fields and file attachments into a
//! `multipart/form-data` body ([RFC 7578](https://tools.ietf.org/html/rfc7578))
//! without holding the whole body in memory. Bytes are produced only when the
//! consumer pulls them, whatever read size it uses.
//!
//! # Example
//!
//! ```no_run
//! use micro_multipart::{MultipartBody, PostFile};
//! use std::io::SeekFrom;
//!
//! let mut body = MultipartBody::builder()
//!     .field("title", "quarterly report")
//!     .file(PostFile::open("report", "report.csv")?)
//!     .build()?;
//!
//! // the header value announcing the boundary
//! let content_type = body.content_type().clone();
//! // exact length, as long as every file knows its size
//! let content_length = body.size();
//!
//! while !body.is_eof() {
//!     let chunk = body.read(8192)?;
//!     // ... hand `chunk` to the transport ...
//! }
//!
//! // retrying a request starts over from the first byte
//! assert!(body.seek(SeekFrom::Start(0))?);
//! # Ok::<(), micro_multipart::MultipartError>(())
//! ```
//!
//! # Architecture
//!
//! - [`boundary`]: generation and validation of the delimiter token
//! - [`content`]: file attachments ([`PostFile`]) and their byte sources ([`Content`])
//! - [`MultipartBody`]: the pull based encoder, its cursor and pending buffer
//! - `std::io::Read`, `std::io::Seek` and `http_body::Body` adapters on [`MultipartBody`]
//!
//! # Seeking
//!
//! The format has no random access: the only legal seek is a rewind to the start,
//! and only when every attached content source can itself be rewound.
//!
//! # Ownership of file contents
//!
//! The body reads and rewinds file contents but never closes them.
//! [`MultipartBody::close`] returns the files to the caller.

pub mod boundary;
pub mod content;

mod body;
mod error;
mod part;
mod stream;

pub use body::DEFAULT_CHUNK_SIZE;
pub use body::MultipartBody;
pub use body::MultipartBodyBuilder;
pub use boundary::Boundary;
pub use content::Content;
pub use content::PostFile;
pub use error::MultipartError;

mod utils;
pub(crate) use utils::ensure;
