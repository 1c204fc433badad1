//! File attachments and the byte sources behind them.
//!
//! [`Content`] is a closed set of sources the encoder knows how to drive:
//!
//! - memory: a [`Bytes`] buffer, seekable, known size
//! - file: an open [`std::fs::File`], seekable, size taken from its metadata
//! - reader: any [`Read`] implementation, not seekable, size only if declared
//!
//! The encoder only reads and rewinds a source. Dropping or closing a file is
//! left to whoever gets the [`PostFile`] back from
//! [`MultipartBody::close`](crate::MultipartBody::close).

use crate::ensure;
use crate::MultipartError;
use bytes::{Bytes, BytesMut};
use mime::Mime;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Upper bound of a single read from a file or reader; short reads are part of the contract.
const MAX_READ_CHUNK: usize = 64 * 1024;

/// The byte source of a file attachment.
pub struct Content {
    kind: Kind,
}

enum Kind {
    Memory { data: Bytes, pos: usize },
    File { file: File, len: u64, pos: u64, reached_end: bool },
    Reader { reader: Box<dyn Read + Send>, size: Option<u64>, pos: u64, reached_end: bool },
}

impl Content {
    /// An in-memory source.
    pub fn memory<B: Into<Bytes>>(data: B) -> Self {
        Self { kind: Kind::Memory { data: data.into(), pos: 0 } }
    }

    /// A file-backed source.
    ///
    /// The length is taken from the file metadata and the source counts from
    /// offset 0, so the caller must hand over a file positioned at its start.
    /// Bytes already consumed from it would be missing from the body while
    /// still being counted by [`size`](Self::size). [`PostFile::open`] always
    /// passes a freshly opened file.
    ///
    /// # Errors
    /// Fails when the file metadata can not be queried.
    pub fn file(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self { kind: Kind::File { file, len, pos: 0, reached_end: false } })
    }

    /// A forward-only source. `size` is trusted when given, otherwise the total
    /// length of the body becomes indeterminate.
    pub fn reader<R: Read + Send + 'static>(reader: R, size: Option<u64>) -> Self {
        Self { kind: Kind::Reader { reader: Box::new(reader), size, pos: 0, reached_end: false } }
    }

    /// Reads up to `max` bytes. An empty result means no bytes are currently available.
    /// File and reader sources return at most 64 KiB per call.
    ///
    /// # Errors
    /// Propagates the I/O error of the underlying file or reader.
    pub fn read(&mut self, max: usize) -> io::Result<Bytes> {
        if max == 0 {
            return Ok(Bytes::new());
        }
        match &mut self.kind {
            Kind::Memory { data, pos } => {
                let end = *pos + max.min(data.len() - *pos);
                let chunk = data.slice(*pos..end);
                *pos = end;
                Ok(chunk)
            }
            Kind::File { file, len, pos, reached_end } => {
                // never read past the length the size was computed from
                let remaining = usize::try_from(len.saturating_sub(*pos)).unwrap_or(usize::MAX);
                if remaining == 0 {
                    *reached_end = true;
                    return Ok(Bytes::new());
                }
                let chunk = read_some(file, max.min(remaining))?;
                if chunk.is_empty() {
                    *reached_end = true;
                }
                *pos += chunk.len() as u64;
                Ok(chunk)
            }
            Kind::Reader { reader, pos, reached_end, .. } => {
                let chunk = read_some(reader, max)?;
                if chunk.is_empty() {
                    *reached_end = true;
                }
                *pos += chunk.len() as u64;
                Ok(chunk)
            }
        }
    }

    /// Whether the source has no more bytes to give.
    ///
    /// Forward-only readers without a declared size only learn this from a read returning nothing.
    pub fn is_eof(&self) -> bool {
        match &self.kind {
            Kind::Memory { data, pos } => *pos >= data.len(),
            Kind::File { len, pos, reached_end, .. } => *reached_end || *pos >= *len,
            Kind::Reader { size, pos, reached_end, .. } => *reached_end || size.is_some_and(|size| *pos >= size),
        }
    }

    pub fn is_seekable(&self) -> bool {
        !matches!(self.kind, Kind::Reader { .. })
    }

    /// Moves the source back to its first byte.
    ///
    /// # Errors
    /// Readers are not seekable and always fail with [`io::ErrorKind::Unsupported`].
    pub fn rewind(&mut self) -> io::Result<()> {
        match &mut self.kind {
            Kind::Memory { pos, .. } => {
                *pos = 0;
                Ok(())
            }
            Kind::File { file, pos, reached_end, .. } => {
                file.seek(SeekFrom::Start(0))?;
                *pos = 0;
                *reached_end = false;
                Ok(())
            }
            Kind::Reader { .. } => Err(io::Error::new(io::ErrorKind::Unsupported, "reader content can not be rewound")),
        }
    }

    /// Total length in bytes, `None` when unknown.
    pub fn size(&self) -> Option<u64> {
        match &self.kind {
            Kind::Memory { data, .. } => Some(data.len() as u64),
            Kind::File { len, .. } => Some(*len),
            Kind::Reader { size, .. } => *size,
        }
    }
}

fn read_some<R: Read + ?Sized>(reader: &mut R, max: usize) -> io::Result<Bytes> {
    let mut buf = BytesMut::zeroed(max.min(MAX_READ_CHUNK));
    let n = loop {
        match reader.read(&mut buf) {
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    };
    buf.truncate(n);
    Ok(buf.freeze())
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Memory { data, pos } => f.debug_struct("Memory").field("len", &data.len()).field("pos", pos).finish(),
            Kind::File { len, pos, .. } => f.debug_struct("File").field("len", len).field("pos", pos).finish(),
            Kind::Reader { size, pos, .. } => f.debug_struct("Reader").field("size", size).field("pos", pos).finish(),
        }
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Self::memory(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Self::memory(bytes)
    }
}

impl From<&'static str> for Content {
    fn from(value: &'static str) -> Self {
        Self::memory(value)
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Self::memory(value)
    }
}

/// A file part: form field name, filename, content type and the bytes to send.
#[derive(Debug)]
pub struct PostFile {
    name: String,
    filename: String,
    content_type: Mime,
    extra_headers: Vec<(String, String)>,
    content: Content,
}

impl PostFile {
    /// Creates a file part, guessing the content type from the filename extension
    /// and falling back to `application/octet-stream`.
    pub fn new<N, F, C>(name: N, filename: F, content: C) -> Self
    where
        N: Into<String>,
        F: Into<String>,
        C: Into<Content>,
    {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename).first_or_octet_stream();
        Self { name: name.into(), filename, content_type, extra_headers: Vec::new(), content: content.into() }
    }

    /// Opens `path` and attaches it under `name`, using the path's file name as filename.
    ///
    /// # Errors
    /// Fails when the file can not be opened or inspected.
    pub fn open<N: Into<String>, P: AsRef<Path>>(name: N, path: P) -> Result<Self, MultipartError> {
        let path = path.as_ref();
        let filename = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        let content = Content::file(File::open(path)?)?;
        Ok(Self::new(name, filename, content))
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: Mime) -> Self {
        self.content_type = content_type;
        self
    }

    /// Adds a header rendered after `Content-Disposition` and `Content-Type`.
    #[must_use]
    pub fn with_header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut Content {
        &mut self.content
    }

    pub fn into_content(self) -> Content {
        self.content
    }

    /// The pre-formatted header lines of this part, CRLF separated, without a trailing CRLF.
    pub fn headers(&self) -> String {
        let mut headers = format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}",
            self.name, self.filename, self.content_type
        );
        for (name, value) in &self.extra_headers {
            headers.push_str("\r\n");
            headers.push_str(name);
            headers.push_str(": ");
            headers.push_str(value);
        }
        headers
    }

    pub(crate) fn validate(&self) -> Result<(), MultipartError> {
        ensure!(!self.name.is_empty(), MultipartError::invalid_header("file field name must not be empty"));
        for (what, text) in [("field name", &self.name), ("filename", &self.filename)] {
            ensure!(
                !text.contains(['"', '\r', '\n']),
                MultipartError::invalid_header(format!("{what} {text:?} must not contain quotes, CR or LF"))
            );
        }
        for (name, value) in &self.extra_headers {
            ensure!(
                !name.is_empty() && !name.contains([':', '\r', '\n']),
                MultipartError::invalid_header(format!("invalid header name {name:?}"))
            );
            ensure!(
                !value.contains(['\r', '\n']),
                MultipartError::invalid_header(format!("value of header {name} must not contain CR or LF"))
            );
        }
        Ok(())
    }
}
