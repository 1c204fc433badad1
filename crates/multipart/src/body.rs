//! The streaming multipart/form-data encoder.
//!
//! [`MultipartBody`] produces the wire bytes of a form body on demand. Nothing is
//! generated ahead of a [`read`](MultipartBody::read): each call drains whatever is
//! left of the part currently being written, then pulls the next piece from the
//! fields, then from the files, and finally writes the closing delimiter once.
//!
//! # Layout
//!
//! ```text
//! --{boundary}\r\n                                  \
//! Content-Disposition: form-data; name="a"\r\n      |  one chunk per field,
//! \r\n                                              |  in insertion order
//! 1\r\n                                             /
//! --{boundary}\r\n                                  \
//! {file headers}\r\n                                |  header block, then the raw
//! \r\n                                              |  file bytes, per file
//! {file bytes}                                      /
//! \r\n--{boundary}--                                   closing delimiter
//! ```
//!
//! # Cursor
//!
//! The body moves through four stages: fields, files, trailer and done.
//! [`is_eof`](MultipartBody::is_eof) only reports `true` once the closing
//! delimiter has been handed out.

use crate::boundary::Boundary;
use crate::content::PostFile;
use crate::part;
use crate::ensure;
use crate::MultipartError;
use bytes::{Bytes, BytesMut};
use http::HeaderValue;
use std::cell::Cell;
use std::collections::HashSet;
use std::io::SeekFrom;
use tracing::{debug, error, trace, warn};

/// Read size used by [`MultipartBody::to_bytes`] and the `http_body::Body` adapter.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Stage {
    Fields,
    Files,
    Trailer,
    Done,
}

/// A readable, rewindable multipart/form-data body.
///
/// Use [`MultipartBody::builder`] to assemble fields and files, then either pull
/// bytes with [`read`](Self::read), or hand the body to anything expecting
/// [`std::io::Read`] or [`http_body::Body`].
///
/// The body never closes the content of its files; [`close`](Self::close) gives them back.
#[derive(Debug)]
pub struct MultipartBody {
    fields: Vec<(String, String)>,
    files: Vec<PostFile>,
    boundary: Boundary,
    content_type: HeaderValue,
    chunk_size: usize,

    stage: Stage,
    pos: u64,
    current_field: usize,
    current_file: usize,
    buffered_headers: HashSet<usize>,
    pending: Bytes,
    size: Cell<Option<u64>>,
}

impl MultipartBody {
    pub fn builder() -> MultipartBodyBuilder {
        MultipartBodyBuilder::new()
    }

    /// Builds a body with a generated boundary from `fields` and `files`.
    ///
    /// # Errors
    /// See [`MultipartBodyBuilder::build`].
    pub fn new<I, K, V, F>(fields: I, files: F) -> Result<Self, MultipartError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
        F: IntoIterator<Item = PostFile>,
    {
        Self::builder().fields(fields).files(files).build()
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// The `Content-Type` header value announcing this body's boundary.
    pub fn content_type(&self) -> &HeaderValue {
        &self.content_type
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn files(&self) -> &[PostFile] {
        &self.files
    }

    /// Number of bytes handed out since construction or the last rewind.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// `true` once the closing delimiter has been fully read.
    pub fn is_eof(&self) -> bool {
        self.stage == Stage::Done && self.pending.is_empty()
    }

    /// A body is seekable when every attached file's content is.
    pub fn is_seekable(&self) -> bool {
        self.files.iter().all(|file| file.content().is_seekable())
    }

    /// Reads up to `max` bytes of the encoded body.
    ///
    /// Fewer bytes than requested may be returned, so callers loop until
    /// [`is_eof`](Self::is_eof). The read that finds everything else exhausted returns
    /// the whole closing delimiter, even when it is longer than `max`.
    ///
    /// # Errors
    /// Propagates I/O errors of the file contents. No bytes are lost on error:
    /// whatever was already taken from the pending buffer is put back.
    pub fn read(&mut self, max: usize) -> Result<Bytes, MultipartError> {
        if max == 0 {
            return Ok(Bytes::new());
        }

        let mut content = BytesMut::new();
        take_pending(&mut self.pending, max, &mut content);

        if content.len() < max {
            match self.read_data(max - content.len()) {
                Ok(data) => content.extend_from_slice(&data),
                Err(e) => {
                    restore_pending(&mut self.pending, content);
                    return Err(e);
                }
            }
        }

        if content.is_empty() && self.stage == Stage::Trailer {
            trace!(boundary = %self.boundary, "write closing delimiter");
            self.stage = Stage::Done;
            content.extend_from_slice(self.boundary.close_delimiter().as_bytes());
        }

        self.pos += content.len() as u64;
        Ok(content.freeze())
    }

    /// Rewinds the body to its first byte.
    ///
    /// Only `SeekFrom::Start(0)` is accepted, and only when every file is seekable;
    /// anything else returns `Ok(false)` without touching the cursor.
    ///
    /// # Errors
    /// [`MultipartError::RewindFailed`] when a file that reported itself seekable could
    /// not be rewound. The body is then in an undefined position and should be dropped.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<bool, MultipartError> {
        if pos != SeekFrom::Start(0) {
            warn!(?pos, "multipart body can only be rewound to its start");
            return Ok(false);
        }
        if !self.is_seekable() {
            warn!("multipart body has a file that is not seekable, refuse to rewind");
            return Ok(false);
        }

        for (index, file) in self.files.iter_mut().enumerate() {
            file.content_mut().rewind().map_err(|e| {
                error!(index, cause = %e, "rewind file failed although it is seekable");
                MultipartError::rewind_failed(index, e)
            })?;
        }

        self.pending = Bytes::new();
        self.stage = Stage::Fields;
        self.pos = 0;
        self.current_field = 0;
        self.current_file = 0;
        self.buffered_headers.clear();
        debug!("multipart body rewound");
        Ok(true)
    }

    /// Total encoded length, or `None` when a file's content length is unknown
    /// or the lengths do not fit in a `u64`.
    ///
    /// The computed value is memoized; [`set_size`](Self::set_size) overrides it.
    pub fn size(&self) -> Option<u64> {
        if let Some(size) = self.size.get() {
            return Some(size);
        }

        // declared reader sizes are trusted, so an overflowing sum is treated as unknown
        let mut size = self.boundary.close_delimiter_len() as u64;
        for file in &self.files {
            let content_len = file.content().size()?;
            let header_len = part::file_header_len(&self.boundary, &file.headers()) as u64;
            size = size.checked_add(header_len)?.checked_add(content_len)?;
        }
        for (key, value) in &self.fields {
            size = size.checked_add(part::field_len(&self.boundary, key, value) as u64)?;
        }

        debug!(size, "computed multipart body size");
        self.size.set(Some(size));
        Some(size)
    }

    /// Overrides the reported size with a value known by other means.
    pub fn set_size(&mut self, size: u64) {
        self.size.set(Some(size));
    }

    /// Reads the whole body into memory and rewinds it again.
    ///
    /// # Errors
    /// [`MultipartError::NotSeekable`] when the body can not be rewound, or any read error.
    pub fn to_bytes(&mut self) -> Result<Bytes, MultipartError> {
        ensure!(self.seek(SeekFrom::Start(0))?, MultipartError::NotSeekable);

        let capacity = self.size().and_then(|size| usize::try_from(size).ok()).unwrap_or(self.chunk_size);
        let mut buf = BytesMut::with_capacity(capacity);
        while !self.is_eof() {
            let chunk = self.read(self.chunk_size)?;
            buf.extend_from_slice(&chunk);
        }

        self.seek(SeekFrom::Start(0))?;
        Ok(buf.freeze())
    }

    /// Drops the fields and hands the files back without closing their content.
    ///
    /// Reading after `close` yields nothing.
    pub fn close(&mut self) -> Vec<PostFile> {
        self.fields.clear();
        self.buffered_headers.clear();
        self.pending = Bytes::new();
        self.stage = Stage::Done;
        std::mem::take(&mut self.files)
    }

    /// Puts bytes that were read but not delivered back in front of the pending buffer.
    pub(crate) fn unread(&mut self, bytes: Bytes) {
        self.pos -= bytes.len() as u64;
        restore_pending(&mut self.pending, BytesMut::from(&bytes[..]));
    }

    /// The pending buffer is empty, so more data is pulled from fields and files.
    fn read_data(&mut self, len: usize) -> Result<Bytes, MultipartError> {
        if self.stage == Stage::Fields {
            if self.current_field < self.fields.len() {
                return Ok(self.read_field(len));
            }
            self.stage = Stage::Files;
        }

        if self.stage == Stage::Files {
            return self.read_file(len);
        }

        Ok(Bytes::new())
    }

    fn read_field(&mut self, len: usize) -> Bytes {
        let (key, value) = &self.fields[self.current_field];
        trace!(index = self.current_field, name = %key, "write field");
        self.pending = part::render_field(&self.boundary, key, value);
        self.current_field += 1;

        let mut content = BytesMut::new();
        take_pending(&mut self.pending, len, &mut content);
        content.freeze()
    }

    /// Reads from the current file, skipping files whose content is exhausted.
    fn read_file(&mut self, len: usize) -> Result<Bytes, MultipartError> {
        loop {
            let index = self.current_file;
            let Some(file) = self.files.get_mut(index) else {
                self.stage = Stage::Trailer;
                return Ok(Bytes::new());
            };

            let header_sent = self.buffered_headers.contains(&index);
            if header_sent && file.content().is_eof() {
                trace!(index, name = %file.name(), "file exhausted, move to next");
                self.current_file += 1;
                continue;
            }

            // an empty file still gets its header block, so the part is present and `size()` holds
            if !header_sent {
                trace!(index, name = %file.name(), filename = %file.filename(), "write file header");
                self.pending = part::render_file_header(&self.boundary, &file.headers());
                self.buffered_headers.insert(index);
            }

            let mut content = BytesMut::new();
            take_pending(&mut self.pending, len, &mut content);
            if content.len() < len {
                match file.content_mut().read(len - content.len()) {
                    Ok(data) => content.extend_from_slice(&data),
                    Err(e) => {
                        restore_pending(&mut self.pending, content);
                        return Err(e.into());
                    }
                }
            }

            if content.is_empty() && file.content().is_eof() {
                continue;
            }
            return Ok(content.freeze());
        }
    }
}

/// Moves up to `len` bytes from the front of `pending` into `dst`.
fn take_pending(pending: &mut Bytes, len: usize, dst: &mut BytesMut) {
    if pending.is_empty() {
        return;
    }
    let n = len.min(pending.len());
    dst.extend_from_slice(&pending.split_to(n));
}

fn restore_pending(pending: &mut Bytes, mut consumed: BytesMut) {
    if consumed.is_empty() {
        return;
    }
    consumed.extend_from_slice(pending);
    *pending = consumed.freeze();
}

/// Collects the fields, files and settings of a [`MultipartBody`].
///
/// Everything is validated in [`build`](Self::build), so a body that was built
/// never fails for configuration reasons while being read.
#[derive(Debug)]
pub struct MultipartBodyBuilder {
    boundary: Option<String>,
    fields: Vec<(String, String)>,
    files: Vec<PostFile>,
    chunk_size: usize,
}

impl MultipartBodyBuilder {
    fn new() -> Self {
        Self { boundary: None, fields: Vec::new(), files: Vec::new(), chunk_size: DEFAULT_CHUNK_SIZE }
    }

    /// Uses a fixed boundary instead of a generated one.
    #[must_use]
    pub fn boundary<S: Into<String>>(mut self, boundary: S) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    #[must_use]
    pub fn field<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn fields<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn file(mut self, file: PostFile) -> Self {
        self.files.push(file);
        self
    }

    #[must_use]
    pub fn files<F: IntoIterator<Item = PostFile>>(mut self, files: F) -> Self {
        self.files.extend(files);
        self
    }

    /// Read size of the body adapters, at least one byte.
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Validates everything and creates the body.
    ///
    /// # Errors
    /// - [`MultipartError::InvalidBoundary`] for a boundary outside the RFC 2046 grammar
    /// - [`MultipartError::InvalidFieldName`] / [`MultipartError::DuplicateField`] for bad field keys
    /// - [`MultipartError::InvalidHeader`] for file names or headers that would break the framing
    pub fn build(self) -> Result<MultipartBody, MultipartError> {
        let boundary = match self.boundary {
            Some(boundary) => Boundary::new(boundary)?,
            None => Boundary::generate(),
        };

        {
            let mut seen = HashSet::with_capacity(self.fields.len());
            for (key, _) in &self.fields {
                part::validate_field_name(key)?;
                ensure!(seen.insert(key.as_str()), MultipartError::duplicate_field(key));
            }
        }
        for file in &self.files {
            file.validate()?;
        }

        let content_type = HeaderValue::from_str(&format!("{}; boundary={}", mime::MULTIPART_FORM_DATA, boundary.header_param()))
            .map_err(MultipartError::invalid_boundary)?;

        debug!(
            boundary = %boundary,
            fields = self.fields.len(),
            files = self.files.len(),
            "build multipart body"
        );

        Ok(MultipartBody {
            fields: self.fields,
            files: self.files,
            boundary,
            content_type,
            chunk_size: self.chunk_size,
            stage: Stage::Fields,
            pos: 0,
            current_field: 0,
            current_file: 0,
            buffered_headers: HashSet::new(),
            pending: Bytes::new(),
            size: Cell::new(None),
        })
    }
}
