//! Rendering of individual parts.
//!
//! A field is rendered in one piece:
//!
//! ```text
//! --{boundary}\r\n
//! Content-Disposition: form-data; name="{key}"\r\n
//! \r\n
//! {value}\r\n
//! ```
//!
//! A file only has its header block rendered here; the raw content follows it
//! directly and the next part's leading delimiter separates the two.

use crate::boundary::Boundary;
use crate::ensure;
use crate::MultipartError;
use bytes::{BufMut, Bytes, BytesMut};

const FIELD_DISPOSITION_PREFIX: &[u8] = b"Content-Disposition: form-data; name=\"";
const FIELD_DISPOSITION_SUFFIX: &[u8] = b"\"\r\n\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";
const CRLF: &[u8] = b"\r\n";

pub(crate) fn render_field(boundary: &Boundary, key: &str, value: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(field_len(boundary, key, value));
    put_part_delimiter(&mut buf, boundary);
    buf.put_slice(FIELD_DISPOSITION_PREFIX);
    buf.put_slice(key.as_bytes());
    buf.put_slice(FIELD_DISPOSITION_SUFFIX);
    buf.put_slice(value.as_bytes());
    buf.put_slice(CRLF);
    buf.freeze()
}

pub(crate) fn field_len(boundary: &Boundary, key: &str, value: &str) -> usize {
    boundary.part_delimiter_len()
        + FIELD_DISPOSITION_PREFIX.len()
        + key.len()
        + FIELD_DISPOSITION_SUFFIX.len()
        + value.len()
        + CRLF.len()
}

pub(crate) fn render_file_header(boundary: &Boundary, headers: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(file_header_len(boundary, headers));
    put_part_delimiter(&mut buf, boundary);
    buf.put_slice(headers.as_bytes());
    buf.put_slice(HEADER_END);
    buf.freeze()
}

pub(crate) fn file_header_len(boundary: &Boundary, headers: &str) -> usize {
    boundary.part_delimiter_len() + headers.len() + HEADER_END.len()
}

fn put_part_delimiter(buf: &mut BytesMut, boundary: &Boundary) {
    buf.put_slice(b"--");
    buf.put_slice(boundary.as_str().as_bytes());
    buf.put_slice(CRLF);
}

/// Field names end up inside a quoted header parameter, so they must not break out of it.
pub(crate) fn validate_field_name(name: &str) -> Result<(), MultipartError> {
    ensure!(!name.is_empty(), MultipartError::invalid_field_name(name, "name must not be empty"));
    ensure!(!name.contains('"'), MultipartError::invalid_field_name(name, "name must not contain a quote"));
    ensure!(
        !name.contains(['\r', '\n']),
        MultipartError::invalid_field_name(name, "name must not contain CR or LF")
    );
    Ok(())
}
