//! Boundary token policy for multipart bodies.
//!
//! The boundary is chosen once, validated against the `bchars` grammar of
//! [RFC 2046 Section 5.1.1](https://tools.ietf.org/html/rfc2046#section-5.1.1),
//! and then used verbatim in every delimiter for the lifetime of the body.

use crate::MultipartError;
use crate::ensure;
use std::borrow::Cow;
use std::fmt;

const MAX_BOUNDARY_LEN: usize = 70;
const RANDOM_LEN: usize = 32;
const GENERATED_PREFIX: &str = "------------------------";

/// An immutable multipart delimiter token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Boundary(String);

impl Boundary {
    /// Generates a random boundary made of alphanumerics behind a dash prefix.
    pub fn generate() -> Self {
        let mut token = String::with_capacity(GENERATED_PREFIX.len() + RANDOM_LEN);
        token.push_str(GENERATED_PREFIX);
        token.extend(std::iter::repeat_with(fastrand::alphanumeric).take(RANDOM_LEN));
        Self(token)
    }

    /// Uses a caller supplied boundary, e.g. for deterministic output.
    ///
    /// # Errors
    /// Returns [`MultipartError::InvalidBoundary`] when the token is empty, longer than
    /// 70 bytes, ends with a space, or contains a character outside `bchars`.
    pub fn new<S: Into<String>>(token: S) -> Result<Self, MultipartError> {
        let token = token.into();
        ensure!(!token.is_empty(), MultipartError::invalid_boundary("boundary must not be empty"));
        ensure!(
            token.len() <= MAX_BOUNDARY_LEN,
            MultipartError::invalid_boundary(format!("length {} exceed the limit {MAX_BOUNDARY_LEN}", token.len()))
        );
        ensure!(!token.ends_with(' '), MultipartError::invalid_boundary("boundary must not end with a space"));
        if let Some(c) = token.chars().find(|c| !is_bchar(*c)) {
            return Err(MultipartError::invalid_boundary(format!("character {c:?} is not allowed")));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `\r\n--{boundary}--`, the terminator written once after the last part.
    pub fn close_delimiter(&self) -> String {
        format!("\r\n--{}--", self.0)
    }

    /// The boundary as a `Content-Type` parameter value, quoted when it holds tspecials.
    pub fn header_param(&self) -> Cow<'_, str> {
        if self.0.contains(|c| matches!(c, '(' | ')' | ',' | '/' | ':' | '=' | '?' | ' ')) {
            Cow::Owned(format!("\"{}\"", self.0))
        } else {
            Cow::Borrowed(&self.0)
        }
    }

    pub(crate) fn part_delimiter_len(&self) -> usize {
        self.0.len() + 4
    }

    pub(crate) fn close_delimiter_len(&self) -> usize {
        self.0.len() + 6
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Boundary {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_bchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '\'' | '(' | ')' | '+' | '_' | ',' | '-' | '.' | '/' | ':' | '=' | '?' | ' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate() {
        let boundary = Boundary::generate();
        assert_eq!(boundary.as_str().len(), GENERATED_PREFIX.len() + RANDOM_LEN);
        assert!(boundary.as_str().starts_with(GENERATED_PREFIX));
        assert!(Boundary::new(boundary.as_str()).is_ok());
    }

    #[test]
    fn test_generate_is_not_repeated() {
        assert_ne!(Boundary::generate(), Boundary::generate());
    }

    #[test]
    fn test_delimiters() {
        let boundary = Boundary::new("abc").unwrap();
        assert_eq!(boundary.close_delimiter(), "\r\n--abc--");
        assert_eq!(boundary.part_delimiter_len(), "--abc\r\n".len());
        assert_eq!(boundary.close_delimiter_len(), boundary.close_delimiter().len());
    }

    #[test]
    fn test_header_param() {
        assert_eq!(Boundary::new("abc-123").unwrap().header_param(), "abc-123");
        assert_eq!(Boundary::new("a b").unwrap().header_param(), "\"a b\"");
        assert_eq!(Boundary::new("a=b").unwrap().header_param(), "\"a=b\"");
    }

    #[test]
    fn test_invalid_boundaries() {
        assert!(matches!(Boundary::new(""), Err(MultipartError::InvalidBoundary { .. })));
        assert!(matches!(Boundary::new("a".repeat(71)), Err(MultipartError::InvalidBoundary { .. })));
        assert!(matches!(Boundary::new("abc "), Err(MultipartError::InvalidBoundary { .. })));
        assert!(matches!(Boundary::new("a\r\nb"), Err(MultipartError::InvalidBoundary { .. })));
        assert!(matches!(Boundary::new("a\"b"), Err(MultipartError::InvalidBoundary { .. })));
    }

    #[test]
    fn test_valid_boundaries() {
        assert!(Boundary::new("a".repeat(70)).is_ok());
        assert!(Boundary::new("simple boundary").is_ok());
        assert!(Boundary::new("'()+_,-./:=?").is_ok());
    }
}
