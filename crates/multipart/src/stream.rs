//! Adapters exposing [`MultipartBody`] as a standard byte stream.
//!
//! - [`std::io::Read`]: honours the caller's buffer length exactly
//! - [`std::io::Seek`]: rewind to start and position queries only
//! - [`http_body::Body`]: frames of [`MultipartBody::chunk_size`] bytes, with an
//!   exact size hint whenever the total length is known

use crate::{MultipartBody, MultipartError};
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::io::{self, Read, Seek, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

impl Read for MultipartBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut bytes = MultipartBody::read(self, buf.len())?;
        if bytes.len() > buf.len() {
            // only the closing delimiter can exceed the requested length
            let rest = bytes.split_off(buf.len());
            self.unread(rest);
        }
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}

impl Seek for MultipartBody {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if pos == SeekFrom::Current(0) {
            return Ok(self.tell());
        }
        if MultipartBody::seek(self, pos)? {
            Ok(0)
        } else {
            Err(io::Error::new(io::ErrorKind::Unsupported, "multipart body can only be rewound to its start"))
        }
    }
}

impl Body for MultipartBody {
    type Data = Bytes;
    type Error = MultipartError;

    fn poll_frame(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let chunk_size = this.chunk_size();
        loop {
            if this.is_eof() {
                return Poll::Ready(None);
            }
            match MultipartBody::read(this, chunk_size) {
                Ok(bytes) if bytes.is_empty() => continue,
                Ok(bytes) => return Poll::Ready(Some(Ok(Frame::data(bytes)))),
                Err(e) => return Poll::Ready(Some(Err(e))),
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.is_eof()
    }

    fn size_hint(&self) -> SizeHint {
        match self.size() {
            Some(size) => SizeHint::with_exact(size.saturating_sub(self.tell())),
            None => SizeHint::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Content, MultipartBody, PostFile};
    use http_body::Body;
    use http_body_util::BodyExt;
    use std::io::{self, Read, Seek, SeekFrom};

    fn body() -> MultipartBody {
        MultipartBody::builder()
            .boundary("b")
            .field("a", "1")
            .file(PostFile::new("f", "a.txt", "hello"))
            .chunk_size(16)
            .build()
            .unwrap()
    }

    fn check_send<T: Send>() {}

    #[test]
    fn is_send() {
        check_send::<MultipartBody>();
    }

    #[test]
    fn test_io_read_small_buffers() {
        let expected = body().to_bytes().unwrap();

        let mut body = body();
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = Read::read(&mut body, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            assert!(n <= buf.len());
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, expected.to_vec());
        assert!(body.is_eof());
        assert_eq!(body.tell(), expected.len() as u64);
    }

    #[test]
    fn test_io_read_to_end() {
        let mut body = body();
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        assert!(out.ends_with(b"\r\n\r\nhello\r\n--b--"));
    }

    #[test]
    fn test_io_seek() {
        let mut body = body();
        let mut first = Vec::new();
        body.read_to_end(&mut first).unwrap();

        assert_eq!(body.stream_position().unwrap(), first.len() as u64);
        assert_eq!(Seek::seek(&mut body, SeekFrom::Start(0)).unwrap(), 0);

        let mut second = Vec::new();
        body.read_to_end(&mut second).unwrap();
        assert_eq!(first, second);

        let err = Seek::seek(&mut body, SeekFrom::Start(3)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn test_io_seek_unseekable() {
        let mut body = MultipartBody::builder()
            .file(PostFile::new("f", "s.bin", Content::reader(io::empty(), None)))
            .build()
            .unwrap();
        let err = Seek::seek(&mut body, SeekFrom::Start(0)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn test_body_collect() {
        let expected = body().to_bytes().unwrap();
        let body = body();

        assert_eq!(body.size_hint().exact(), Some(expected.len() as u64));
        assert!(!body.is_end_stream());

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, expected);
    }

    #[tokio::test]
    async fn test_body_frames() {
        let mut body = body();
        let total = body.size().unwrap();

        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(first.len(), 16);
        assert_eq!(body.size_hint().exact(), Some(total - 16));

        while body.frame().await.is_some() {}
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }

    #[tokio::test]
    async fn test_body_unknown_size() {
        let mut body = MultipartBody::builder()
            .boundary("b")
            .file(PostFile::new("f", "s.bin", Content::reader(io::Cursor::new(b"data".to_vec()), None)))
            .build()
            .unwrap();

        assert_eq!(body.size_hint().exact(), None);
        let collected = (&mut body).collect().await.unwrap().to_bytes();
        assert!(collected.ends_with(b"\r\n\r\ndata\r\n--b--"));
        assert!(body.is_end_stream());
    }
}
