use std::io::{self, Read};

use log::trace;
use thiserror::Error;

use crate::encoding::{EncodingError, TextEncoding};

use super::{ESCAPE, TERM_ERR, TERM_OK, response::{Reply, Status}};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed by peer")]
    Closed,
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
}

/// One framed message with its escape sequences undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub status: Status,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn decode(self, encoding: &TextEncoding) -> Result<Reply, EncodingError> {
        Ok(Reply {
            status: self.status,
            text: encoding.decode(&self.payload)?,
        })
    }
}

/// Reads framed messages off a byte stream, one byte at a time.
///
/// The reader does no buffering of its own; wrap sockets in a `BufReader`.
#[derive(Debug)]
pub struct FrameReader<R: Read> {
    stream: R,
}

impl<R: Read> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self { stream }
    }

    /// Reads a single raw byte, used for the handshake verdict and for
    /// the stray terminator that follows double-terminated replies.
    pub fn read_byte(&mut self) -> Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        self.stream.read_exact(&mut byte).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io(e),
        })?;
        Ok(byte[0])
    }

    /// Reads until an unescaped terminator. `0xFF` makes the next byte literal, so
    /// `FF FF` yields `FF` and `FF 00` yields a `00` that does not end the message.
    pub fn read_frame(&mut self) -> Result<Frame, TransportError> {
        let mut payload = Vec::new();

        let status = loop {
            match self.read_byte()? {
                TERM_OK => break Status::Ok,
                TERM_ERR => break Status::Error,
                ESCAPE => payload.push(self.read_byte()?),
                byte => payload.push(byte),
            }
        };

        trace!("read {status:?} frame of {} bytes", payload.len());
        Ok(Frame { status, payload })
    }
}

/// Appends `src` to `dst`, prefixing every byte that would otherwise be
/// read as a terminator or an escape with [`ESCAPE`].
pub fn escape_into(dst: &mut Vec<u8>, src: &[u8]) {
    dst.reserve(src.len());
    for &byte in src {
        if matches!(byte, TERM_OK | TERM_ERR | ESCAPE) {
            dst.push(ESCAPE);
        }
        dst.push(byte);
    }
}

pub fn escape(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    escape_into(&mut out, src);
    out
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn frames(bytes: &[u8]) -> FrameReader<Cursor<Vec<u8>>> {
        FrameReader::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn reads_success_frame() {
        let mut reader = frames(b"hello\0world\0");

        assert_eq!(
            reader.read_frame().unwrap(),
            Frame {
                status: Status::Ok,
                payload: b"hello".to_vec()
            }
        );
        assert_eq!(reader.read_frame().unwrap().payload, b"world".to_vec());
    }

    #[test]
    fn reads_error_frame() {
        let mut reader = frames(b"Stopped at line 1\x01");
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.status, Status::Error);
        assert_eq!(frame.payload, b"Stopped at line 1".to_vec());
    }

    #[test]
    fn escaped_null_does_not_terminate() {
        let mut reader = frames(b"a\xFF\x00b\0");
        assert_eq!(reader.read_frame().unwrap().payload, b"a\0b".to_vec());
    }

    #[test]
    fn escaped_escape_collapses() {
        let mut reader = frames(b"\xFF\xFFx\xFF\xFF\0next\0");

        assert_eq!(reader.read_frame().unwrap().payload, vec![0xFF, b'x', 0xFF]);
        assert_eq!(reader.read_frame().unwrap().payload, b"next".to_vec());
    }

    #[test]
    fn empty_frame() {
        let mut reader = frames(b"\0");
        assert!(reader.read_frame().unwrap().payload.is_empty());
    }

    #[test]
    fn truncated_stream_is_closed() {
        let mut reader = frames(b"partial");
        assert!(matches!(reader.read_frame(), Err(TransportError::Closed)));

        let mut reader = frames(b"trailing escape\xFF");
        assert!(matches!(reader.read_frame(), Err(TransportError::Closed)));
    }

    #[test]
    fn escaped_payload_decodes_back() {
        let payload: Vec<u8> = vec![0x00, b'a', 0x01, 0xFF, 0xFF, 0x00, 0xFE, 0x01, 0xFF];
        let mut wire = escape(&payload);
        wire.push(TERM_OK);

        let mut reader = frames(&wire);
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.status, Status::Ok);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn escapes_only_reserved_bytes() {
        assert_eq!(escape(b"plain"), b"plain".to_vec());
        assert_eq!(
            escape(&[0x00, 0x01, 0x02, 0xFF]),
            vec![0xFF, 0x00, 0xFF, 0x01, 0x02, 0xFF, 0xFF]
        );
    }

    #[test]
    fn frame_decodes_with_encoding() {
        let encoding = TextEncoding::for_label("iso-8859-1").unwrap();
        let reply = Frame {
            status: Status::Error,
            payload: b"caf\xE9".to_vec(),
        }
        .decode(&encoding)
        .unwrap();

        assert!(reply.is_error());
        assert_eq!(reply.text, "café");
    }
}
