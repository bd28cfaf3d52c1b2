//! Text encoding negotiated for a connection.
//!
//! Every string that travels over the wire, in either direction, is converted with the
//! connection's [`TextEncoding`]. Public API calls accept either text or raw bytes through
//! [`Argument`]; [`TextEncoding::encode_argument`] is the single place where that coercion
//! happens.
//!
//! # Example
//! ```rust
//! use basex_client::{Argument, TextEncoding};
//!
//! let encoding = TextEncoding::for_label("latin1").unwrap();
//! let argument = Argument::from("café");
//! let bytes = encoding.encode_argument(&argument).unwrap();
//! assert_eq!(bytes.as_ref(), b"caf\xE9");
//! ```
use std::{borrow::Cow, fmt};

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unknown encoding label '{0}'")]
    UnknownLabel(String),

    #[error("encoding '{0}' cannot be used with null-terminated framing")]
    Unsupported(&'static str),

    #[error("text cannot be represented in '{0}'")]
    Unmappable(&'static str),

    #[error("received bytes are not valid '{0}'")]
    Malformed(&'static str),
}

/// Character set used for every string exchanged with the server.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding {
    inner: &'static Encoding,
}

impl TextEncoding {
    /// Looks up an encoding by its WHATWG label, e.g. `utf-8` or `iso-8859-1`.
    pub fn for_label(label: &str) -> Result<Self, EncodingError> {
        let inner = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| EncodingError::UnknownLabel(label.to_string()))?;

        // UTF-16 (and the replacement encoding) emit bytes that collide with the terminators.
        if inner.output_encoding() != inner {
            return Err(EncodingError::Unsupported(inner.name()));
        }

        Ok(Self { inner })
    }

    pub fn utf8() -> Self {
        Self { inner: UTF_8 }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, EncodingError> {
        let (bytes, _, unmappable) = self.inner.encode(text);
        if unmappable {
            return Err(EncodingError::Unmappable(self.name()));
        }
        Ok(bytes)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String, EncodingError> {
        self.inner
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(Cow::into_owned)
            .ok_or(EncodingError::Malformed(self.name()))
    }

    /// Converts a call argument into the bytes placed on the wire. Byte arguments pass
    /// through untouched; text arguments are encoded with this encoding.
    pub fn encode_argument<'a>(
        &self,
        argument: &'a Argument<'_>,
    ) -> Result<Cow<'a, [u8]>, EncodingError> {
        match argument {
            Argument::Text(text) => self.encode(text),
            Argument::Bytes(bytes) => Ok(Cow::Borrowed(bytes.as_ref())),
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextEncoding").field(&self.name()).finish()
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A string-typed call argument, given either as text or as already-encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument<'a> {
    Text(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
}

impl Argument<'_> {
    pub fn empty() -> Self {
        Argument::Bytes(Cow::Borrowed(&[]))
    }
}

impl<'a> From<&'a str> for Argument<'a> {
    fn from(value: &'a str) -> Self {
        Argument::Text(Cow::Borrowed(value))
    }
}

impl<'a> From<&'a String> for Argument<'a> {
    fn from(value: &'a String) -> Self {
        Argument::Text(Cow::Borrowed(value.as_str()))
    }
}

impl From<String> for Argument<'_> {
    fn from(value: String) -> Self {
        Argument::Text(Cow::Owned(value))
    }
}

impl<'a> From<&'a [u8]> for Argument<'a> {
    fn from(value: &'a [u8]) -> Self {
        Argument::Bytes(Cow::Borrowed(value))
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Argument<'a> {
    fn from(value: &'a [u8; N]) -> Self {
        Argument::Bytes(Cow::Borrowed(&value[..]))
    }
}

impl<'a> From<&'a Vec<u8>> for Argument<'a> {
    fn from(value: &'a Vec<u8>) -> Self {
        Argument::Bytes(Cow::Borrowed(value.as_slice()))
    }
}

impl From<Vec<u8>> for Argument<'_> {
    fn from(value: Vec<u8>) -> Self {
        Argument::Bytes(Cow::Owned(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_utf8() {
        assert_eq!(TextEncoding::default().name(), "UTF-8");
        assert_eq!(TextEncoding::for_label(" UTF8 ").unwrap(), TextEncoding::utf8());
    }

    #[test]
    fn unknown_label_rejected() {
        assert_eq!(
            TextEncoding::for_label("klingon").unwrap_err(),
            EncodingError::UnknownLabel("klingon".into())
        );
    }

    #[test]
    #[should_panic(expected = "Unsupported")]
    fn utf16_rejected() {
        TextEncoding::for_label("utf-16le").unwrap();
    }

    #[test]
    fn latin1_round_trip() {
        let encoding = TextEncoding::for_label("iso-8859-1").unwrap();
        let bytes = encoding.encode("naïve").unwrap();
        assert_eq!(bytes.as_ref(), b"na\xEFve");
        assert_eq!(encoding.decode(&bytes).unwrap(), "naïve");
    }

    #[test]
    fn unmappable_text_is_an_error() {
        let encoding = TextEncoding::for_label("iso-8859-1").unwrap();
        assert!(matches!(
            encoding.encode("日本"),
            Err(EncodingError::Unmappable(_))
        ));
    }

    #[test]
    fn malformed_utf8_is_an_error() {
        assert!(matches!(
            TextEncoding::utf8().decode(&[0xC3, 0x28]),
            Err(EncodingError::Malformed("UTF-8"))
        ));
    }

    #[test]
    fn arguments_coerce_to_bytes() {
        let encoding = TextEncoding::utf8();
        let owned = String::from("db");
        let raw = vec![0xFFu8, 0x00];

        let wire = |argument: Argument| encoding.encode_argument(&argument).unwrap().to_vec();

        assert_eq!(wire("text".into()), b"text".to_vec());
        assert_eq!(wire((&owned).into()), b"db".to_vec());
        assert_eq!(wire(b"bytes".into()), b"bytes".to_vec());
        assert_eq!(wire((&raw).into()), vec![0xFF, 0x00]);
        assert_eq!(wire(Argument::empty()), Vec::<u8>::new());
    }
}
