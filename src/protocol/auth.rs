//! Challenge-response login performed once per connection.
//!
//! The server opens the conversation with a framed challenge. `realm:nonce` selects digest
//! authentication; a bare nonce selects the legacy scheme. The client answers with its user
//! name and `md5_hex(md5_hex(secret) + nonce)`, and the server replies with a single verdict
//! byte. No dispatcher runs yet, so everything here talks to the raw stream.
use std::io::{Read, Write};

use log::{debug, warn};

use crate::{encoding::TextEncoding, error::ClientError};

use super::{TERM_OK, transport::FrameReader};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// The challenge sent by the server when a connection opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Digest { realm: String, nonce: String },
    Legacy { nonce: String },
}

impl Challenge {
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((realm, nonce)) => Challenge::Digest {
                realm: realm.to_string(),
                nonce: nonce.to_string(),
            },
            None => Challenge::Legacy {
                nonce: text.to_string(),
            },
        }
    }

    pub fn nonce(&self) -> &str {
        match self {
            Challenge::Digest { nonce, .. } | Challenge::Legacy { nonce } => nonce,
        }
    }

    /// Computes the hex digest the client sends back for this challenge.
    pub fn response(&self, credentials: &Credentials) -> String {
        let h1 = match self {
            Challenge::Digest { realm, .. } => md5_hex(
                format!(
                    "{}:{}:{}",
                    credentials.username, realm, credentials.password
                )
                .as_bytes(),
            ),
            Challenge::Legacy { .. } => md5_hex(credentials.password.as_bytes()),
        };

        md5_hex(format!("{h1}{}", self.nonce()).as_bytes())
    }
}

/// Lowercase hex MD5 digest.
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Drives the login exchange over a freshly connected stream.
pub struct Handshake<'a, R: Read, W: Write> {
    reader: &'a mut FrameReader<R>,
    writer: &'a mut W,
    encoding: TextEncoding,
}

impl<'a, R: Read, W: Write> Handshake<'a, R, W> {
    pub fn new(reader: &'a mut FrameReader<R>, writer: &'a mut W, encoding: TextEncoding) -> Self {
        Self {
            reader,
            writer,
            encoding,
        }
    }

    pub fn run(self, credentials: &Credentials) -> Result<(), ClientError> {
        let frame = self.reader.read_frame()?;
        let challenge = Challenge::parse(&self.encoding.decode(&frame.payload)?);
        debug!(
            "received {} challenge",
            match challenge {
                Challenge::Digest { .. } => "digest",
                Challenge::Legacy { .. } => "legacy",
            }
        );

        let mut answer = Vec::with_capacity(credentials.username.len() + 34);
        answer.extend_from_slice(&self.encoding.encode(&credentials.username)?);
        answer.push(TERM_OK);
        answer.extend_from_slice(challenge.response(credentials).as_bytes());
        answer.push(TERM_OK);
        self.writer.write_all(&answer)?;
        self.writer.flush()?;

        match self.reader.read_byte()? {
            TERM_OK => Ok(()),
            verdict => {
                warn!("login rejected for '{}'", credentials.username);
                Err(ClientError::AuthenticationFailed(format!(
                    "access denied for '{}' (verdict 0x{verdict:02x})",
                    credentials.username
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn admin() -> Credentials {
        Credentials::new("admin", "admin")
    }

    #[test]
    fn parses_challenges() {
        assert_eq!(
            Challenge::parse("BaseX:1234"),
            Challenge::Digest {
                realm: "BaseX".into(),
                nonce: "1234".into()
            }
        );
        assert_eq!(
            Challenge::parse("1234"),
            Challenge::Legacy {
                nonce: "1234".into()
            }
        );
        assert_eq!(Challenge::parse("r:n:1").nonce(), "n:1");
    }

    #[test]
    fn md5_hex_is_lowercase() {
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"admin"), "21232f297a57a5a743894a0e4a801fc3");
    }

    #[test]
    fn digest_response() {
        let challenge = Challenge::parse("r:n1");
        let h1 = md5_hex(b"admin:r:admin");
        let expected = md5_hex(format!("{h1}n1").as_bytes());

        assert_eq!(challenge.response(&admin()), expected);
    }

    #[test]
    fn legacy_response() {
        let challenge = Challenge::parse("n1");
        let expected = md5_hex(b"21232f297a57a5a743894a0e4a801fc3n1");

        assert_eq!(challenge.response(&admin()), expected);
    }

    #[test]
    fn handshake_sends_username_and_digest() {
        let mut reader = FrameReader::new(Cursor::new(b"r:n1\0\0".to_vec()));
        let mut written = Vec::new();

        Handshake::new(&mut reader, &mut written, TextEncoding::utf8())
            .run(&admin())
            .unwrap();

        let mut expected = b"admin\0".to_vec();
        expected.extend_from_slice(Challenge::parse("r:n1").response(&admin()).as_bytes());
        expected.push(0);
        assert_eq!(written, expected);
    }

    #[test]
    fn handshake_rejected() {
        let mut reader = FrameReader::new(Cursor::new(b"r:n1\0\x01".to_vec()));
        let mut written = Vec::new();

        let err = Handshake::new(&mut reader, &mut written, TextEncoding::utf8())
            .run(&Credentials::new("b@d", "@uth"))
            .unwrap_err();

        assert!(matches!(err, ClientError::AuthenticationFailed(_)));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("admin", "s3cret"));
        assert!(debug.contains("admin"));
        assert!(!debug.contains("s3cret"));
    }
}
