use crate::encoding::{Argument, EncodingError, TextEncoding};

use super::{TERM_OK, transport::escape_into};

/// Command identifiers, sent as the first byte of a request.
///
/// Plain database commands carry no opcode: the command text itself opens the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Query = 0x00,
    Close = 0x02,
    Bind = 0x03,
    Results = 0x04,
    Execute = 0x05,
    Info = 0x06,
    Create = 0x08,
    Add = 0x09,
    Replace = 0x0C,
    Store = 0x0D,
    Context = 0x0E,
    Updating = 0x1E,
    Full = 0x1F,
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        value as u8
    }
}

/// How the dispatcher consumes the reply a waiter is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// The reply ends at its terminator.
    Single,
    /// A successful reply is followed by one stray terminator byte that is discarded.
    DoubleTerminated,
}

const SINGLE: &[ReplyKind] = &[ReplyKind::Single];
const PAIR: &[ReplyKind] = &[ReplyKind::Single, ReplyKind::Single];
const DOUBLE: &[ReplyKind] = &[ReplyKind::DoubleTerminated];

/// Requests understood by the server. Session-level requests come first,
/// followed by the ones addressing a compiled query by its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    Command(Argument<'a>),
    Query(Argument<'a>),
    Create { name: Argument<'a>, input: Argument<'a> },
    Add { path: Argument<'a>, input: Argument<'a> },
    Replace { path: Argument<'a>, input: Argument<'a> },
    Store { path: Argument<'a>, blob: Argument<'a> },
    Close { id: &'a str },
    Execute { id: &'a str },
    Results { id: &'a str },
    Info { id: &'a str },
    Full { id: &'a str },
    Updating { id: &'a str },
    Bind {
        id: &'a str,
        name: Argument<'a>,
        value: Argument<'a>,
        kind: Argument<'a>,
    },
    Context {
        id: &'a str,
        value: Argument<'a>,
        kind: Argument<'a>,
    },
}

impl Request<'_> {
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Request::Command(_) => None,
            Request::Query(_) => Some(Opcode::Query),
            Request::Create { .. } => Some(Opcode::Create),
            Request::Add { .. } => Some(Opcode::Add),
            Request::Replace { .. } => Some(Opcode::Replace),
            Request::Store { .. } => Some(Opcode::Store),
            Request::Close { .. } => Some(Opcode::Close),
            Request::Execute { .. } => Some(Opcode::Execute),
            Request::Results { .. } => Some(Opcode::Results),
            Request::Info { .. } => Some(Opcode::Info),
            Request::Full { .. } => Some(Opcode::Full),
            Request::Updating { .. } => Some(Opcode::Updating),
            Request::Bind { .. } => Some(Opcode::Bind),
            Request::Context { .. } => Some(Opcode::Context),
        }
    }

    /// The replies the server emits for this request, in order.
    pub fn replies(&self) -> &'static [ReplyKind] {
        match self {
            Request::Command(_) => PAIR,
            Request::Query(_)
            | Request::Create { .. }
            | Request::Add { .. }
            | Request::Replace { .. }
            | Request::Store { .. } => SINGLE,
            _ => DOUBLE,
        }
    }

    /// Serializes the request: the opcode byte (if any), then every field followed by a null
    /// terminator. Only resource bodies are escaped; the server reads every other field as
    /// plain text up to the terminator.
    pub fn encode(&self, encoding: &TextEncoding) -> Result<Vec<u8>, EncodingError> {
        let mut buf = Vec::new();
        if let Some(opcode) = self.opcode() {
            buf.push(opcode.into());
        }

        let mut field = |argument: &Argument<'_>, escaped: bool| -> Result<(), EncodingError> {
            let bytes = encoding.encode_argument(argument)?;
            if escaped {
                escape_into(&mut buf, &bytes);
            } else {
                buf.extend_from_slice(&bytes);
            }
            buf.push(TERM_OK);
            Ok(())
        };

        match self {
            Request::Command(text) | Request::Query(text) => field(text, false)?,
            Request::Create { name: key, input: body }
            | Request::Add { path: key, input: body }
            | Request::Replace { path: key, input: body }
            | Request::Store { path: key, blob: body } => {
                field(key, false)?;
                field(body, true)?;
            }
            Request::Close { id }
            | Request::Execute { id }
            | Request::Results { id }
            | Request::Info { id }
            | Request::Full { id }
            | Request::Updating { id } => field(&Argument::from(*id), false)?,
            Request::Bind {
                id,
                name,
                value,
                kind,
            } => {
                field(&Argument::from(*id), false)?;
                field(name, false)?;
                field(value, false)?;
                field(kind, false)?;
            }
            Request::Context { id, value, kind } => {
                field(&Argument::from(*id), false)?;
                field(value, false)?;
                field(kind, false)?;
            }
        }

        Ok(buf)
    }
}
