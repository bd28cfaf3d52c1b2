//! Handles to queries compiled on the server.
//!
//! A [`Query`] is nothing more than the identifier the server assigned to a compiled query,
//! plus the connection it lives on. The server keeps the query (and any bound variables)
//! until [`Query::close`] releases it.
use std::fmt;

use log::info;

use crate::{
    connection::Connection,
    encoding::Argument,
    error::{ClientError, Result},
    protocol::{Reply, Request},
};

pub struct Query<'c> {
    connection: &'c Connection,
    id: String,
}

impl<'c> Query<'c> {
    pub(crate) fn new(connection: &'c Connection, id: String) -> Self {
        Self { connection, id }
    }

    /// The identifier assigned by the server.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connection(&self) -> &'c Connection {
        self.connection
    }

    /// Releases the query on the server.
    pub fn close(self) -> Result<()> {
        let info = self.call(&Request::Close { id: &self.id })?;
        info!("{info}");
        Ok(())
    }

    /// Evaluates the query and returns its serialized result.
    pub fn execute(&self) -> Result<String> {
        self.call(&Request::Execute { id: &self.id })
    }

    /// Evaluates the query and returns its result items. The leading
    /// status byte the server prefixes is stripped.
    pub fn results(&self) -> Result<String> {
        let text = self.call(&Request::Results { id: &self.id })?;
        let mut chars = text.chars();
        chars.next();
        Ok(chars.as_str().to_string())
    }

    /// Evaluates the query and returns every result item prefixed with its type.
    pub fn full(&self) -> Result<String> {
        self.call(&Request::Full { id: &self.id })
    }

    /// Returns the compilation and evaluation info of the last run.
    pub fn info(&self) -> Result<String> {
        self.call(&Request::Info { id: &self.id })
    }

    /// Binds an external variable.
    pub fn bind<'a, 'b>(
        &self,
        name: impl Into<Argument<'a>>,
        value: impl Into<Argument<'b>>,
    ) -> Result<()> {
        self.bind_typed(name, value, Argument::empty())
    }

    /// Binds an external variable with an explicit XQuery type, e.g. `xs:integer`.
    pub fn bind_typed<'a, 'b, 't>(
        &self,
        name: impl Into<Argument<'a>>,
        value: impl Into<Argument<'b>>,
        kind: impl Into<Argument<'t>>,
    ) -> Result<()> {
        let info = self.call(&Request::Bind {
            id: &self.id,
            name: name.into(),
            value: value.into(),
            kind: kind.into(),
        })?;
        info!("{info}");
        Ok(())
    }

    /// Binds the context value.
    pub fn context<'b>(&self, value: impl Into<Argument<'b>>) -> Result<()> {
        self.context_typed(value, Argument::empty())
    }

    pub fn context_typed<'b, 't>(
        &self,
        value: impl Into<Argument<'b>>,
        kind: impl Into<Argument<'t>>,
    ) -> Result<()> {
        let info = self.call(&Request::Context {
            id: &self.id,
            value: value.into(),
            kind: kind.into(),
        })?;
        info!("{info}");
        Ok(())
    }

    /// Whether the query contains updating expressions.
    pub fn updating(&self) -> Result<bool> {
        match self.call(&Request::Updating { id: &self.id })?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ClientError::UnexpectedReply(other.to_string())),
        }
    }

    fn call(&self, request: &Request<'_>) -> Result<String> {
        self.connection
            .exchange(request)
            .and_then(|reply: Reply| reply.into_result(ClientError::QueryFailed))
    }
}

impl PartialEq for Query<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Query<'_> {}

impl fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("connection", &self.connection.address())
            .finish()
    }
}
