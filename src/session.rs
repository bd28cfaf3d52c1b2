//! Administrative commands over a [`Connection`].
//!
//! A [`Session`] owns its connection and closes it when dropped, so every exit path out of
//! the scope that holds the session releases the socket and cancels pending replies.
//!
//! # Example
//! ```no_run
//! use basex_client::{ConnectOptions, Session};
//!
//! let session = Session::connect(&ConnectOptions::new("admin", "admin"))?;
//! session.create("test_db")?;
//! session.add("test.xml", "<xml><root><child/></root></xml>")?;
//!
//! let query = session.query("collection('test_db')/xml/root/child")?;
//! assert_eq!(query.execute()?, "<child/>");
//! query.close()?;
//! # Ok::<(), basex_client::ClientError>(())
//! ```
use log::info;

use crate::{
    connection::{ConnectOptions, Connection},
    encoding::Argument,
    error::{ClientError, ResourceKind, Result},
    protocol::Request,
    query::Query,
};

/// Result and info text returned by a database command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub result: String,
    pub info: String,
}

#[derive(Debug)]
pub struct Session {
    connection: Connection,
}

impl Session {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        Ok(Self::new(Connection::connect(options)?))
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Runs a database command and returns its result. The info text the
    /// server sends along is logged.
    pub fn command<'a>(&self, command: impl Into<Argument<'a>>) -> Result<String> {
        let output = self.command_output(command)?;
        info!("{}", output.info);
        Ok(output.result)
    }

    /// Runs a database command and returns both its result and info text.
    pub fn command_output<'a>(&self, command: impl Into<Argument<'a>>) -> Result<CommandOutput> {
        let mut waiters = self
            .connection
            .request(&Request::Command(command.into()))?
            .into_iter();
        let (Some(result), Some(info)) = (waiters.next(), waiters.next()) else {
            return Err(ClientError::ConnectionClosed);
        };

        let result = result.wait()?.into_result(ClientError::CommandFailed)?;
        let info = info.wait()?.into_result(ClientError::CommandFailed)?;
        Ok(CommandOutput { result, info })
    }

    /// Compiles `query` on the server and returns a handle to it.
    pub fn query<'a>(&self, query: impl Into<Argument<'a>>) -> Result<Query<'_>> {
        let id = self
            .connection
            .exchange(&Request::Query(query.into()))?
            .into_result(ClientError::QueryCompileFailed)?;
        Ok(Query::new(&self.connection, id))
    }

    /// Creates an empty database and opens it.
    pub fn create<'a>(&self, name: impl Into<Argument<'a>>) -> Result<()> {
        self.create_with(name, Argument::empty())
    }

    /// Creates a database from an initial document and opens it.
    pub fn create_with<'a, 'b>(
        &self,
        name: impl Into<Argument<'a>>,
        input: impl Into<Argument<'b>>,
    ) -> Result<()> {
        let request = Request::Create {
            name: name.into(),
            input: input.into(),
        };
        self.run(&request, ClientError::DatabaseCreateFailed)
    }

    /// Adds a document at `path` in the opened database.
    pub fn add<'a, 'b>(
        &self,
        path: impl Into<Argument<'a>>,
        input: impl Into<Argument<'b>>,
    ) -> Result<()> {
        let request = Request::Add {
            path: path.into(),
            input: input.into(),
        };
        self.run(&request, ClientError::ResourceAddFailed)
    }

    /// Replaces the document at `path`, adding it if it does not exist.
    pub fn replace<'a, 'b>(
        &self,
        path: impl Into<Argument<'a>>,
        input: impl Into<Argument<'b>>,
    ) -> Result<()> {
        let request = Request::Replace {
            path: path.into(),
            input: input.into(),
        };
        self.run(&request, ClientError::replace_failed(ResourceKind::Document))
    }

    /// Stores raw bytes at `path`.
    pub fn store<'a, 'b>(
        &self,
        path: impl Into<Argument<'a>>,
        blob: impl Into<Argument<'b>>,
    ) -> Result<()> {
        let request = Request::Store {
            path: path.into(),
            blob: blob.into(),
        };
        self.run(&request, ClientError::replace_failed(ResourceKind::Blob))
    }

    /// Closes the underlying connection. Dropping the session does the same.
    pub fn close(self) {
        self.connection.close();
    }

    fn run<F>(&self, request: &Request<'_>, failure: F) -> Result<()>
    where
        F: FnOnce(String) -> ClientError,
    {
        let info = self.connection.exchange(request)?.into_result(failure)?;
        info!("{info}");
        Ok(())
    }
}
