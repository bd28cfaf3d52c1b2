//! A single authenticated connection to a BaseX server.
//!
//! [`Connection::connect`] walks the connection through its phases:
//!
//! ```text
//! Connecting ──tcp──▶ Authenticating ──handshake ok──▶ Ready ──close / eof──▶ Closed
//!                           │
//!                           └──rejected──▶ AuthenticationFailed (no read loop is started)
//! ```
//!
//! Once ready, the connection may be shared between threads. Every send registers its
//! waiters and writes its bytes under one lock, so the order of the waiter queue always
//! matches the order of requests on the wire.
use std::{
    fmt,
    io::{BufReader, BufWriter, Write},
    net::{Shutdown, TcpStream},
    sync::{Mutex, PoisonError},
};

use log::{debug, info, warn};

use crate::{
    encoding::TextEncoding,
    error::{ClientError, Result},
    protocol::{
        Credentials, Dispatcher, FrameReader, Handshake, Phase, Reply, ReplyKind, Request,
        Waiter,
    },
};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 1984;
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Connection-establishment parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    pub encoding: String,
}

impl ConnectOptions {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            credentials: Credentials::new(username, password),
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Credentials::new(username, password);
        self
    }

    pub fn encoding(mut self, label: impl Into<String>) -> Self {
        self.encoding = label.into();
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect(&self) -> Result<Connection> {
        Connection::connect(self)
    }

    fn validate(&self) -> Result<TextEncoding> {
        if self.credentials.username.is_empty() {
            return Err(ClientError::InvalidOptions("a username is required".into()));
        }
        if self.credentials.password.is_empty() {
            return Err(ClientError::InvalidOptions("a password is required".into()));
        }
        Ok(TextEncoding::for_label(&self.encoding)?)
    }
}

/// An authenticated connection with its background read loop.
///
/// Dropping the connection closes it.
#[derive(Debug)]
pub struct Connection {
    address: String,
    encoding: TextEncoding,
    writer: Mutex<BufWriter<TcpStream>>,
    socket: TcpStream,
    dispatcher: Dispatcher,
}

impl Connection {
    /// Opens a TCP connection, authenticates, and starts the read loop.
    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        let encoding = options.validate()?;
        let address = options.address();
        let dispatcher = Dispatcher::new(address.clone(), encoding);

        let stream = TcpStream::connect((options.host.as_str(), options.port))?;
        stream.set_nodelay(true)?;
        debug!("{address}: connected");

        dispatcher.advance(Phase::Authenticating);
        let mut reader = FrameReader::new(BufReader::new(stream.try_clone()?));
        let mut writer = BufWriter::new(stream.try_clone()?);

        if let Err(e) = Handshake::new(&mut reader, &mut writer, encoding).run(&options.credentials)
        {
            dispatcher.close();
            let _ = stream.shutdown(Shutdown::Both);
            return Err(e);
        }

        dispatcher.start(reader);
        info!("{address}: authenticated as '{}'", options.credentials.username);

        Ok(Self {
            address,
            encoding,
            writer: Mutex::new(writer),
            socket: stream,
            dispatcher,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn encoding(&self) -> &TextEncoding {
        &self.encoding
    }

    pub fn phase(&self) -> Phase {
        self.dispatcher.phase()
    }

    pub fn is_authenticated(&self) -> bool {
        self.phase() == Phase::Ready
    }

    /// Number of replies the connection is still waiting for.
    pub fn pending(&self) -> usize {
        self.dispatcher.pending()
    }

    /// Writes `bytes` verbatim and queues one waiter per entry in `replies`.
    ///
    /// The caller is responsible for escaping and terminating the payload. Waiters are
    /// queued before the write, under the same lock, so concurrent senders can never
    /// interleave their replies.
    ///
    /// A failed write closes the connection: part of the request may already be on the
    /// wire, and the queue could no longer be matched against the replies.
    pub fn send(&self, bytes: &[u8], replies: &[ReplyKind]) -> Result<Vec<Waiter>> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let waiters = self.dispatcher.register(replies)?;

        if let Err(e) = writer.write_all(bytes).and_then(|_| writer.flush()) {
            warn!("{}: write failed, closing: {e}", self.address);
            self.shut_down();
            return Err(e.into());
        }
        Ok(waiters)
    }

    /// Serializes `request` with the connection's encoding and sends it,
    /// queueing the waiters it expects.
    pub fn request(&self, request: &Request<'_>) -> Result<Vec<Waiter>> {
        let bytes = request.encode(&self.encoding)?;
        self.send(&bytes, request.replies())
    }

    /// Sends a request expecting exactly one reply and waits for it.
    pub(crate) fn exchange(&self, request: &Request<'_>) -> Result<Reply> {
        let waiter = self
            .request(request)?
            .into_iter()
            .next()
            .ok_or(ClientError::ConnectionClosed)?;
        waiter.wait()
    }

    /// Stops the read loop, releases the socket and cancels every pending
    /// waiter. Closing twice is a no-op.
    pub fn close(&self) {
        self.shut_down();
        self.dispatcher.join();
    }

    fn shut_down(&self) {
        if self.dispatcher.close() {
            if let Err(e) = self.socket.shutdown(Shutdown::Both) {
                debug!("{}: shutdown: {e}", self.address);
            }
            debug!("{}: closed", self.address);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        if self.is_authenticated() {
            write!(f, " authenticated")?;
        }
        Ok(())
    }
}
