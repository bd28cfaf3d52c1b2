pub mod cli;
pub mod connection;
pub mod encoding;
pub mod error;
pub mod protocol;
pub mod query;
pub mod session;

#[cfg(test)]
mod testing;

pub use connection::{ConnectOptions, Connection};
pub use encoding::{Argument, EncodingError, TextEncoding};
pub use error::{ClientError, ResourceKind, Result};
pub use protocol::{Phase, Reply, ReplyKind, Status, Waiter};
pub use query::Query;
pub use session::{CommandOutput, Session};
