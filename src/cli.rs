//! CLI utilities for the BaseX client.
//!
//! The utilities present in this module are used by the `basex_cli` binary to read commands
//! from an interactive prompt.
use std::io::{self, BufRead, Write};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("'{0}' requires an argument")]
    MissingArgument(&'static str),

    #[error("prompt IO error: {0}")]
    Io(#[from] io::Error),
}

/// Possible commands from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Exit command `.exit`, also produced at end of input
    Exit,
    /// Compile, execute and close an XQuery: `.query <xquery>`
    Query(String),
    /// Any other input is sent to the server as a database command
    Execute(String),
    /// Blank line
    Empty,
}

/// Prompt user for a command.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> Result<Command, CliError>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Command::Exit);
    }

    match s.trim() {
        "" => Ok(Command::Empty),
        ".exit" => Ok(Command::Exit),
        ".query" => Err(CliError::MissingArgument(".query")),
        s if s.starts_with(".query ") => {
            Ok(Command::Query(s[".query ".len()..].trim().to_string()))
        }
        s if s.starts_with('.') => Err(CliError::UnrecognizedCommand(s.to_string())),
        s => Ok(Command::Execute(s.to_string())),
    }
}
