use crate::error::ClientError;

/// Which terminator closed a framed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub text: String,
}

impl Reply {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    /// Returns the reply text, or hands the server's message to `failure`
    /// when the reply was error-terminated.
    pub fn into_result<F>(self, failure: F) -> Result<String, ClientError>
    where
        F: FnOnce(String) -> ClientError,
    {
        match self.status {
            Status::Ok => Ok(self.text),
            Status::Error => Err(failure(self.text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_reply_yields_text() {
        let text = Reply::ok("<child/>")
            .into_result(ClientError::QueryFailed)
            .unwrap();
        assert_eq!(text, "<child/>");
    }

    #[test]
    fn error_reply_keeps_server_message() {
        let err = Reply::error("Database 'x' was not found.")
            .into_result(ClientError::CommandFailed)
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::CommandFailed(ref message) if message == "Database 'x' was not found."
        ));
    }
}
