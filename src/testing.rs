//! Loopback server used by unit tests to play the server side of a conversation.
use std::{
    io::{BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    thread::{self, JoinHandle},
};

use crate::{
    connection::ConnectOptions,
    protocol::{Challenge, Credentials, ESCAPE, TERM_ERR, TERM_OK, escape},
};

pub(crate) const CHALLENGE: &str = "BaseX:8347281";

pub(crate) struct MockServer {
    options: ConnectOptions,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Accepts a single connection and runs `script` against it.
    pub(crate) fn start<F>(script: F) -> Self
    where
        F: FnOnce(&mut Peer) + Send + 'static,
    {
        let _ = env_logger::builder().is_test(true).try_init();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut peer = Peer::new(stream);
            script(&mut peer);
        });

        Self {
            options: ConnectOptions::new("admin", "admin").port(port),
            handle,
        }
    }

    pub(crate) fn options(&self) -> ConnectOptions {
        self.options.clone()
    }

    /// Waits for the script to finish, re-raising its assertion failures.
    pub(crate) fn join(self) {
        if let Err(panic) = self.handle.join() {
            std::panic::resume_unwind(panic);
        }
    }
}

pub(crate) struct Peer {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Peer {
    fn new(stream: TcpStream) -> Self {
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    /// Sends the digest challenge and checks the answer against `admin`/`admin`.
    pub(crate) fn login(&mut self) -> bool {
        self.write_raw(format!("{CHALLENGE}\0").as_bytes());

        let username = self.read_field();
        let response = self.read_field();
        let expected = Challenge::parse(CHALLENGE).response(&Credentials::new("admin", "admin"));

        let accepted = username == "admin" && response == expected;
        self.write_raw(&[if accepted { TERM_OK } else { TERM_ERR }]);
        accepted
    }

    pub(crate) fn read_byte(&mut self) -> u8 {
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte).unwrap();
        byte[0]
    }

    pub(crate) fn expect_opcode(&mut self, opcode: u8) {
        assert_eq!(self.read_byte(), opcode, "unexpected opcode");
    }

    /// Reads one null-terminated request field, undoing escapes.
    pub(crate) fn read_field_bytes(&mut self) -> Vec<u8> {
        let mut field = Vec::new();
        loop {
            match self.read_byte() {
                TERM_OK => return field,
                ESCAPE => {
                    let byte = self.read_byte();
                    field.push(byte);
                }
                byte => field.push(byte),
            }
        }
    }

    pub(crate) fn read_field(&mut self) -> String {
        String::from_utf8(self.read_field_bytes()).unwrap()
    }

    pub(crate) fn reply_ok(&mut self, text: &str) {
        let mut bytes = escape(text.as_bytes());
        bytes.push(TERM_OK);
        self.write_raw(&bytes);
    }

    pub(crate) fn reply_error(&mut self, text: &str) {
        let mut bytes = escape(text.as_bytes());
        bytes.push(TERM_ERR);
        self.write_raw(&bytes);
    }

    pub(crate) fn write_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).unwrap();
        self.writer.flush().unwrap();
    }

    /// Drains the stream until the client hangs up.
    pub(crate) fn await_close(&mut self) {
        let mut sink = Vec::new();
        let _ = self.reader.read_to_end(&mut sink);
    }
}
