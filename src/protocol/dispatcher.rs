//! Background read loop correlating replies with the requests that produced them.
//!
//! Replies carry no request identifier: the server answers strictly in the order requests
//! were written. Every request therefore registers one [`Waiter`] per expected reply *before*
//! its bytes hit the socket, and the read loop resolves the head of the FIFO queue with each
//! framed message it decodes.
//!
//! ```text
//!  sender ──register()──▶ [ w1 | w2 | w3 ] ◀──pop_front── read loop ◀── socket
//!     │                                                         │
//!     └──────────────── wait() ◀──── resolve(reply) ────────────┘
//! ```
//!
//! Closing the dispatcher, or losing the stream, drops every queued slot; their waiters
//! observe [`ClientError::ConnectionClosed`] instead of blocking forever.
use std::{
    collections::VecDeque,
    fmt,
    io::Read,
    sync::{
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
        mpsc::{Receiver, SyncSender, sync_channel},
    },
    thread::{self, JoinHandle},
};

use log::{debug, trace, warn};

use crate::{encoding::TextEncoding, error::ClientError};

use super::{
    request::ReplyKind,
    response::{Reply, Status},
    transport::{FrameReader, TransportError},
};

/// Connection lifecycle, from socket setup to teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Authenticating,
    Ready,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connecting => "connecting",
            Phase::Authenticating => "authenticating",
            Phase::Ready => "ready",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}

type Slot = SyncSender<Result<Reply, ClientError>>;

/// The caller's half of a pending reply.
#[derive(Debug)]
pub struct Waiter {
    id: u64,
    kind: ReplyKind,
    slot: Receiver<Result<Reply, ClientError>>,
}

impl Waiter {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ReplyKind {
        self.kind
    }

    /// Blocks until the read loop resolves this waiter, or fails with
    /// [`ClientError::ConnectionClosed`] once the connection goes away.
    pub fn wait(self) -> Result<Reply, ClientError> {
        self.slot.recv().map_err(|_| ClientError::ConnectionClosed)?
    }
}

/// The dispatcher's half of a pending reply.
#[derive(Debug)]
struct PendingReply {
    id: u64,
    kind: ReplyKind,
    slot: Slot,
}

#[derive(Debug)]
struct State {
    phase: Phase,
    next_id: u64,
    pending: VecDeque<PendingReply>,
}

#[derive(Debug)]
struct Shared {
    label: String,
    state: Mutex<State>,
    enqueued: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to [`Phase::Closed`] and cancels every queued waiter. Returns
    /// false if the dispatcher was already closed.
    fn close(&self) -> bool {
        let cancelled = {
            let mut state = self.lock();
            if state.phase == Phase::Closed {
                return false;
            }
            state.phase = Phase::Closed;
            std::mem::take(&mut state.pending)
        };
        self.enqueued.notify_all();

        if !cancelled.is_empty() {
            debug!("{}: cancelling {} pending replies", self.label, cancelled.len());
        }
        // Dropping the senders wakes every waiter with a disconnect.
        drop(cancelled);
        true
    }
}

/// Owns the receive side of a connection once it is authenticated.
#[derive(Debug)]
pub struct Dispatcher {
    shared: Arc<Shared>,
    encoding: TextEncoding,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(label: impl Into<String>, encoding: TextEncoding) -> Self {
        Self {
            shared: Arc::new(Shared {
                label: label.into(),
                state: Mutex::new(State {
                    phase: Phase::Connecting,
                    next_id: 0,
                    pending: VecDeque::new(),
                }),
                enqueued: Condvar::new(),
            }),
            encoding,
            reader: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Records a phase transition made before the read loop starts.
    pub fn advance(&self, phase: Phase) {
        let mut state = self.shared.lock();
        if state.phase != Phase::Closed {
            debug!("{}: {} -> {}", self.shared.label, state.phase, phase);
            state.phase = phase;
        }
    }

    /// Number of waiters still expecting a reply.
    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Queues one waiter per expected reply, in order. Fails once the
    /// dispatcher is closed.
    pub fn register(&self, kinds: &[ReplyKind]) -> Result<Vec<Waiter>, ClientError> {
        let mut waiters = Vec::with_capacity(kinds.len());
        {
            let mut state = self.shared.lock();
            if state.phase == Phase::Closed {
                return Err(ClientError::ConnectionClosed);
            }

            for &kind in kinds {
                let id = state.next_id;
                state.next_id += 1;

                let (slot, receiver) = sync_channel(1);
                state.pending.push_back(PendingReply { id, kind, slot });
                waiters.push(Waiter {
                    id,
                    kind,
                    slot: receiver,
                });
            }
            trace!(
                "{}: registered {} waiters, {} pending",
                self.shared.label,
                kinds.len(),
                state.pending.len()
            );
        }

        if !waiters.is_empty() {
            self.shared.enqueued.notify_all();
        }
        Ok(waiters)
    }

    /// Spawns the read loop over `reader`. Only the first call has an effect.
    pub fn start<R>(&self, reader: FrameReader<R>)
    where
        R: Read + Send + 'static,
    {
        let mut handle = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.is_some() {
            warn!("{}: read loop already running", self.shared.label);
            return;
        }

        self.advance(Phase::Ready);
        let shared = Arc::clone(&self.shared);
        let encoding = self.encoding;
        *handle = Some(thread::spawn(move || read_loop(&shared, reader, encoding)));
    }

    /// Cancels every pending waiter and rejects further registrations.
    /// Returns false if the dispatcher was already closed.
    pub fn close(&self) -> bool {
        self.shared.close()
    }

    /// Waits for the read loop to exit. The stream must already be shut
    /// down, otherwise this blocks until the server closes it.
    pub fn join(&self) {
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!("{}: read loop panicked", self.shared.label);
            }
        }
    }
}

fn read_loop<R: Read>(shared: &Shared, mut reader: FrameReader<R>, encoding: TextEncoding) {
    debug!("{}: read loop started", shared.label);

    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(TransportError::Closed) => {
                debug!("{}: stream closed", shared.label);
                break;
            }
            Err(e) => {
                if shared.lock().phase != Phase::Closed {
                    warn!("{}: read failed: {e}", shared.label);
                }
                break;
            }
        };

        let pending = {
            let mut state = shared.lock();
            if state.phase == Phase::Closed {
                break;
            }
            if frame.payload.is_empty() && state.pending.is_empty() {
                trace!("{}: skipping stray empty reply", shared.label);
                continue;
            }
            while state.pending.is_empty() && state.phase != Phase::Closed {
                state = shared
                    .enqueued
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            match state.pending.pop_front() {
                Some(pending) => pending,
                None => break,
            }
        };

        let mut stream_ended = false;
        if pending.kind == ReplyKind::DoubleTerminated && frame.status == Status::Ok {
            match reader.read_byte() {
                Ok(byte) => trace!("{}: discarded trailing 0x{byte:02x}", shared.label),
                Err(_) => stream_ended = true,
            }
        }

        let reply = frame.decode(&encoding).map_err(ClientError::from);
        trace!("{}: resolved waiter {}", shared.label, pending.id);
        // The caller may have given up on this reply; its slot is then gone.
        let _ = pending.slot.send(reply);

        if stream_ended {
            break;
        }
    }

    shared.close();
    debug!("{}: read loop stopped", shared.label);
}
