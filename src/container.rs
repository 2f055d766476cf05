//! Contract between the bridge and the embedding HTTP container.
//!
//! The container owns sockets, threads, parsing, and framing; the bridge
//! consumes it exclusively through the traits below. All stream operations
//! are non-blocking: readiness is reported through the [`TaskListener`] the
//! task hands over when it activates a transaction, and the task performs
//! the actual reads and writes synchronously when it is told they cannot
//! block.

use cookie::Cookie;
use std::{io, time::Duration};
use tokio::sync::mpsc;

// Fan-in of every external signal a task reacts to. Container callbacks
// enqueue these; the task drains them one at a time, which is what makes
// the task a single-writer state machine.
#[derive(Debug)]
pub(crate) enum ContainerEvent {
    DataAvailable,
    AllDataRead,
    WritePossible,
    Timeout,
    Error(io::Error),
}

/// Callback surface a task registers with the container transaction.
///
/// The container invokes these from any of its threads; each call enqueues
/// an event for the owning task and returns immediately. Calls made after
/// the task reached its terminal state are silently dropped.
#[derive(Debug, Clone)]
pub struct TaskListener {
    events: mpsc::UnboundedSender<ContainerEvent>,
}

impl TaskListener {
    #[inline]
    pub(crate) fn new(events: mpsc::UnboundedSender<ContainerEvent>) -> Self {
        TaskListener { events }
    }

    /// More request body bytes can be read without blocking.
    pub fn data_available(&self) {
        let _ = self.events.send(ContainerEvent::DataAvailable);
    }

    /// The request body has been fully received.
    pub fn all_data_read(&self) {
        let _ = self.events.send(ContainerEvent::AllDataRead);
    }

    /// The output stream accepts writes without blocking again.
    pub fn write_possible(&self) {
        let _ = self.events.send(ContainerEvent::WritePossible);
    }

    /// The transaction's lifetime budget expired.
    pub fn timeout(&self) {
        let _ = self.events.send(ContainerEvent::Timeout);
    }

    /// The container failed the transaction (read, write, or lifecycle).
    pub fn error(&self, error: io::Error) {
        let _ = self.events.send(ContainerEvent::Error(error));
    }
}

/// Read-only view of the container's raw request.
///
/// Consumed once, during conversion into a [`Request`](crate::Request)
/// value; the body is never read through this trait.
pub trait RawRequest {
    /// Numeric host string of the server side of the connection.
    fn local_name(&self) -> &str;
    /// Port of the server side of the connection.
    fn local_port(&self) -> u16;
    /// Numeric host string of the client side of the connection.
    fn remote_name(&self) -> &str;
    /// Port of the client side of the connection.
    fn remote_port(&self) -> u16;
    /// Method token as received.
    fn method(&self) -> &str;
    /// Absolute-form request URL without the query.
    fn url(&self) -> &str;
    /// Raw query string, when present.
    fn query(&self) -> Option<&str>;
    /// Distinct header names, in container order.
    fn header_names(&self) -> Vec<String>;
    /// Every value received for `name`, in order.
    fn header_values(&self, name: &str) -> Vec<String>;
    /// Request cookies, already parsed by the container.
    fn cookies(&self) -> Vec<Cookie<'static>>;
}

/// The container's asynchronous transaction handle for one request.
///
/// One instance is handed to the bridge per request and owned by the task
/// until [`complete`](Transaction::complete). Stream operations must never
/// block: the task only calls [`read`](Transaction::read) after
/// [`read_ready`](Transaction::read_ready) reported `true`, and
/// [`write`](Transaction::write) after [`write_ready`](Transaction::write_ready)
/// did. Every fallible operation reports failure as [`io::Error`]; the task
/// absorbs such failures and tears the transaction down, so the container
/// never sees a panic or an error out of a callback.
pub trait Transaction: Send + 'static {
    /// Raw-request snapshot type used for conversion.
    type Request: RawRequest;

    /// Snapshot of the inbound request line, headers, and cookies.
    fn request(&self) -> Self::Request;

    /// Delegates the task lifetime budget to the container timer.
    fn set_timeout(&mut self, budget: Duration);

    /// Installs the listener for readiness, timeout, and error callbacks.
    fn register(&mut self, listener: TaskListener);

    /// Whether the request body has been fully consumed.
    fn read_finished(&self) -> bool;

    /// Whether a read would currently succeed without blocking.
    fn read_ready(&self) -> bool;

    /// Non-blocking read into `buf`. `Ok(None)` means no bytes were
    /// transferred even though the stream was reported ready.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;

    /// Closes the input stream once the body is buffered.
    fn close_input(&mut self) -> io::Result<()>;

    /// Whether a write would currently succeed without blocking.
    fn write_ready(&self) -> bool;

    /// Non-blocking write of the whole chunk.
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Sets the response status line.
    fn set_status(&mut self, status: u16) -> io::Result<()>;

    /// Adds one response header.
    fn set_header(&mut self, name: &str, value: &str) -> io::Result<()>;

    /// Adds one response cookie.
    fn add_cookie(&mut self, cookie: &Cookie<'static>) -> io::Result<()>;

    /// Finalizes the transaction. Idempotent from the task's point of view:
    /// the task calls it exactly once, on every termination path.
    fn complete(&mut self);
}
