//! Scripted listener, connection and processor doubles shared by the
//! integration tests.

#![allow(dead_code)]

use async_std::channel::{self, Receiver, Sender};
use async_std::net::SocketAddr;
use async_std::task;
use async_trait::async_trait;
use payment_simulator::net::{Connection, LineReader, Listener, ListenerFactory};
use payment_simulator::{Processor, Response};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "listener closed")
}

/// Listener whose accepted connections (or errors) are pushed by the test.
pub struct MockListener {
    incoming: Receiver<io::Result<MockConnection>>,
    close_error: bool,
}

impl MockListener {
    pub fn new() -> (Sender<io::Result<MockConnection>>, Self) {
        let (tx, rx) = channel::unbounded();
        (
            tx,
            Self {
                incoming: rx,
                close_error: false,
            },
        )
    }

    /// Make `close` report an error after closing.
    pub fn failing_close(mut self) -> Self {
        self.close_error = true;
        self
    }
}

#[async_trait]
impl Listener for MockListener {
    type Conn = MockConnection;

    async fn accept(&self) -> io::Result<MockConnection> {
        match self.incoming.recv().await {
            Ok(next) => next,
            Err(_) => Err(closed()),
        }
    }

    fn close(&self) -> io::Result<()> {
        self.incoming.close();
        if self.close_error {
            return Err(io::Error::other("close failed"));
        }
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 0)))
    }
}

/// Factory that always fails to bind.
pub struct FailingFactory;

#[async_trait]
impl ListenerFactory for FailingFactory {
    type Listener = MockListener;

    async fn bind(&self, _addr: &str) -> io::Result<MockListener> {
        Err(io::Error::new(io::ErrorKind::AddrInUse, "address in use"))
    }
}

/// In-memory connection. Lines are fed by the test; writes are recorded.
#[derive(Clone)]
pub struct MockConnection {
    state: Arc<MockState>,
}

struct MockState {
    lines_tx: Sender<io::Result<String>>,
    lines_rx: Receiver<io::Result<String>>,
    written: Mutex<Vec<String>>,
    write_attempts: AtomicUsize,
    fail_writes: AtomicBool,
    closed: AtomicBool,
    closes: AtomicUsize,
}

impl MockConnection {
    pub fn new() -> Self {
        let (lines_tx, lines_rx) = channel::unbounded();
        Self {
            state: Arc::new(MockState {
                lines_tx,
                lines_rx,
                written: Mutex::new(Vec::new()),
                write_attempts: AtomicUsize::new(0),
                fail_writes: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                closes: AtomicUsize::new(0),
            }),
        }
    }

    pub fn send_line(&self, line: &str) {
        self.state.lines_tx.try_send(Ok(line.to_owned())).unwrap();
    }

    pub fn send_error(&self, kind: io::ErrorKind) {
        self.state
            .lines_tx
            .try_send(Err(io::Error::new(kind, "read failed")))
            .unwrap();
    }

    /// The peer closes its side: queued lines are still read, then EOF.
    pub fn hang_up(&self) {
        self.state.lines_tx.close();
    }

    pub fn fail_writes(&self) {
        self.state.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn written(&self) -> Vec<String> {
        self.state.written.lock().unwrap().clone()
    }

    pub fn write_attempts(&self) -> usize {
        self.state.write_attempts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

pub struct MockLineReader {
    lines: Receiver<io::Result<String>>,
}

#[async_trait]
impl LineReader for MockLineReader {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.lines.recv().await {
            Ok(line) => line.map(Some),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Reader = MockLineReader;

    fn reader(&self) -> MockLineReader {
        MockLineReader {
            lines: self.state.lines_rx.clone(),
        }
    }

    async fn write_line(&self, line: &str) -> io::Result<()> {
        self.state.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_writes.load(Ordering::SeqCst) || self.state.closed.load(Ordering::SeqCst)
        {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed"));
        }
        self.state.written.lock().unwrap().push(line.to_owned());
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.lines_tx.close();
        Ok(())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Answers every request only after the gate is opened (or dropped).
pub struct GatedProcessor {
    gate: Receiver<()>,
}

impl GatedProcessor {
    pub fn new() -> (Sender<()>, Self) {
        let (tx, rx) = channel::unbounded();
        (tx, Self { gate: rx })
    }
}

#[async_trait]
impl Processor for GatedProcessor {
    async fn process(&self, _request: &str) -> Response {
        let _ = self.gate.recv().await;
        Response::accepted()
    }
}

/// Waits up to two seconds for `check` to hold.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        task::sleep(Duration::from_millis(5)).await;
    }
}
