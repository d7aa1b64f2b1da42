//! Socket capabilities used by the server.
//!
//! The server only talks to the network through the traits in this module so
//! listeners and connections can be swapped for scripted doubles in tests.
//! The TCP implementations sit on top of `async_std::net`.

use async_std::channel::{self, Receiver, Sender};
use async_std::io::prelude::BufReadExt;
use async_std::io::{BufReader, ReadExt, WriteExt};
use async_std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use async_trait::async_trait;
use futures_lite::future;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// Longest request line accepted, excluding the line terminator.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Creates bound, listening sockets.
#[async_trait]
pub trait ListenerFactory: Send + Sync {
    type Listener: Listener;

    async fn bind(&self, addr: &str) -> io::Result<Self::Listener>;
}

/// A listening socket.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    type Conn: Connection;

    /// Waits for the next connection. Fails once `close` has been called.
    async fn accept(&self) -> io::Result<Self::Conn>;

    /// Stops accepting. Any pending and future `accept` calls fail.
    fn close(&self) -> io::Result<()>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Reads newline-delimited lines from a connection.
#[async_trait]
pub trait LineReader: Send {
    /// Returns the next line without its terminator, or `None` at end of stream.
    async fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// An accepted connection.
///
/// Clones are handles to the same underlying stream, which is how the
/// registry can reach a connection that a handler task owns.
#[async_trait]
pub trait Connection: Clone + Send + Sync + 'static {
    type Reader: LineReader;

    fn reader(&self) -> Self::Reader;

    /// Writes `line` followed by a newline.
    async fn write_line(&self, line: &str) -> io::Result<()>;

    /// Shuts the stream down in both directions. Pending reads on any clone
    /// see end of stream and later writes fail.
    fn close(&self) -> io::Result<()>;

    fn peer_addr(&self) -> Option<SocketAddr>;
}

/// Binds plain TCP listeners.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpListenerFactory;

#[async_trait]
impl ListenerFactory for TcpListenerFactory {
    type Listener = TcpAcceptor;

    async fn bind(&self, addr: &str) -> io::Result<TcpAcceptor> {
        let listener = TcpListener::bind(addr).await?;
        TcpAcceptor::new(listener)
    }
}

/// A `TcpListener` that can be closed while another task is blocked in
/// `accept`.
///
/// async-std only releases a listener on drop, so the socket is kept behind a
/// shared slot. `close` empties the slot and wakes any pending accept, whose
/// clone is the last reference to the socket.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: Mutex<Option<Arc<TcpListener>>>,
    local_addr: SocketAddr,
    closed_tx: Sender<()>,
    closed_rx: Receiver<()>,
}

impl TcpAcceptor {
    pub fn new(listener: TcpListener) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let (closed_tx, closed_rx) = channel::bounded(1);
        Ok(Self {
            listener: Mutex::new(Some(Arc::new(listener))),
            local_addr,
            closed_tx,
            closed_rx,
        })
    }

    fn current(&self) -> Option<Arc<TcpListener>> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn listener_closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "listener closed")
}

#[async_trait]
impl Listener for TcpAcceptor {
    type Conn = TcpStream;

    async fn accept(&self) -> io::Result<TcpStream> {
        let listener = self.current().ok_or_else(listener_closed)?;
        let closed = self.closed_rx.clone();

        let accept = async move { listener.accept().await.map(|(stream, _)| stream) };
        let cancelled = async move {
            let _ = closed.recv().await;
            Err(listener_closed())
        };
        future::or(cancelled, accept).await
    }

    fn close(&self) -> io::Result<()> {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.closed_tx.close();

        match listener {
            Some(_) => Ok(()),
            None => Err(listener_closed()),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

/// Line reader over a buffered TCP stream.
#[derive(Debug)]
pub struct TcpLineReader {
    inner: BufReader<TcpStream>,
}

impl TcpLineReader {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            inner: BufReader::new(stream),
        }
    }
}

#[async_trait]
impl LineReader for TcpLineReader {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        let limit = (MAX_LINE_LEN + 2) as u64;
        let n = (&mut self.inner).take(limit).read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }

        if !buf.ends_with(b"\n") && n as u64 == limit {
            return Err(line_too_long());
        }

        let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.len() > MAX_LINE_LEN {
            return Err(line_too_long());
        }

        // Undecodable bytes are left for the processor to reject
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }
}

fn line_too_long() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "request line too long")
}

#[async_trait]
impl Connection for TcpStream {
    type Reader = TcpLineReader;

    fn reader(&self) -> TcpLineReader {
        TcpLineReader::new(self.clone())
    }

    async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let mut stream = self;
        stream.write_all(buf.as_bytes()).await?;
        stream.flush().await
    }

    fn close(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        TcpStream::peer_addr(self).ok()
    }
}
