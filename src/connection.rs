use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tracing::{debug, trace};

use crate::commands::Command;
use crate::errors::{Error, Result};
use crate::frame::{Delimiter, FrameReader};

/// Which kind of HAProxy process listens on a socket.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProcessRole {
    /// The master CLI of a master-worker setup. Commands for workers are forwarded with `@<n>`.
    Master,
    /// A worker's stats socket; the number is the worker's relative process number.
    Worker(u32),
}

/// Address of a Runtime API socket.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Endpoint {
    path: PathBuf,
    role: ProcessRole,
}

impl Endpoint {
    pub fn worker(path: impl Into<PathBuf>, process: u32) -> Self {
        Self {
            path: path.into(),
            role: ProcessRole::Worker(process),
        }
    }

    pub fn master(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            role: ProcessRole::Master,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> ProcessRole {
        self.role
    }
}

/// Use a default location of `/var/run/haproxy.sock` for a single worker socket.
impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::worker("/var/run/haproxy.sock", 1)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.role {
            ProcessRole::Master => write!(f, "master@{}", self.path.display()),
            ProcessRole::Worker(n) => write!(f, "worker {}@{}", n, self.path.display()),
        }
    }
}

/// Performs one command round trip against an endpoint.
///
/// The dispatcher owns retries and deadlines; implementations must not retry internally.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, endpoint: &Endpoint, command: &Command) -> Result<String>;
}

/// Support connections to HAProxy over any stream transport using the same interface.
#[async_trait]
pub trait ConnectionBuilder: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Create a new connection to HAProxy.
    async fn connect(&self) -> io::Result<Connection<Self::Stream>>;
}

/// Configuration for connecting to an HAProxy Unix Socket.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnixSocketBuilder {
    /// The path of the Unix socket.
    path: PathBuf,
}

impl UnixSocketBuilder {
    /// Create a new `UnixSocketBuilder` to establish connections to HAProxy via Unix Socket.
    ///
    /// # Examples
    /// ```no_run
    /// use hapctl::{ConnectionBuilder, UnixSocketBuilder};
    ///
    /// # async fn demo() -> std::io::Result<()> {
    /// let socket_builder = UnixSocketBuilder::new("/var/run/haproxy.sock");
    /// let connection = socket_builder.connect().await?;
    /// # Ok(()) }
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Use a default location of `/var/run/haproxy.sock` for the Unix socket.
impl Default for UnixSocketBuilder {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/run/haproxy.sock"),
        }
    }
}

impl From<PathBuf> for UnixSocketBuilder {
    fn from(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ConnectionBuilder for UnixSocketBuilder {
    type Stream = UnixStream;

    async fn connect(&self) -> io::Result<Connection<UnixStream>> {
        let socket = UnixStream::connect(&self.path).await?;
        Ok(Connection::new(socket))
    }
}

/// A connection to HAProxy via any of the supported transports.
///
/// By convention, connections are closed after each command. Therefore
/// [`Connection::round_trip`] takes `self` to force destruction of the `Connection` instance
/// after use. Use a `ConnectionBuilder` to create connections for each use.
#[derive(Debug)]
pub struct Connection<T> {
    stream: BufReader<T>,
}

impl<T: AsyncRead + AsyncWrite + Unpin> Connection<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Write `command` and read frames until HAProxy closes the connection.
    ///
    /// Fails with `UnexpectedEof` when the server closes without sending anything.
    pub async fn round_trip(mut self, command: &Command) -> io::Result<String> {
        let wire = command.wire();
        trace!(wire = %wire.trim_end(), "writing command");
        self.stream.get_mut().write_all(wire.as_bytes()).await?;
        self.stream.get_mut().flush().await?;

        let mut frames = FrameReader::new(&mut self.stream, Delimiter::Newline);
        let mut received = false;
        let mut lines: Vec<String> = Vec::new();

        if command.is_multiline() {
            // HAProxy answers the payload terminator with a blank line before the output proper.
            if let Some(first) = frames.next_frame().await? {
                received = true;
                if !first.is_empty() {
                    lines.push(first);
                }
            }
        }

        while let Some(frame) = frames.next_frame().await? {
            received = true;
            lines.push(frame);
        }
        drop(frames);

        // The peer already closed; a failed shutdown changes nothing for the caller.
        let _ = self.stream.get_mut().shutdown().await;

        if !received {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before any response was read",
            ));
        }

        while lines.last().map_or(false, |line| line.is_empty()) {
            lines.pop();
        }
        Ok(lines.join("\n"))
    }
}

/// The default [`Transport`]: a fresh Unix socket connection per command.
#[derive(Clone, Debug, Default)]
pub struct SocketTransport;

#[async_trait]
impl Transport for SocketTransport {
    async fn send(&self, endpoint: &Endpoint, command: &Command) -> Result<String> {
        let builder = UnixSocketBuilder::new(endpoint.path());
        let connection = builder
            .connect()
            .await
            .map_err(|err| Error::transport(endpoint, command.text(), err))?;

        let response = connection
            .round_trip(command)
            .await
            .map_err(|err| Error::transport(endpoint, command.text(), err))?;
        debug!(%endpoint, command = command.text(), bytes = response.len(), "round trip complete");
        Ok(response)
    }
}
