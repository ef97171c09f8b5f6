//! Push notifications from a ring buffer sink (`show events`).
//!
//! A listener owns one connection for its whole life. It writes the subscribe line once, then a
//! background task decodes frames as HAProxy pushes them. Nothing here goes through the
//! [`Dispatcher`](crate::dispatcher::Dispatcher): the stream has no request/response pairing and
//! no deadline once subscribed.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::SEVERITY_DIRECTIVE;
use crate::connection::Endpoint;
use crate::errors::{Error, Result};
use crate::frame::{self, Delimiter, FrameReader};
use crate::requests::checked_name;

/// Records buffered between the reader task and [`EventListener::listen`].
const EVENT_BUFFER: usize = 256;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EventFlags {
    /// `-w`: keep the connection open and wait for new events.
    pub wait: bool,
    /// `-n`: skip events already in the ring.
    pub no_history: bool,
    /// `-0`: terminate events with NUL instead of newline.
    pub nul: bool,
}

impl EventFlags {
    /// Follow new events only, newline delimited.
    pub fn follow() -> Self {
        Self {
            wait: true,
            no_history: true,
            nul: false,
        }
    }

    pub fn delimiter(&self) -> Delimiter {
        if self.nul {
            Delimiter::Nul
        } else {
            Delimiter::Newline
        }
    }
}

impl fmt::Display for EventFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flags = [(self.wait, "-w"), (self.no_history, "-n"), (self.nul, "-0")];
        let mut first = true;
        for (_, flag) in flags.iter().filter(|(set, _)| *set) {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(flag)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Decode one pushed frame.
///
/// Frames look like `<134>2024-05-02T10:11:12.123456+02:00 message`. The `<N>` tag is optional.
/// Without a readable timestamp the receipt time is used and the whole frame is the message.
pub fn parse_event(frame: &str) -> EventRecord {
    let text = strip_priority(frame.trim());

    let (first, rest) = text.split_once(' ').unwrap_or((text, ""));
    match DateTime::parse_from_rfc3339(first) {
        Ok(timestamp) => EventRecord {
            timestamp: timestamp.with_timezone(&Utc),
            message: rest.trim_start().to_owned(),
        },
        Err(_) => EventRecord {
            timestamp: Utc::now(),
            message: text.to_owned(),
        },
    }
}

/// A subscription to one event sink.
///
/// `listen` and `close` take `&self`, so the listener can be shared in an `Arc` between the task
/// consuming events and the task deciding when to stop.
pub struct EventListener {
    endpoint: Endpoint,
    sink: String,
    events: tokio::sync::Mutex<mpsc::Receiver<Result<EventRecord>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
    closed: AtomicBool,
    last_error: Mutex<Option<Error>>,
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventListener")
            .field("endpoint", &self.endpoint)
            .field("sink", &self.sink)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl EventListener {
    /// Dial `endpoint` and subscribe to `sink`. `timeout` bounds both steps.
    pub async fn connect(
        endpoint: &Endpoint,
        sink: &str,
        timeout: Duration,
        flags: EventFlags,
    ) -> Result<Self> {
        let sink = checked_name("sink", sink)?.to_owned();
        let subscribe = subscribe_line(&sink, flags);

        let dial = async {
            let mut stream = UnixStream::connect(endpoint.path()).await?;
            stream.write_all(subscribe.as_bytes()).await?;
            stream.flush().await?;
            Ok::<_, io::Error>(stream)
        };
        let stream = match tokio::time::timeout(timeout, dial).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(Error::transport(endpoint, subscribe.trim_end(), err)),
            Err(_) => {
                return Err(Error::Timeout {
                    command: subscribe.trim_end().to_owned(),
                    timeout,
                })
            }
        };
        info!(%endpoint, %sink, %flags, "subscribed to events");

        Ok(Self::spawn(endpoint.clone(), sink, stream, flags.delimiter()))
    }

    fn spawn(endpoint: Endpoint, sink: String, stream: UnixStream, delimiter: Delimiter) -> Self {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let shutdown = CancellationToken::new();
        let frames = FrameReader::new(BufReader::new(stream), delimiter);
        let reader = tokio::spawn(read_events(
            frames,
            tx,
            shutdown.clone(),
            endpoint.clone(),
            sink.clone(),
        ));

        Self {
            endpoint,
            sink,
            events: tokio::sync::Mutex::new(rx),
            reader: Mutex::new(Some(reader)),
            shutdown,
            closed: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait for the next event.
    ///
    /// Cancelling `cancel` closes the listener. Once closed, every call returns the error that
    /// ended the stream without waiting.
    pub async fn listen(&self, cancel: &CancellationToken) -> Result<EventRecord> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let mut events = tokio::select! {
            _ = cancel.cancelled() => {
                self.close();
                return Err(self.closed_error());
            }
            _ = self.shutdown.cancelled() => return Err(self.closed_error()),
            events = self.events.lock() => events,
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                self.close();
                Err(self.closed_error())
            }
            _ = self.shutdown.cancelled() => Err(self.closed_error()),
            next = events.recv() => match next {
                Some(Ok(record)) => Ok(record),
                Some(Err(err)) => {
                    self.record_error(err.clone());
                    self.close();
                    Err(err)
                }
                None => {
                    self.close();
                    Err(self.closed_error())
                }
            },
        }
    }

    /// Stop the reader and drop the connection. Safe to call more than once, from any task.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        if let Some(reader) = self.reader.lock().ok().and_then(|mut slot| slot.take()) {
            reader.abort();
        }
        if let Ok(mut events) = self.events.try_lock() {
            events.close();
        }
        debug!(endpoint = %self.endpoint, sink = %self.sink, "event listener closed");
    }

    fn record_error(&self, err: Error) {
        if let Ok(mut last) = self.last_error.lock() {
            last.get_or_insert(err);
        }
    }

    fn closed_error(&self) -> Error {
        self.last_error
            .lock()
            .ok()
            .and_then(|last| last.clone())
            .unwrap_or_else(|| {
                Error::transport(
                    &self.endpoint,
                    &format!("show events {}", self.sink),
                    io::Error::new(io::ErrorKind::ConnectionAborted, "event listener closed"),
                )
            })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.close();
    }
}

fn subscribe_line(sink: &str, flags: EventFlags) -> String {
    let mut line = format!("@@1 {};show events {}", SEVERITY_DIRECTIVE, sink);
    if flags != EventFlags::default() {
        line.push(' ');
        line.push_str(&flags.to_string());
    }
    line.push('\n');
    line
}

/// Drop a leading syslog `<N>` priority tag, if any.
fn strip_priority(text: &str) -> &str {
    match text.strip_prefix('<').and_then(|rest| rest.split_once('>')) {
        Some((tag, rest)) if !tag.is_empty() && tag.bytes().all(|b| b.is_ascii_digit()) => rest,
        _ => text,
    }
}

async fn read_events(
    mut frames: FrameReader<BufReader<UnixStream>>,
    tx: mpsc::Sender<Result<EventRecord>>,
    shutdown: CancellationToken,
    endpoint: Endpoint,
    sink: String,
) {
    let command = format!("show events {}", sink);
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => return,
            next = frames.next_frame() => next,
        };

        let outcome = match next {
            Ok(Some(frame)) if frame.trim().is_empty() => continue,
            Ok(Some(frame)) => match frame::bracketed_severity(strip_priority(frame.trim())) {
                Some((severity, message)) => Err(Error::Protocol {
                    command: command.clone(),
                    severity: Some(severity),
                    message: message.to_owned(),
                    response: frame.clone(),
                }),
                None => Ok(parse_event(&frame)),
            },
            Ok(None) => Err(Error::transport(
                &endpoint,
                &command,
                io::Error::new(io::ErrorKind::UnexpectedEof, "event stream closed by peer"),
            )),
            Err(err) => Err(Error::transport(&endpoint, &command, err)),
        };

        let last = outcome.is_err();
        if let Err(err) = &outcome {
            warn!(%endpoint, %sink, error = %err, "event stream ended");
        }
        if tx.send(outcome).await.is_err() || last {
            return;
        }
    }
}
