//! A fake HAProxy stats socket for integration tests.
//!
//! Accepts any number of connections on a Unix socket in a temporary directory, records the raw
//! bytes of each request, and answers from a table keyed by command text.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

pub const DIRECTIVE: &str = "set severity-output number;";

#[derive(Default)]
struct State {
    responses: HashMap<String, String>,
    requests: Vec<String>,
    /// Connections to close without answering, before serving normally.
    drop_next: usize,
    /// Connections to keep open without answering, before serving normally.
    hold_next: usize,
    held: Vec<UnixStream>,
}

pub struct FakeHaproxy {
    _dir: TempDir,
    path: PathBuf,
    state: Arc<Mutex<State>>,
    handle: JoinHandle<()>,
}

impl FakeHaproxy {
    pub fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("haproxy.sock");
        let listener = UnixListener::bind(&path).expect("bind fake socket");
        let state = Arc::new(Mutex::new(State::default()));

        let handle = tokio::spawn(serve(listener, state.clone()));
        Self {
            _dir: dir,
            path,
            state,
            handle,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }

    pub fn respond(&self, command: &str, response: &str) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(command.to_owned(), response.to_owned());
    }

    /// Close the next `count` connections without reading or answering.
    pub fn drop_connections(&self, count: usize) {
        self.state.lock().unwrap().drop_next = count;
    }

    /// Accept the next `count` connections and never answer them.
    pub fn hold_connections(&self, count: usize) {
        self.state.lock().unwrap().hold_next = count;
    }

    /// Raw bytes received on each answered connection, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

impl Drop for FakeHaproxy {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(listener: UnixListener, state: Arc<Mutex<State>>) {
    while let Ok((stream, _)) = listener.accept().await {
        let stream = {
            let mut state = state.lock().unwrap();
            if state.drop_next > 0 {
                state.drop_next -= 1;
                None
            } else if state.hold_next > 0 {
                state.hold_next -= 1;
                state.held.push(stream);
                None
            } else {
                Some(stream)
            }
        };
        let Some(stream) = stream else {
            continue;
        };

        let state = state.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stream);
            let mut raw = String::new();
            if reader.read_line(&mut raw).await.unwrap_or(0) == 0 {
                return;
            }

            let multiline = raw.trim_end().ends_with(" <<");
            if multiline {
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        break;
                    }
                    raw.push_str(&line);
                    if line.trim().is_empty() {
                        break;
                    }
                }
            }

            let command = command_text(&raw);
            let response = {
                let mut state = state.lock().unwrap();
                state.requests.push(raw.clone());
                state
                    .responses
                    .get(&command)
                    .cloned()
                    .unwrap_or_else(|| "[3]: Unknown command.\n".to_owned())
            };

            let stream = reader.get_mut();
            if multiline {
                let _ = stream.write_all(b"\n").await;
            }
            let _ = stream.write_all(response.as_bytes()).await;
            if !response.ends_with('\n') {
                let _ = stream.write_all(b"\n").await;
            }
            let _ = stream.write_all(b"\n").await;
            let _ = stream.shutdown().await;
        });
    }
}

/// The command keyword line without routing prefix, directive, or `<<` marker.
fn command_text(raw: &str) -> String {
    let first = raw.lines().next().unwrap_or("");
    let first = match first.strip_prefix('@') {
        Some(rest) => rest.split_once(' ').map_or(rest, |(_, rest)| rest),
        None => first,
    };
    let first = first.strip_prefix(DIRECTIVE).unwrap_or(first);
    first.trim_end().trim_end_matches(" <<").to_owned()
}
