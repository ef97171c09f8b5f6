//! In-memory transport for unit tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::Client;
use crate::commands::Command;
use crate::config::ClientConfig;
use crate::connection::{Endpoint, Transport};
use crate::errors::{Error, Result};

#[derive(Default)]
struct Script {
    responses: HashMap<String, String>,
    failures: HashMap<String, usize>,
    hanging: HashSet<String>,
    sent: Vec<(Endpoint, Command)>,
}

/// Answers commands from a script keyed by command text and records what was sent.
///
/// Unscripted commands get HAProxy's own "unknown command" error.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, command: &str, response: &str) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(command.to_owned(), response.to_owned());
    }

    /// Fail the next `times` sends of `command` with a connection error.
    pub fn fail_times(&self, command: &str, times: usize) {
        self.script
            .lock()
            .unwrap()
            .failures
            .insert(command.to_owned(), times);
    }

    /// Never answer `command`.
    pub fn hang(&self, command: &str) {
        self.script
            .lock()
            .unwrap()
            .hanging
            .insert(command.to_owned());
    }

    pub fn sent(&self) -> Vec<(Endpoint, String)> {
        self.script
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|(endpoint, command)| (endpoint.clone(), command.text().to_owned()))
            .collect()
    }

    pub fn wires(&self) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|(_, command)| command.wire())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, endpoint: &Endpoint, command: &Command) -> Result<String> {
        let (hang, outcome) = {
            let mut script = self.script.lock().unwrap();
            script.sent.push((endpoint.clone(), command.clone()));

            let text = command.text();
            let hang = script.hanging.contains(text);
            let failing = match script.failures.get_mut(text) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            };
            let outcome = if failing {
                Err(Error::transport(
                    endpoint,
                    text,
                    io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
                ))
            } else {
                Ok(script
                    .responses
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| "[3]: Unknown command. Please enter one of the following commands only :".to_owned()))
            };
            (hang, outcome)
        };

        if hang {
            std::future::pending::<()>().await;
        }
        outcome
    }
}

/// A client for `/run/haproxy.sock` backed by a fresh [`ScriptedTransport`].
pub(crate) fn scripted_client() -> (Client, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new());
    let client = Client::with_transport(&ClientConfig::single("/run/haproxy.sock"), transport.clone())
        .expect("scripted client");
    (client, transport)
}
