use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::classifier::{self, Phase, ResourceKind};
use crate::commands::Command;
use crate::config::ClientConfig;
use crate::connection::{Endpoint, ProcessRole, SocketTransport, Transport};
use crate::dispatcher::Dispatcher;
use crate::errors::{Error, Result};
use crate::events::{EventFlags, EventListener};
use crate::frame;

/// Handle to one HAProxy instance's Runtime API.
///
/// Cloning is cheap; clones share the dispatcher and its queues, so any number of tasks may issue
/// commands concurrently.
///
/// # Examples
/// ```no_run
/// use hapctl::{Client, ClientConfig};
///
/// # async fn demo() -> hapctl::Result<()> {
/// let client = Client::new(&ClientConfig::single("/var/run/haproxy.sock"))?;
/// for acl in client.acls().await? {
///     println!("{}: {}", acl.id, acl.description);
/// }
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct Client {
    dispatcher: Arc<Dispatcher>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoints", &self.dispatcher.endpoints().collect::<Vec<_>>())
            .finish()
    }
}

impl Client {
    /// Connect commands to the sockets named in `config`. Must be called within a Tokio runtime.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(SocketTransport))
    }

    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::new(transport, config.endpoints(), config.dispatch_settings())?;
        Ok(Self::from_dispatcher(dispatcher))
    }

    pub fn from_dispatcher(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Send a command; an error severity in the answer becomes [`Error::Protocol`].
    pub async fn execute(&self, command: impl Into<Command>) -> Result<()> {
        self.dispatcher.execute(command.into()).await
    }

    /// Send a command and return the raw answer for the caller to parse.
    pub async fn execute_with_response(&self, command: impl Into<Command>) -> Result<String> {
        self.dispatcher.execute_with_response(command.into()).await
    }

    /// Like [`Client::execute_with_response`], but an error severity fails the call.
    pub(crate) async fn query(&self, command: Command) -> Result<String> {
        let text = command.text().to_owned();
        let response = self.dispatcher.execute_with_response(command).await?;
        match frame::response_error(&response) {
            Some((severity, message)) => Err(Error::Protocol {
                command: text,
                severity: Some(severity),
                message: message.to_owned(),
                response,
            }),
            None => Ok(response),
        }
    }

    /// Send a command whose success HAProxy reports in prose and check the wording.
    pub(crate) async fn confirm(
        &self,
        kind: ResourceKind,
        phase: Phase,
        command: Command,
    ) -> Result<String> {
        let text = command.text().to_owned();
        let response = self.dispatcher.execute_with_response(command).await?;
        classifier::classify(kind, phase, &text, &response)?;
        Ok(response)
    }

    /// Subscribe to the event sink `sink` on a dedicated connection.
    ///
    /// The master socket is used when one is configured, since the subscribe line addresses
    /// worker 1 with `@@1`; otherwise the first worker socket. `timeout` bounds connecting and
    /// subscribing only.
    pub async fn events(
        &self,
        sink: &str,
        flags: EventFlags,
        timeout: Duration,
    ) -> Result<EventListener> {
        let endpoint = self.event_endpoint()?;
        EventListener::connect(&endpoint, sink, timeout, flags).await
    }

    fn event_endpoint(&self) -> Result<Endpoint> {
        let mut endpoints = self.dispatcher.endpoints();
        let master = self
            .dispatcher
            .endpoints()
            .find(|endpoint| endpoint.role() == ProcessRole::Master);
        master
            .or_else(|| endpoints.next())
            .cloned()
            .ok_or_else(|| Error::Config("no Runtime API endpoint configured".into()))
    }
}
