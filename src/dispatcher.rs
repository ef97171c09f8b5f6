//! Bounded job queues in front of the socket transport.
//!
//! Each endpoint gets one queue drained by one worker task, so commands for the same socket run
//! in submission order and never overlap, while different endpoints proceed in parallel. A job
//! that gets no answer within the deadline fails with [`Error::Timeout`]; a job that fails at
//! the transport level is submitted once more, and a timeout is never retried.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::commands::{Command, Target};
use crate::connection::{Endpoint, ProcessRole, Transport};
use crate::errors::{Error, Result};
use crate::frame;

/// Deadline applied to every job unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Queue depth per endpoint unless configured otherwise.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DispatchSettings {
    pub timeout: Duration,
    pub queue_capacity: usize,
    /// Resubmit once after a transport failure.
    pub retry: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            retry: true,
        }
    }
}

struct Job {
    command: Command,
    respond: oneshot::Sender<Result<String>>,
}

struct Lane {
    endpoint: Endpoint,
    jobs: mpsc::Sender<Job>,
}

/// Funnels commands through the [`Transport`], one queue per endpoint.
pub struct Dispatcher {
    lanes: Vec<Lane>,
    settings: DispatchSettings,
}

impl Dispatcher {
    /// Spawn one worker per endpoint. Must be called from within a Tokio runtime.
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Vec<Endpoint>,
        settings: DispatchSettings,
    ) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::Config("no Runtime API endpoint configured".into()));
        }
        if settings.queue_capacity == 0 {
            return Err(Error::Config("queue capacity must be at least 1".into()));
        }
        if settings.timeout.is_zero() {
            return Err(Error::Config("command timeout must be positive".into()));
        }

        let lanes = endpoints
            .into_iter()
            .map(|endpoint| {
                let (jobs, queue) = mpsc::channel(settings.queue_capacity);
                tokio::spawn(run_worker(
                    Arc::clone(&transport),
                    endpoint.clone(),
                    queue,
                    settings.timeout,
                ));
                Lane { endpoint, jobs }
            })
            .collect();

        Ok(Self { lanes, settings })
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.lanes.iter().map(|lane| &lane.endpoint)
    }

    /// Send `command` and fail if HAProxy answers with an error severity (`0`-`3`).
    pub async fn execute(&self, command: Command) -> Result<()> {
        let response = self.execute_with_response(command.clone()).await?;
        match frame::response_error(&response) {
            Some((severity, message)) => Err(Error::Protocol {
                command: command.text().to_owned(),
                severity: Some(severity),
                message: message.to_owned(),
                response,
            }),
            None => Ok(()),
        }
    }

    /// Send `command` and return HAProxy's answer verbatim.
    pub async fn execute_with_response(&self, command: Command) -> Result<String> {
        let (lane, command) = self.route(command)?;

        match self.submit(lane, command.clone()).await {
            Err(first) if first.is_retryable() && self.settings.retry => {
                warn!(
                    endpoint = %lane.endpoint,
                    command = command.text(),
                    error = %first,
                    "transport failure, retrying once"
                );
                self.submit(lane, command).await
            }
            result => result,
        }
    }

    /// Pick the lane for a command, adding the `@<n>` prefix when it goes through the master.
    fn route(&self, command: Command) -> Result<(&Lane, Command)> {
        let master = || {
            self.lanes
                .iter()
                .find(|lane| lane.endpoint.role() == ProcessRole::Master)
        };

        let routed = match command.target() {
            Target::Master => master().map(|lane| (lane, command.clone())),
            Target::Worker(n) => self
                .lanes
                .iter()
                .find(|lane| lane.endpoint.role() == ProcessRole::Worker(n))
                .map(|lane| (lane, command.clone()))
                .or_else(|| master().map(|lane| (lane, command.routed(n)))),
            Target::Default => self
                .lanes
                .iter()
                .find(|lane| matches!(lane.endpoint.role(), ProcessRole::Worker(_)))
                .map(|lane| (lane, command.clone()))
                .or_else(|| master().map(|lane| (lane, command.routed(1)))),
        };

        routed.ok_or_else(|| {
            Error::validation(format!(
                "no endpoint serves {:?} for `{}`",
                command.target(),
                command.text()
            ))
        })
    }

    /// One attempt: enqueue the job and wait for the worker, bounded by the deadline.
    async fn submit(&self, lane: &Lane, command: Command) -> Result<String> {
        let timeout = self.settings.timeout;
        let text = command.text().to_owned();
        let endpoint = lane.endpoint.clone();

        let attempt = async {
            let (respond, response) = oneshot::channel();
            lane.jobs
                .send(Job { command, respond })
                .await
                .map_err(|_| worker_gone(&endpoint, &text))?;
            response.await.map_err(|_| worker_gone(&endpoint, &text))?
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%endpoint, command = %text, "command timed out");
                Err(Error::Timeout {
                    command: text,
                    timeout,
                })
            }
        }
    }
}

fn worker_gone(endpoint: &Endpoint, command: &str) -> Error {
    Error::transport(
        endpoint,
        command,
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "dispatcher worker stopped"),
    )
}

/// Drain one endpoint's queue. A round trip is dropped, closing its socket, once the caller
/// stops waiting or `timeout` passes, so a silent server cannot hold the lane.
async fn run_worker(
    transport: Arc<dyn Transport>,
    endpoint: Endpoint,
    mut queue: mpsc::Receiver<Job>,
    timeout: Duration,
) {
    while let Some(job) = queue.recv().await {
        let Job {
            command,
            mut respond,
        } = job;
        if respond.is_closed() {
            debug!(%endpoint, command = command.text(), "caller gave up, skipping job");
            continue;
        }

        let result = tokio::select! {
            result = tokio::time::timeout(timeout, transport.send(&endpoint, &command)) => {
                result.unwrap_or_else(|_| {
                    Err(Error::Timeout {
                        command: command.text().to_owned(),
                        timeout,
                    })
                })
            }
            _ = respond.closed() => {
                debug!(%endpoint, command = command.text(), "caller gave up, abandoning round trip");
                continue;
            }
        };
        let _ = respond.send(result);
    }
    debug!(%endpoint, "dispatcher worker stopped");
}
