//! Client configuration.
//!
//! Loaded from TOML, with environment variables taking precedence for container deployments:
//!
//! ```toml
//! master_socket = "/var/run/haproxy-master.sock"
//! timeout_secs = 30
//!
//! [[sockets]]
//! path = "/var/run/haproxy.sock"
//! process = 1
//! ```
//!
//! - `HAPCTL_SOCKET` replaces the worker socket list with a single socket,
//! - `HAPCTL_MASTER_SOCKET` sets the master CLI socket,
//! - `HAPCTL_TIMEOUT_SECS` overrides the per-command deadline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::connection::Endpoint;
use crate::dispatcher::DispatchSettings;
use crate::errors::{Error, Result};

mod defaults {
    use crate::dispatcher::{DEFAULT_QUEUE_CAPACITY, DEFAULT_TIMEOUT};

    #[inline]
    pub fn timeout_secs() -> u64 {
        DEFAULT_TIMEOUT.as_secs()
    }

    #[inline]
    pub fn queue_capacity() -> usize {
        DEFAULT_QUEUE_CAPACITY
    }

    #[inline]
    pub fn retry() -> bool {
        true
    }
}

/// One worker stats socket.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SocketConfig {
    pub path: PathBuf,
    /// Relative process number; defaults to the socket's 1-based position in the list.
    #[serde(default)]
    pub process: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub sockets: Vec<SocketConfig>,
    #[serde(default)]
    pub master_socket: Option<PathBuf>,
    /// Deadline for one command, queueing included.
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
    /// Jobs that may wait per endpoint before submitters block.
    #[serde(default = "defaults::queue_capacity")]
    pub queue_capacity: usize,
    /// Resubmit a command once after a transport failure.
    #[serde(default = "defaults::retry")]
    pub retry: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::single("/var/run/haproxy.sock")
    }
}

impl ClientConfig {
    /// A configuration with one worker socket and default settings.
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self {
            sockets: vec![SocketConfig {
                path: path.into(),
                process: None,
            }],
            master_socket: None,
            timeout_secs: defaults::timeout_secs(),
            queue_capacity: defaults::queue_capacity(),
            retry: defaults::retry(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| Error::Config(err.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("cannot read {}: {}", path.display(), err)))?;
        Self::from_toml_str(&text)
    }

    /// Apply `HAPCTL_*` environment variables.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("HAPCTL_SOCKET") {
            self.sockets = vec![SocketConfig {
                path: path.into(),
                process: None,
            }];
        }
        if let Some(path) = lookup("HAPCTL_MASTER_SOCKET") {
            self.master_socket = Some(path.into());
        }
        if let Some(secs) = lookup("HAPCTL_TIMEOUT_SECS") {
            self.timeout_secs = secs.trim().parse().map_err(|_| {
                Error::Config(format!("HAPCTL_TIMEOUT_SECS must be a number, got {:?}", secs))
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sockets.is_empty() && self.master_socket.is_none() {
            return Err(Error::Config(
                "at least one socket or a master socket is required".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be positive".into()));
        }

        let mut seen = Vec::new();
        for endpoint in self.endpoints() {
            if seen.contains(&endpoint.role()) {
                return Err(Error::Config(format!(
                    "two sockets claim {:?}",
                    endpoint.role()
                )));
            }
            seen.push(endpoint.role());
        }
        Ok(())
    }

    /// Worker sockets in configuration order, then the master socket.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let workers = self.sockets.iter().enumerate().map(|(index, socket)| {
            let process = socket.process.unwrap_or(index as u32 + 1);
            Endpoint::worker(socket.path.clone(), process)
        });
        workers
            .chain(self.master_socket.iter().cloned().map(Endpoint::master))
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            timeout: self.timeout(),
            queue_capacity: self.queue_capacity,
            retry: self.retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_to_minimal_file() {
        let config = ClientConfig::from_toml_str(
            r#"
            [[sockets]]
            path = "/var/run/haproxy.sock"
            "#,
        )
        .unwrap();
        assert_eq!(config, ClientConfig::single("/var/run/haproxy.sock"));
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.retry);
    }

    #[test]
    fn endpoints_number_workers_and_append_master() {
        let config = ClientConfig::from_toml_str(
            r#"
            master_socket = "/run/master.sock"

            [[sockets]]
            path = "/run/a.sock"

            [[sockets]]
            path = "/run/b.sock"
            process = 4
            "#,
        )
        .unwrap();
        assert_eq!(
            config.endpoints(),
            vec![
                Endpoint::worker("/run/a.sock", 1),
                Endpoint::worker("/run/b.sock", 4),
                Endpoint::master("/run/master.sock"),
            ]
        );
        config.validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let mut config = ClientConfig::single("/run/a.sock");
        config.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = ClientConfig {
            sockets: vec![],
            master_socket: None,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig::from_toml_str(
            r#"
            [[sockets]]
            path = "/run/a.sock"
            process = 1

            [[sockets]]
            path = "/run/b.sock"
            process = 1
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ClientConfig::from_toml_str("timeout = 5").is_err());
    }

    #[test]
    fn environment_overrides() {
        let config = ClientConfig::single("/run/a.sock")
            .with_overrides(|key| match key {
                "HAPCTL_SOCKET" => Some("/run/env.sock".into()),
                "HAPCTL_TIMEOUT_SECS" => Some("5".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.sockets[0].path, PathBuf::from("/run/env.sock"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.master_socket, None);

        let err = ClientConfig::single("/run/a.sock")
            .with_overrides(|key| (key == "HAPCTL_TIMEOUT_SECS").then(|| "soon".to_owned()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "master_socket = \"/run/master.sock\"\ntimeout_secs = 10").unwrap();
        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert!(config.sockets.is_empty());
        config.validate().unwrap();

        assert!(ClientConfig::from_file("/nonexistent/hapctl.toml").is_err());
    }
}
