//! Process information: CLI level, CLI sockets, `show info`, and error counters.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::client::Client;
use crate::commands;
use crate::errors::{Error, Result};
use crate::parsers::{self, KeyValueRecord};
use crate::requests::{BackendId, ErrorFlag};

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Level {
    Admin,
    Operator,
    User,
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "admin" => Ok(Level::Admin),
            "operator" => Ok(Level::Operator),
            "user" => Ok(Level::User),
            other => Err(Error::parse("unknown CLI level", other)),
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum CliSocketAddr {
    Unix(PathBuf),
    Ip(SocketAddr),
    /// Any other bind address, such as `sockpair@` or an abstract namespace.
    Other(String),
}

impl FromStr for CliSocketAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(path) = s.strip_prefix("unix@") {
            return Ok(CliSocketAddr::Unix(path.into()));
        }
        if let Some(addr) = s.strip_prefix("ipv4@").or_else(|| s.strip_prefix("ipv6@")) {
            return addr
                .parse()
                .map(CliSocketAddr::Ip)
                .map_err(|_| Error::parse("invalid socket address", s));
        }
        Ok(CliSocketAddr::Other(s.to_owned()))
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum CliSocketProcesses {
    All,
    /// The process or thread set as printed, e.g. `1/1-4`.
    Some(String),
}

/// One line of `show cli sockets`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CliSocket {
    pub address: CliSocketAddr,
    pub level: Level,
    pub processes: CliSocketProcesses,
}

impl FromStr for CliSocket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(address), Some(level), Some(processes)) => Ok(CliSocket {
                address: address.parse()?,
                level: level.parse()?,
                processes: match processes {
                    "all" => CliSocketProcesses::All,
                    other => CliSocketProcesses::Some(other.to_owned()),
                },
            }),
            _ => Err(Error::parse("expected address, level, and processes", s)),
        }
    }
}

/// Selected fields of `show info`. Unknown keys are ignored; numbers that do not parse are left
/// unset.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Info {
    pub name: String,
    pub version: String,
    pub release_date: Option<String>,
    pub node: Option<String>,
    pub pid: Option<u32>,
    pub nbthread: Option<u32>,
    pub uptime_sec: Option<u64>,
    pub max_conn: Option<u64>,
    pub curr_conns: Option<u64>,
    pub cum_conns: Option<u64>,
    pub stopping: bool,
}

impl KeyValueRecord for Info {
    fn start(_previous: Option<&Self>) -> Self {
        Info::default()
    }

    fn apply(&mut self, key: &str, value: &str, _line: &str) -> Result<()> {
        match key {
            "Name" => self.name = value.to_owned(),
            "Version" => self.version = value.to_owned(),
            "Release_date" => self.release_date = Some(value.to_owned()),
            "node" => self.node = Some(value.to_owned()),
            "Pid" => self.pid = value.parse().ok(),
            "Nbthread" => self.nbthread = value.parse().ok(),
            "Uptime_sec" => self.uptime_sec = value.parse().ok(),
            "Maxconn" => self.max_conn = value.parse().ok(),
            "CurrConns" => self.curr_conns = value.parse().ok(),
            "CumConns" => self.cum_conns = value.parse().ok(),
            "Stopping" => self.stopping = value == "1",
            _ => {}
        }
        Ok(())
    }
}

/// The count from `Total events captured on [...] : 12`.
fn parse_errors(text: &str) -> Result<u32> {
    let line = parsers::data_lines(text)
        .find(|line| line.starts_with("Total events captured"))
        .ok_or_else(|| Error::parse("missing event total", text.lines().next().unwrap_or("")))?;
    let count = line.rsplit(' ').next().unwrap_or("");
    parsers::number(count, "event count", line)
}

impl Client {
    /// Query the privilege level of the CLI session.
    ///
    /// # Examples
    /// ```no_run
    /// use hapctl::{Client, ClientConfig, Level};
    ///
    /// # async fn demo() -> hapctl::Result<()> {
    /// let client = Client::new(&ClientConfig::default())?;
    /// assert_eq!(client.level().await?, Level::Admin);
    /// # Ok(()) }
    /// ```
    pub async fn level(&self) -> Result<Level> {
        self.fetch(commands::show_cli_level(), str::parse).await
    }

    /// List the configured CLI sockets.
    pub async fn cli_sockets(&self) -> Result<Vec<CliSocket>> {
        self.fetch(commands::show_cli_sockets(), |text| {
            Ok(parsers::parse_lines(text, |line| line.parse().ok()))
        })
        .await
    }

    pub async fn info(&self) -> Result<Info> {
        self.fetch(commands::show_info(), |text| {
            Ok(parsers::parse_key_value::<Info>(text)?
                .pop()
                .unwrap_or_default())
        })
        .await
    }

    /// Query the error count of all backends and all error types.
    ///
    /// This is identical to `errors_backend(BackendId::All, ErrorFlag::All)`.
    pub async fn errors(&self) -> Result<u32> {
        self.fetch(commands::show_errors(), parse_errors).await
    }

    /// Query the error count of one backend (`BackendId::All` for all) and one error type.
    pub async fn errors_backend(&self, backend: BackendId<'_>, error_type: ErrorFlag) -> Result<u32> {
        if let BackendId::Name(name) = backend {
            crate::requests::checked_name("backend", name)?;
        }
        self.fetch(commands::show_errors_backend(&backend, &error_type), parse_errors)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scripted_client;

    #[test]
    fn level_from_str() {
        assert_eq!(Level::from_str("admin\n").unwrap(), Level::Admin);
        assert_eq!(Level::from_str("operator").unwrap(), Level::Operator);
        assert_eq!(Level::from_str("user").unwrap(), Level::User);
        Level::from_str("1234").expect_err("Parsed invalid level");
    }

    #[tokio::test]
    async fn cli_sockets_listing() {
        let (client, transport) = scripted_client();
        transport.respond(
            "show cli sockets",
            "# socket lvl processes\nunix@/var/run/haproxy.sock admin all\nipv4@127.0.0.1:9999 admin all\nipv6@[::]:9999 operator 1/1-4\ngarbage\n",
        );
        let sockets = client.cli_sockets().await.unwrap();

        assert_eq!(sockets.len(), 3);
        assert_eq!(
            sockets[0],
            CliSocket {
                address: CliSocketAddr::Unix("/var/run/haproxy.sock".into()),
                level: Level::Admin,
                processes: CliSocketProcesses::All,
            }
        );
        assert_eq!(
            sockets[1].address,
            CliSocketAddr::Ip("127.0.0.1:9999".parse().unwrap())
        );
        assert_eq!(sockets[2].level, Level::Operator);
        assert_eq!(sockets[2].processes, CliSocketProcesses::Some("1/1-4".into()));
    }

    #[tokio::test]
    async fn info_fields() {
        let (client, transport) = scripted_client();
        transport.respond(
            "show info",
            "Name: HAProxy\nVersion: 2.8.3-86e043a\nRelease_date: 2023/09/07\nNbthread: 4\nPid: 8\nUptime_sec: notanumber\nCurrConns: 12\nStopping: 0\nnode: lb1\n",
        );
        let info = client.info().await.unwrap();
        assert_eq!(info.name, "HAProxy");
        assert_eq!(info.version, "2.8.3-86e043a");
        assert_eq!(info.pid, Some(8));
        assert_eq!(info.nbthread, Some(4));
        assert_eq!(info.uptime_sec, None);
        assert_eq!(info.curr_conns, Some(12));
        assert_eq!(info.node.as_deref(), Some("lb1"));
        assert!(!info.stopping);
    }

    #[tokio::test]
    async fn error_counts() {
        let (client, transport) = scripted_client();
        transport.respond("show errors", "Total events captured on [01/Jan/2020:03:15:05.071] : 0\n");
        transport.respond(
            "show errors 1 request",
            "Total events captured on [01/Jan/2020:03:15:05.071] : 100\n",
        );
        assert_eq!(client.errors().await.unwrap(), 0);
        assert_eq!(
            client
                .errors_backend(BackendId::Id(1), ErrorFlag::Request)
                .await
                .unwrap(),
            100
        );
    }

    #[tokio::test]
    async fn unparseable_error_count_names_command() {
        let (client, transport) = scripted_client();
        transport.respond("show errors", "Total events captured on [now] : many\n");
        let err = client.errors().await.unwrap_err();
        assert!(matches!(err, Error::Parse { ref command, .. } if command == "show errors"));
    }
}
