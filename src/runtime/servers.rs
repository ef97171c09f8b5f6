//! Server state and addressing.

use crate::client::Client;
use crate::commands;
use crate::errors::{Error, Result};
use crate::parsers::{self, RowDelimiter};
use crate::requests::{checked_name, checked_value, ServerRef, ServerState};

use super::not_found;

/// One server line of `show servers state`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ServerStateRow {
    pub backend_id: u32,
    pub backend_name: String,
    pub server_id: u32,
    pub server_name: String,
    pub address: String,
    /// `srv_op_state`: 0 stopped, 1 starting, 2 running, 3 stopping.
    pub operational_state: u8,
    /// `srv_admin_state` bit field; non-zero means maintenance or drain.
    pub admin_state: u8,
    pub user_weight: u32,
    pub initial_weight: u32,
    pub seconds_since_change: u64,
    pub fqdn: Option<String>,
    pub port: u16,
}

/// Fields up to and including `srv_port`.
const COLUMNS: usize = 19;

fn parse_servers_state(text: &str) -> Result<Vec<ServerStateRow>> {
    parsers::parse_rows(text, RowDelimiter::Whitespace, COLUMNS, |row| {
        let line = row.join(" ");
        let line = line.as_str();
        Ok(ServerStateRow {
            backend_id: parsers::number(row[0], "be_id", line)?,
            backend_name: row[1].to_owned(),
            server_id: parsers::number(row[2], "srv_id", line)?,
            server_name: row[3].to_owned(),
            address: row[4].to_owned(),
            operational_state: parsers::number(row[5], "srv_op_state", line)?,
            admin_state: parsers::number(row[6], "srv_admin_state", line)?,
            user_weight: parsers::number(row[7], "srv_uweight", line)?,
            initial_weight: parsers::number(row[8], "srv_iweight", line)?,
            seconds_since_change: parsers::number(row[9], "srv_time_since_last_change", line)?,
            fqdn: (row[17] != "-").then(|| row[17].to_owned()),
            port: parsers::number(row[18], "srv_port", line)?,
        })
    })
}

impl Client {
    /// Put a server in `ready`, `drain`, or `maint`.
    pub async fn set_server_state(&self, server: &ServerRef, state: ServerState) -> Result<()> {
        self.query(commands::set_server_state(server, state))
            .await
            .map(drop)
            .map_err(|err| not_found(err, &format!("server {}", server)))
    }

    pub async fn set_server_weight(&self, server: &ServerRef, weight: u16) -> Result<()> {
        if weight > 256 {
            return Err(Error::validation(format!(
                "server weight {} exceeds 256",
                weight
            )));
        }
        self.query(commands::set_server_weight(server, weight))
            .await
            .map(drop)
            .map_err(|err| not_found(err, &format!("server {}", server)))
    }

    /// Change a server's address and, optionally, its port.
    pub async fn set_server_addr(&self, server: &ServerRef, addr: &str, port: Option<u16>) -> Result<()> {
        let addr = checked_name("server address", addr)?;
        self.query(commands::set_server_addr(server, addr, port))
            .await
            .map(drop)
            .map_err(|err| not_found(err, &format!("server {}", server)))
    }

    /// Server state rows, for every backend or only `backend`.
    pub async fn servers_state(&self, backend: Option<&str>) -> Result<Vec<ServerStateRow>> {
        let backend = backend.map(|b| checked_value("backend", b)).transpose()?;
        self.fetch(commands::show_servers_state(backend), parse_servers_state)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scripted_client;

    const STATE: &str = "1
# be_id be_name srv_id srv_name srv_addr srv_op_state srv_admin_state srv_uweight srv_iweight srv_time_since_last_change srv_check_status srv_check_result srv_check_health srv_check_state srv_agent_state bk_f_forced_id srv_f_forced_id srv_fqdn srv_port srvrecord
3 be_web 1 web1 10.0.0.1 2 0 1 1 2042 6 3 4 6 0 0 0 - 80 -
3 be_web 2 web2 10.0.0.2 0 1 1 1 15 6 3 0 6 0 0 0 web2.internal 8080 -
";

    #[tokio::test]
    async fn state_rows() {
        let (client, transport) = scripted_client();
        transport.respond("show servers state be_web", STATE);
        let rows = client.servers_state(Some("be_web")).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].server_name, "web1");
        assert_eq!(rows[0].operational_state, 2);
        assert_eq!(rows[0].fqdn, None);
        assert_eq!(rows[0].port, 80);
        assert_eq!(rows[1].admin_state, 1);
        assert_eq!(rows[1].fqdn.as_deref(), Some("web2.internal"));
    }

    #[test]
    fn short_row_fails() {
        let text = format!("{}3 be_web 3 web3 10.0.0.3 2\n", STATE);
        assert!(matches!(parse_servers_state(&text), Err(Error::Parse { .. })));
    }

    #[tokio::test]
    async fn state_changes() {
        let (client, transport) = scripted_client();
        transport.respond("set server be_web/web1 state drain", "");
        transport.respond("set server be_web/web1 weight 50", "");
        transport.respond(
            "set server be_web/web1 addr 10.0.0.9 port 8443",
            "IP changed from '10.0.0.1' to '10.0.0.9', port changed from '80' to '8443' by 'stats socket command'",
        );
        transport.respond("set server be_web/nope state ready", "[3]: No such server.");

        let web1 = ServerRef::new("be_web", "web1").unwrap();
        client.set_server_state(&web1, ServerState::Drain).await.unwrap();
        client.set_server_weight(&web1, 50).await.unwrap();
        client.set_server_addr(&web1, "10.0.0.9", Some(8443)).await.unwrap();
        assert!(matches!(
            client.set_server_weight(&web1, 300).await,
            Err(Error::Validation(_))
        ));

        let nope = ServerRef::new("be_web", "nope").unwrap();
        assert!(client.set_server_state(&nope, ServerState::Ready).await.is_err());

        assert_eq!(
            transport.wires()[0],
            "set severity-output number;set server be_web/web1 state drain\n"
        );
    }

    #[test]
    fn states_come_from_a_fixed_set() {
        assert_eq!(
            ServerState::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            vec!["ready", "drain", "maint"]
        );
        assert!(matches!("up".parse::<ServerState>(), Err(Error::Validation(_))));
    }
}
