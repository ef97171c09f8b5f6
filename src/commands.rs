//! Runtime API commands and their wire rendering.
//!
//! Every command is sent as `set severity-output number;<command>\n` so that errors come back
//! with a severity marker (see [`crate::frame`]). Commands carrying a payload use HAProxy's
//! `<<` syntax: the payload follows on its own lines and a blank line ends it.

use std::fmt;

use crate::requests::{BackendId, ErrorFlag, PatternRef, ServerRef, ServerState};

/// Directive issued before every command on a fresh connection.
pub const SEVERITY_DIRECTIVE: &str = "set severity-output number";

/// Which HAProxy process a command is meant for.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Target {
    /// The first worker socket, or worker 1 through the master socket.
    #[default]
    Default,
    /// The master CLI itself.
    Master,
    /// Worker `n` (1-based, as the master CLI counts them).
    Worker(u32),
}

/// One Runtime API command. Immutable once built; a retry sends a clone.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Command {
    text: String,
    payload: Option<String>,
    target: Target,
    route: Option<u32>,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            payload: None,
            target: Target::Default,
            route: None,
        }
    }

    /// Attach a `<<` payload.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn on(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn is_multiline(&self) -> bool {
        self.payload.is_some()
    }

    /// A copy addressed to worker `process` through the master CLI (`@<n>` prefix).
    pub(crate) fn routed(&self, process: u32) -> Self {
        Self {
            route: Some(process),
            ..self.clone()
        }
    }

    /// The exact bytes written to the socket.
    pub fn wire(&self) -> String {
        let mut line = String::with_capacity(self.text.len() + 32);
        if let Some(process) = self.route {
            line.push_str(&format!("@{} ", process));
        }
        line.push_str(SEVERITY_DIRECTIVE);
        line.push(';');
        line.push_str(&self.text);

        match &self.payload {
            Some(payload) => {
                line.push_str(" <<\n");
                line.push_str(payload.trim_end_matches(['\r', '\n']));
                line.push_str("\n\n");
            }
            None => line.push('\n'),
        }
        line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Command::new(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Command::new(text)
    }
}

// CLI

pub fn show_cli_level() -> Command {
    Command::new("show cli level")
}

pub fn show_cli_sockets() -> Command {
    Command::new("show cli sockets")
}

pub fn show_info() -> Command {
    Command::new("show info")
}

pub fn show_errors() -> Command {
    Command::new("show errors")
}

pub fn show_errors_backend(backend: &BackendId, error_type: &ErrorFlag) -> Command {
    match error_type {
        ErrorFlag::All => Command::new(format!("show errors {}", backend)),
        flag => Command::new(format!("show errors {} {}", backend, flag)),
    }
}

// ACLs

pub fn show_acl() -> Command {
    Command::new("show acl")
}

pub fn show_acl_entries(id: &PatternRef) -> Command {
    Command::new(format!("show acl {}", id))
}

pub fn get_acl(id: &PatternRef, value: &str) -> Command {
    Command::new(format!("get acl {} {}", id, value))
}

pub fn add_acl(id: &PatternRef, value: &str) -> Command {
    Command::new(format!("add acl {} {}", id, value))
}

pub fn del_acl(id: &PatternRef, value: &str) -> Command {
    Command::new(format!("del acl {} {}", id, value))
}

pub fn clear_acl(id: &PatternRef) -> Command {
    Command::new(format!("clear acl {}", id))
}

pub fn prepare_acl(id: &PatternRef) -> Command {
    Command::new(format!("prepare acl {}", id))
}

pub fn add_acl_versioned(version: u64, id: &PatternRef, payload: &str) -> Command {
    Command::new(format!("add acl @{} {}", version, id)).with_payload(payload)
}

pub fn commit_acl(version: u64, id: &PatternRef) -> Command {
    Command::new(format!("commit acl @{} {}", version, id))
}

// Maps

pub fn show_map() -> Command {
    Command::new("show map")
}

pub fn show_map_entries(id: &PatternRef) -> Command {
    Command::new(format!("show map {}", id))
}

pub fn get_map(id: &PatternRef, key: &str) -> Command {
    Command::new(format!("get map {} {}", id, key))
}

pub fn add_map(id: &PatternRef, key: &str, value: &str) -> Command {
    Command::new(format!("add map {} {} {}", id, key, value))
}

pub fn add_map_payload(id: &PatternRef, payload: &str) -> Command {
    Command::new(format!("add map {}", id)).with_payload(payload)
}

pub fn set_map(id: &PatternRef, key: &str, value: &str) -> Command {
    Command::new(format!("set map {} {} {}", id, key, value))
}

pub fn del_map(id: &PatternRef, key: &str) -> Command {
    Command::new(format!("del map {} {}", id, key))
}

pub fn clear_map(id: &PatternRef) -> Command {
    Command::new(format!("clear map {}", id))
}

pub fn prepare_map(id: &PatternRef) -> Command {
    Command::new(format!("prepare map {}", id))
}

pub fn add_map_versioned(version: u64, id: &PatternRef, payload: &str) -> Command {
    Command::new(format!("add map @{} {}", version, id)).with_payload(payload)
}

pub fn commit_map(version: u64, id: &PatternRef) -> Command {
    Command::new(format!("commit map @{} {}", version, id))
}

// SSL storage: certificates, CA files, CRL files

pub fn show_ssl(store: &str) -> Command {
    Command::new(format!("show ssl {}", store))
}

pub fn show_ssl_entry(store: &str, name: &str) -> Command {
    Command::new(format!("show ssl {} {}", store, name))
}

pub fn new_ssl(store: &str, name: &str) -> Command {
    Command::new(format!("new ssl {} {}", store, name))
}

pub fn set_ssl(store: &str, name: &str, payload: &str) -> Command {
    Command::new(format!("set ssl {} {}", store, name)).with_payload(payload)
}

pub fn add_ssl(store: &str, name: &str, payload: &str) -> Command {
    Command::new(format!("add ssl {} {}", store, name)).with_payload(payload)
}

pub fn commit_ssl(store: &str, name: &str) -> Command {
    Command::new(format!("commit ssl {} {}", store, name))
}

pub fn abort_ssl(store: &str, name: &str) -> Command {
    Command::new(format!("abort ssl {} {}", store, name))
}

pub fn del_ssl(store: &str, name: &str) -> Command {
    Command::new(format!("del ssl {} {}", store, name))
}

// CRT-lists

pub fn show_crt_lists() -> Command {
    Command::new("show ssl crt-list")
}

pub fn show_crt_list_entries(list: &str) -> Command {
    Command::new(format!("show ssl crt-list -n {}", list))
}

pub fn add_crt_list_entry(list: &str, line: &str) -> Command {
    Command::new(format!("add ssl crt-list {}", list)).with_payload(line)
}

pub fn del_crt_list_entry(list: &str, entry: &str) -> Command {
    Command::new(format!("del ssl crt-list {} {}", list, entry))
}

// OCSP

pub fn show_ocsp_responses() -> Command {
    Command::new("show ssl ocsp-response")
}

pub fn show_ocsp_response(id: &str) -> Command {
    Command::new(format!("show ssl ocsp-response {}", id))
}

pub fn set_ocsp_response(base64: &str) -> Command {
    Command::new("set ssl ocsp-response").with_payload(base64)
}

pub fn update_ocsp_response(certificate: &str) -> Command {
    Command::new(format!("update ssl ocsp-response {}", certificate))
}

// Stick tables

pub fn show_tables() -> Command {
    Command::new("show table")
}

pub fn show_table_entries(table: &str, filter: Option<&str>) -> Command {
    match filter {
        Some(filter) => Command::new(format!("show table {} {}", table, filter)),
        None => Command::new(format!("show table {}", table)),
    }
}

// ACME

pub fn acme_status() -> Command {
    Command::new("acme status")
}

pub fn acme_renew(certificate: &str) -> Command {
    Command::new(format!("acme renew {}", certificate))
}

// Servers

pub fn set_server_state(server: &ServerRef, state: ServerState) -> Command {
    Command::new(format!("set server {} state {}", server, state))
}

pub fn set_server_weight(server: &ServerRef, weight: u16) -> Command {
    Command::new(format!("set server {} weight {}", server, weight))
}

pub fn set_server_addr(server: &ServerRef, addr: &str, port: Option<u16>) -> Command {
    match port {
        Some(port) => Command::new(format!(
            "set server {} addr {} port {}",
            server, addr, port
        )),
        None => Command::new(format!("set server {} addr {}", server, addr)),
    }
}

pub fn show_servers_state(backend: Option<&str>) -> Command {
    match backend {
        Some(backend) => Command::new(format!("show servers state {}", backend)),
        None => Command::new("show servers state"),
    }
}
