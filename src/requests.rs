//! Request types for HAProxy.

use std::borrow::Cow;
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::errors::{Error, Result};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BackendId<'a> {
    /// Match all backends.
    All,
    /// Match a backend ID.
    Id(i32),
    /// Match a backend name.
    Name(&'a str),
}

impl Display for BackendId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BackendId::All => f.write_str("-1"),
            BackendId::Name(name) => f.write_str(name),
            BackendId::Id(id) => id.fmt(f),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorFlag {
    /// Match request and response errors.
    All,
    /// Match only request errors.
    Request,
    /// Match only response errors.
    Response,
}

impl Display for ErrorFlag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorFlag::All => Ok(()),
            ErrorFlag::Request => f.write_str("request"),
            ErrorFlag::Response => f.write_str("response"),
        }
    }
}

/// Identify an ACL or a map either by its numeric ID or by the file it was loaded from.
///
/// HAProxy accepts `#<id>` for IDs and the plain file name otherwise.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum PatternRef {
    Id(u32),
    File(String),
}

/// ACLs and maps share the same addressing scheme.
pub type AclId = PatternRef;
pub type MapId = PatternRef;

impl PatternRef {
    pub fn file(name: &str) -> Result<Self> {
        Ok(PatternRef::File(checked_name("file name", name)?.to_owned()))
    }
}

impl Display for PatternRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PatternRef::Id(id) => write!(f, "#{}", id),
            PatternRef::File(file) => f.write_str(file),
        }
    }
}

impl From<u32> for PatternRef {
    fn from(id: u32) -> Self {
        PatternRef::Id(id)
    }
}

/// Administrative states accepted by `set server <b>/<s> state`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ServerState {
    Ready,
    Drain,
    Maint,
}

impl ServerState {
    /// Every state HAProxy accepts, in the order the management guide lists them.
    pub const ALL: [ServerState; 3] = [ServerState::Ready, ServerState::Drain, ServerState::Maint];

    pub fn as_str(self) -> &'static str {
        match self {
            ServerState::Ready => "ready",
            ServerState::Drain => "drain",
            ServerState::Maint => "maint",
        }
    }
}

impl Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ServerState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| {
                Error::validation(format!(
                    "unknown server state {:?}, expected one of ready, drain, maint",
                    s
                ))
            })
    }
}

/// A `<backend>/<server>` pair.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ServerRef {
    pub backend: String,
    pub server: String,
}

impl ServerRef {
    pub fn new(backend: &str, server: &str) -> Result<Self> {
        Ok(Self {
            backend: checked_name("backend name", backend)?.to_owned(),
            server: checked_name("server name", server)?.to_owned(),
        })
    }
}

impl Display for ServerRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.backend, self.server)
    }
}

/// Reject names that would corrupt the single-line command syntax.
pub(crate) fn checked_name<'a>(what: &str, name: &'a str) -> Result<&'a str> {
    if name.trim().is_empty() {
        return Err(Error::validation(format!("{} must not be empty", what)));
    }
    if name.chars().any(|c| c.is_whitespace() || c == ';') {
        return Err(Error::validation(format!(
            "{} {:?} must not contain whitespace or ';'",
            what, name
        )));
    }
    Ok(name)
}

/// Prepare a `<<` payload. HAProxy ends the block at the first blank line, so blank lines (such
/// as those between PEM blocks of a CA bundle) are removed rather than sent.
pub(crate) fn checked_payload<'a>(what: &str, payload: &'a str) -> Result<Cow<'a, str>> {
    if payload.trim().is_empty() {
        return Err(Error::validation(format!("{} must not be empty", what)));
    }
    let body = payload.trim_end_matches(['\r', '\n']);
    if !body.lines().any(|line| line.trim().is_empty()) {
        return Ok(Cow::Borrowed(body));
    }
    let kept: Vec<&str> = body.lines().filter(|line| !line.trim().is_empty()).collect();
    Ok(Cow::Owned(kept.join("\n")))
}

/// Single-line values such as ACL patterns and map values.
pub(crate) fn checked_value<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{} must not be empty", what)));
    }
    if value.contains(['\n', '\r', ';']) {
        return Err(Error::validation(format!(
            "{} must be a single line without ';'",
            what
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_ref_display() {
        assert_eq!(PatternRef::Id(3).to_string(), "#3");
        assert_eq!(
            PatternRef::file("/etc/haproxy/hosts.map").unwrap().to_string(),
            "/etc/haproxy/hosts.map"
        );
        assert!(PatternRef::file(" ").is_err());
    }

    #[test]
    fn backend_id_display() {
        assert_eq!(BackendId::All.to_string(), "-1");
        assert_eq!(BackendId::Id(4).to_string(), "4");
        assert_eq!(BackendId::Name("web").to_string(), "web");
    }

    #[test]
    fn server_state_round_trips_known_values_only() {
        for state in ServerState::ALL.iter() {
            assert_eq!(state.as_str().parse::<ServerState>().unwrap(), *state);
        }
        assert!(matches!(
            "up".parse::<ServerState>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn server_ref_rejects_separators() {
        assert_eq!(ServerRef::new("web", "s1").unwrap().to_string(), "web/s1");
        assert!(ServerRef::new("web", "s 1").is_err());
        assert!(ServerRef::new("", "s1").is_err());
        assert!(ServerRef::new("web;show", "s1").is_err());
    }

    #[test]
    fn payload_blank_lines_are_dropped() {
        assert_eq!(
            checked_payload("certificate", "-----BEGIN-----\nabc\n-----END-----\n").unwrap(),
            "-----BEGIN-----\nabc\n-----END-----"
        );
        let bundle = "-----BEGIN CERTIFICATE-----\nAAA\n-----END CERTIFICATE-----\n\n\
                      -----BEGIN CERTIFICATE-----\nBBB\n-----END CERTIFICATE-----\n";
        assert_eq!(
            checked_payload("CA bundle", bundle).unwrap(),
            "-----BEGIN CERTIFICATE-----\nAAA\n-----END CERTIFICATE-----\n\
             -----BEGIN CERTIFICATE-----\nBBB\n-----END CERTIFICATE-----"
        );
        assert!(checked_payload("certificate", "").is_err());
        assert!(checked_payload("certificate", "\n \n").is_err());
    }
}
