//! Success detection for commands that answer in prose.
//!
//! Many Runtime API commands report success with a sentence rather than a severity marker, and
//! the wording differs per resource kind ("Success!", "deleted!", "Transaction aborted ...").
//! The literals are listed here per kind and phase so that the substring matching lives in one
//! place. A response carrying an error severity is rejected before any literal is consulted.

use std::fmt;

use crate::errors::{Error, Result};
use crate::frame;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ResourceKind {
    SslCert,
    CaFile,
    CrlFile,
    CrtList,
    Ocsp,
    Map,
    Acl,
}

impl ResourceKind {
    /// Keyword used in `show ssl <store>` style commands.
    pub fn ssl_store(self) -> Option<&'static str> {
        match self {
            ResourceKind::SslCert => Some("cert"),
            ResourceKind::CaFile => Some("ca-file"),
            ResourceKind::CrlFile => Some("crl-file"),
            ResourceKind::CrtList => Some("crt-list"),
            ResourceKind::Ocsp => Some("ocsp-response"),
            ResourceKind::Map | ResourceKind::Acl => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::SslCert => "SSL certificate",
            ResourceKind::CaFile => "CA file",
            ResourceKind::CrlFile => "CRL file",
            ResourceKind::CrtList => "crt-list",
            ResourceKind::Ocsp => "OCSP response",
            ResourceKind::Map => "map",
            ResourceKind::Acl => "ACL",
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Phase {
    Create,
    Stage,
    Commit,
    Abort,
    Delete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Phase::Create => "create",
            Phase::Stage => "stage",
            Phase::Commit => "commit",
            Phase::Abort => "abort",
            Phase::Delete => "delete",
        })
    }
}

/// What a successful answer looks like.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Expectation {
    /// The response contains one of these literals.
    Contains(&'static [&'static str]),
    /// Any response without an error severity; HAProxy prints nothing on success.
    Silent,
}

const TRANSACTION_STAGED: &[&str] = &["Transaction created", "Transaction updated"];
const COMMITTED: &[&str] = &["Success!"];
const ABORTED: &[&str] = &["Transaction aborted"];
const DELETED: &[&str] = &["deleted!"];

/// The expected answer for `phase` on `kind`, or `None` if the kind has no such phase.
pub fn expectation(kind: ResourceKind, phase: Phase) -> Option<Expectation> {
    use Expectation::{Contains, Silent};
    use Phase::*;
    use ResourceKind::*;

    let expectation = match (kind, phase) {
        (SslCert, Create) => Contains(&["New empty certificate store"]),
        (CaFile, Create) => Contains(&["New CA file created"]),
        (CrlFile, Create) => Contains(&["New CRL file created"]),
        (SslCert | CaFile | CrlFile, Stage) => Contains(TRANSACTION_STAGED),
        (SslCert | CaFile | CrlFile, Commit) => Contains(COMMITTED),
        (SslCert | CaFile | CrlFile, Abort) => Contains(ABORTED),
        (SslCert | CaFile | CrlFile, Delete) => Contains(DELETED),

        (CrtList, Stage) => Contains(COMMITTED),
        (CrtList, Delete) => Contains(&["deleted in crtlist"]),

        (Ocsp, Stage) => Contains(&["OCSP Response updated"]),

        (Map | Acl, Create) => Contains(&["New version created:"]),
        (Map | Acl, Stage | Commit | Delete) => Silent,

        _ => return None,
    };
    Some(expectation)
}

/// Decide whether `response` to `command` means `phase` succeeded on `kind`.
///
/// Failures come back as [`Error::Protocol`] carrying the raw response.
pub fn classify(kind: ResourceKind, phase: Phase, command: &str, response: &str) -> Result<()> {
    if let Some((severity, message)) = frame::response_error(response) {
        return Err(Error::Protocol {
            command: command.to_owned(),
            severity: Some(severity),
            message: message.to_owned(),
            response: response.to_owned(),
        });
    }

    let expected = expectation(kind, phase).ok_or_else(|| {
        Error::validation(format!("{} has no {} operation", kind, phase))
    })?;

    match expected {
        Expectation::Silent => Ok(()),
        Expectation::Contains(literals) if literals.iter().any(|l| response.contains(l)) => Ok(()),
        Expectation::Contains(_) => {
            let message = response.trim();
            Err(Error::Protocol {
                command: command.to_owned(),
                severity: None,
                message: if message.is_empty() {
                    format!("{} {} returned no confirmation", kind, phase)
                } else {
                    message.to_owned()
                },
                response: response.to_owned(),
            })
        }
    }
}
