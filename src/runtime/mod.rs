//! Typed operations on runtime resources.
//!
//! Each submodule extends [`Client`] with the commands for one resource kind and defines the
//! records its responses parse into. Listings are tolerant and skip lines they cannot read;
//! detail views fail on missing dates and serial numbers.

use crate::classifier::{Phase, ResourceKind};
use crate::client::Client;
use crate::commands::{self, Command};
use crate::errors::{Error, Result};
use crate::requests::checked_name;

mod acl;
mod acme;
mod ca_files;
mod certs;
mod crl_files;
mod crt_lists;
mod info;
mod maps;
mod ocsp;
mod patterns;
mod servers;
mod stick_tables;

pub use acl::AclMatch;
pub use acme::{AcmeCertificate, AcmeState};
pub use ca_files::CaCertificate;
pub use certs::{CertificateDetail, StoredFile};
pub use crl_files::{CrlRecord, RevokedCertificate};
pub use crt_lists::CrtListEntry;
pub use info::{CliSocket, CliSocketAddr, CliSocketProcesses, Info, Level};
pub use maps::MapMatch;
pub use ocsp::{OcspCertificate, OcspResponse};
pub use patterns::{PatternEntry, PatternFile};
pub use servers::ServerStateRow;
pub use stick_tables::{StickData, StickEntry, StickTable};

impl Client {
    /// Issue `command` and parse the answer, attaching the command text to parse failures.
    pub(crate) async fn fetch<T, F>(&self, command: Command, parse: F) -> Result<T>
    where
        F: FnOnce(&str) -> Result<T>,
    {
        let text = command.text().to_owned();
        let response = self.query(command).await?;
        parse(&response).map_err(|err| err.with_command(&text))
    }

    /// `del ssl <store> <name>` for certificates, CA files, and CRL files.
    pub(crate) async fn delete_stored(&self, kind: ResourceKind, name: &str) -> Result<()> {
        let name = checked_name("file name", name)?;
        let store = kind
            .ssl_store()
            .ok_or_else(|| Error::validation(format!("{} is not kept in SSL storage", kind)))?;
        self.confirm(kind, Phase::Delete, commands::del_ssl(store, name))
            .await
            .map(drop)
    }
}

/// Map HAProxy's refusals for unknown names to [`Error::NotFound`].
pub(crate) fn not_found(err: Error, what: &str) -> Error {
    match err {
        Error::Protocol {
            command,
            message,
            response,
            ..
        } if refers_to_missing(&message) => Error::NotFound {
            command,
            what: what.to_owned(),
            response,
        },
        other => other,
    }
}

fn refers_to_missing(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("not found") || message.contains("unknown") || message.contains("can't find")
}

/// The final segment of a slash-separated path.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
