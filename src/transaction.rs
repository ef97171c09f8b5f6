//! Staged updates to named server-side objects.
//!
//! Certificates, CA files, and CRL files are changed in two steps: a payload is staged in a
//! transaction, then committed or aborted. The state lives in HAProxy; a [`Transaction`] only
//! tracks which step it issued last so that out-of-order calls fail before any I/O. HAProxy
//! allows one open transaction per object and reports a conflict in the response text, which
//! surfaces as [`Error::Protocol`].
//!
//! ```text
//! Absent --create--> Empty --set/add--> Staged --commit--> Committed
//!                                          \---abort---> Absent
//! ```
//!
//! Maps and ACLs use versions instead: `prepare` allocates a version, entries are added to it,
//! and `commit` makes it current ([`VersionedTransaction`]).

use tracing::{debug, info};

use crate::classifier::{Phase, ResourceKind};
use crate::client::Client;
use crate::commands;
use crate::errors::{Error, Result};
use crate::requests::{checked_name, checked_payload, PatternRef};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TransactionState {
    /// No transaction is open, and for a new object nothing exists yet.
    Absent,
    /// The object was created and holds no payload.
    Empty,
    /// A payload is staged and awaits commit or abort.
    Staged,
    /// Terminal.
    Committed,
}

/// One staged update to an SSL certificate, CA file, or CRL file.
#[derive(Debug)]
pub struct Transaction<'c> {
    client: &'c Client,
    kind: ResourceKind,
    name: String,
    state: TransactionState,
    /// The object exists on the server already, so staging may start without `create`.
    existing: bool,
}

impl Client {
    /// Begin creating a new object. Call [`Transaction::create`] first.
    pub fn new_transaction(&self, kind: ResourceKind, name: &str) -> Result<Transaction<'_>> {
        Transaction::open(self, kind, name, false)
    }

    /// Begin updating an object HAProxy already knows.
    pub fn update_transaction(&self, kind: ResourceKind, name: &str) -> Result<Transaction<'_>> {
        Transaction::open(self, kind, name, true)
    }
}

impl<'c> Transaction<'c> {
    fn open(client: &'c Client, kind: ResourceKind, name: &str, existing: bool) -> Result<Self> {
        if !matches!(
            kind,
            ResourceKind::SslCert | ResourceKind::CaFile | ResourceKind::CrlFile
        ) {
            return Err(Error::validation(format!(
                "{} updates are not transactional",
                kind
            )));
        }
        Ok(Self {
            client,
            kind,
            name: checked_name("object name", name)?.to_owned(),
            state: TransactionState::Absent,
            existing,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    fn store(&self) -> &'static str {
        // `open` only admits SSL storage kinds.
        self.kind.ssl_store().unwrap_or("cert")
    }

    /// Check that `phase` may follow the current state.
    fn check(&self, phase: Phase) -> Result<()> {
        use TransactionState::*;

        let allowed = match (phase, self.state) {
            (Phase::Create, Absent) => !self.existing,
            (Phase::Stage, Empty | Staged) => true,
            (Phase::Stage, Absent) => self.existing,
            (Phase::Commit | Phase::Abort, Staged) => true,
            _ => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "cannot {} {} {:?} in state {:?}",
                phase, self.kind, self.name, self.state
            )))
        }
    }

    /// `new ssl <store> <name>`: Absent -> Empty.
    pub async fn create(&mut self) -> Result<()> {
        self.check(Phase::Create)?;
        let command = commands::new_ssl(self.store(), &self.name);
        self.client.confirm(self.kind, Phase::Create, command).await?;
        self.state = TransactionState::Empty;
        Ok(())
    }

    /// `set ssl <store> <name> <<`: stage a replacement payload.
    pub async fn set(&mut self, payload: &str) -> Result<()> {
        self.check(Phase::Stage)?;
        let payload = checked_payload("payload", payload)?;
        let command = commands::set_ssl(self.store(), &self.name, &payload);
        self.client.confirm(self.kind, Phase::Stage, command).await?;
        self.state = TransactionState::Staged;
        Ok(())
    }

    /// `add ssl ca-file <name> <<`: append certificates to the staged CA file.
    pub async fn add(&mut self, payload: &str) -> Result<()> {
        if self.kind != ResourceKind::CaFile {
            return Err(Error::validation(format!(
                "incremental add is only supported for CA files, not {}",
                self.kind
            )));
        }
        self.check(Phase::Stage)?;
        let payload = checked_payload("payload", payload)?;
        let command = commands::add_ssl(self.store(), &self.name, &payload);
        self.client.confirm(self.kind, Phase::Stage, command).await?;
        self.state = TransactionState::Staged;
        Ok(())
    }

    /// `commit ssl <store> <name>`.
    ///
    /// On failure the transaction stays staged on the server; the caller decides whether to
    /// [`abort`](Transaction::abort).
    pub async fn commit(&mut self) -> Result<()> {
        self.check(Phase::Commit)?;
        let command = commands::commit_ssl(self.store(), &self.name);
        self.client.confirm(self.kind, Phase::Commit, command).await?;
        info!(kind = %self.kind, name = %self.name, "transaction committed");
        self.state = TransactionState::Committed;
        Ok(())
    }

    /// `abort ssl <store> <name>`: discard the staged payload.
    pub async fn abort(&mut self) -> Result<()> {
        self.check(Phase::Abort)?;
        let command = commands::abort_ssl(self.store(), &self.name);
        self.client.confirm(self.kind, Phase::Abort, command).await?;
        info!(kind = %self.kind, name = %self.name, "transaction aborted");
        self.state = TransactionState::Absent;
        Ok(())
    }
}

/// A prepared version of a map or ACL.
#[derive(Debug)]
pub struct VersionedTransaction<'c> {
    client: &'c Client,
    kind: ResourceKind,
    id: PatternRef,
    version: u64,
}

impl<'c> VersionedTransaction<'c> {
    /// `prepare map|acl <id>`: allocate a new, empty version.
    pub(crate) async fn prepare(
        client: &'c Client,
        kind: ResourceKind,
        id: PatternRef,
    ) -> Result<VersionedTransaction<'c>> {
        let command = match kind {
            ResourceKind::Map => commands::prepare_map(&id),
            ResourceKind::Acl => commands::prepare_acl(&id),
            other => {
                return Err(Error::validation(format!(
                    "{} has no versioned updates",
                    other
                )))
            }
        };
        let text = command.text().to_owned();
        let response = client.confirm(kind, Phase::Create, command).await?;
        let version = parse_version(&response).map_err(|err| err.with_command(&text))?;
        debug!(%kind, %id, version, "prepared version");

        Ok(Self {
            client,
            kind,
            id,
            version,
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Add entries to the prepared version, one per payload line.
    pub async fn add(&mut self, payload: &str) -> Result<()> {
        let payload = checked_payload("entries", payload)?;
        let command = match self.kind {
            ResourceKind::Map => commands::add_map_versioned(self.version, &self.id, &payload),
            _ => commands::add_acl_versioned(self.version, &self.id, &payload),
        };
        self.client
            .confirm(self.kind, Phase::Stage, command)
            .await
            .map(drop)
    }

    /// Make the prepared version current.
    pub async fn commit(self) -> Result<()> {
        let command = match self.kind {
            ResourceKind::Map => commands::commit_map(self.version, &self.id),
            _ => commands::commit_acl(self.version, &self.id),
        };
        self.client.confirm(self.kind, Phase::Commit, command).await?;
        info!(kind = %self.kind, id = %self.id, version = self.version, "version committed");
        Ok(())
    }
}

/// Version number from `New version created: 3`.
fn parse_version(response: &str) -> Result<u64> {
    let line = response
        .lines()
        .find(|line| line.contains("New version created:"))
        .unwrap_or(response);
    let (_, number) = line
        .rsplit_once(':')
        .ok_or_else(|| Error::parse("missing version number", line))?;
    number
        .trim()
        .parse()
        .map_err(|_| Error::parse("invalid version number", line))
}
