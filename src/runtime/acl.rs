//! ACL listings, lookups, and updates.

use crate::classifier::ResourceKind;
use crate::client::Client;
use crate::commands;
use crate::errors::{Error, Result};
use crate::parsers;
use crate::requests::{checked_value, AclId};
use crate::transaction::VersionedTransaction;

use super::not_found;
use super::patterns::{PatternEntry, PatternFile};

/// Answer to `get acl` for a value that matched.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AclMatch {
    /// The pattern that matched.
    pub value: String,
    pub match_type: String,
    pub case_sensitive: bool,
    pub index: Option<String>,
}

/// Parse `type=ip, case=sensitive, match=yes, idx=tree, pattern="2.178.160.0/20"`.
///
/// `Ok(None)` means HAProxy answered and nothing matched.
fn parse_match(text: &str) -> Result<Option<AclMatch>> {
    let line = parsers::data_lines(text).next().unwrap_or("");
    let pairs = parsers::assignments(line);
    let field = |name: &str| pairs.iter().find(|(key, _)| *key == name).map(|(_, v)| *v);

    match field("match") {
        Some("yes") => {}
        Some(_) => return Ok(None),
        None => return Err(Error::parse("missing match field", line)),
    }
    Ok(Some(AclMatch {
        value: parsers::required(field("pattern").unwrap_or(""), "pattern", line)?.to_owned(),
        match_type: field("type").unwrap_or_default().to_owned(),
        case_sensitive: field("case") != Some("insensitive"),
        index: field("idx").map(str::to_owned),
    }))
}

impl Client {
    /// List the ACLs HAProxy knows.
    pub async fn acls(&self) -> Result<Vec<PatternFile>> {
        self.fetch(commands::show_acl(), |text| {
            Ok(parsers::parse_lines(text, |line| line.parse().ok()))
        })
        .await
    }

    pub async fn acl_entries(&self, id: &AclId) -> Result<Vec<PatternEntry>> {
        self.fetch(commands::show_acl_entries(id), |text| {
            Ok(parsers::parse_lines(text, |line| line.parse().ok()))
        })
        .await
        .map_err(|err| not_found(err, &format!("ACL {}", id)))
    }

    /// Look `value` up in ACL `id`. A value that matches no pattern is [`Error::NotFound`].
    pub async fn get_acl(&self, id: &AclId, value: &str) -> Result<AclMatch> {
        let value = checked_value("ACL value", value)?;
        let command = commands::get_acl(id, value);
        let text = command.text().to_owned();
        let response = self
            .query(command)
            .await
            .map_err(|err| not_found(err, &format!("ACL {}", id)))?;

        match parse_match(&response).map_err(|err| err.with_command(&text))? {
            Some(found) => Ok(found),
            None => Err(Error::NotFound {
                command: text,
                what: format!("{:?} in ACL {}", value, id),
                response,
            }),
        }
    }

    pub async fn add_acl(&self, id: &AclId, value: &str) -> Result<()> {
        let value = checked_value("ACL value", value)?;
        self.query(commands::add_acl(id, value)).await.map(drop)
    }

    pub async fn del_acl(&self, id: &AclId, value: &str) -> Result<()> {
        let value = checked_value("ACL value", value)?;
        self.query(commands::del_acl(id, value)).await.map(drop)
    }

    pub async fn clear_acl(&self, id: &AclId) -> Result<()> {
        self.query(commands::clear_acl(id)).await.map(drop)
    }

    /// Start an atomic replacement of ACL `id`'s contents.
    pub async fn prepare_acl(&self, id: &AclId) -> Result<VersionedTransaction<'_>> {
        VersionedTransaction::prepare(self, ResourceKind::Acl, id.clone()).await
    }
}
