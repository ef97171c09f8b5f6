//! Map listings, lookups, and updates.

use crate::classifier::ResourceKind;
use crate::client::Client;
use crate::commands;
use crate::errors::{Error, Result};
use crate::parsers;
use crate::requests::{checked_payload, checked_value, MapId};
use crate::transaction::VersionedTransaction;

use super::not_found;
use super::patterns::{PatternEntry, PatternFile};

/// Answer to `get map` for a key that was found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MapMatch {
    pub key: String,
    pub value: String,
}

/// Parse `type=str, case=sensitive, found=yes, idx=tree, key="example.com", value="be_web"`.
fn parse_match(text: &str) -> Result<Option<MapMatch>> {
    let line = parsers::data_lines(text).next().unwrap_or("");
    let pairs = parsers::assignments(line);
    let field = |name: &str| pairs.iter().find(|(key, _)| *key == name).map(|(_, v)| *v);

    match field("found").or_else(|| field("match")) {
        Some("yes") => {}
        Some(_) => return Ok(None),
        None => return Err(Error::parse("missing found field", line)),
    }
    Ok(Some(MapMatch {
        key: parsers::required(field("key").unwrap_or(""), "key", line)?.to_owned(),
        value: field("value").unwrap_or_default().to_owned(),
    }))
}

impl Client {
    pub async fn maps(&self) -> Result<Vec<PatternFile>> {
        self.fetch(commands::show_map(), |text| {
            Ok(parsers::parse_lines(text, |line| line.parse().ok()))
        })
        .await
    }

    pub async fn map_entries(&self, id: &MapId) -> Result<Vec<PatternEntry>> {
        self.fetch(commands::show_map_entries(id), |text| {
            Ok(parsers::parse_lines(text, |line| line.parse().ok()))
        })
        .await
        .map_err(|err| not_found(err, &format!("map {}", id)))
    }

    /// Look `key` up in map `id`. A key with no entry is [`Error::NotFound`].
    pub async fn get_map(&self, id: &MapId, key: &str) -> Result<MapMatch> {
        let key = checked_value("map key", key)?;
        let command = commands::get_map(id, key);
        let text = command.text().to_owned();
        let response = self
            .query(command)
            .await
            .map_err(|err| not_found(err, &format!("map {}", id)))?;

        match parse_match(&response).map_err(|err| err.with_command(&text))? {
            Some(found) => Ok(found),
            None => Err(Error::NotFound {
                command: text,
                what: format!("key {:?} in map {}", key, id),
                response,
            }),
        }
    }

    pub async fn add_map(&self, id: &MapId, key: &str, value: &str) -> Result<()> {
        let key = checked_value("map key", key)?;
        let value = checked_value("map value", value)?;
        self.query(commands::add_map(id, key, value)).await.map(drop)
    }

    /// Add several `key value` lines in one command.
    pub async fn add_map_entries(&self, id: &MapId, payload: &str) -> Result<()> {
        let payload = checked_payload("map entries", payload)?;
        self.query(commands::add_map_payload(id, &payload)).await.map(drop)
    }

    pub async fn set_map(&self, id: &MapId, key: &str, value: &str) -> Result<()> {
        let key = checked_value("map key", key)?;
        let value = checked_value("map value", value)?;
        self.query(commands::set_map(id, key, value))
            .await
            .map(drop)
            .map_err(|err| not_found(err, &format!("key {:?} in map {}", key, id)))
    }

    pub async fn del_map(&self, id: &MapId, key: &str) -> Result<()> {
        let key = checked_value("map key", key)?;
        self.query(commands::del_map(id, key)).await.map(drop)
    }

    pub async fn clear_map(&self, id: &MapId) -> Result<()> {
        self.query(commands::clear_map(id)).await.map(drop)
    }

    /// Start an atomic replacement of map `id`'s contents.
    ///
    /// ```no_run
    /// # async fn demo(client: hapctl::Client) -> hapctl::Result<()> {
    /// let mut version = client.prepare_map(&hapctl::PatternRef::file("/etc/haproxy/hosts.map")?).await?;
    /// version.add("example.com be_web\nexample.org be_api\n").await?;
    /// version.commit().await?;
    /// # Ok(()) }
    /// ```
    pub async fn prepare_map(&self, id: &MapId) -> Result<VersionedTransaction<'_>> {
        VersionedTransaction::prepare(self, ResourceKind::Map, id.clone()).await
    }
}
