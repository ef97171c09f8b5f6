//! Stick tables.

use crate::client::Client;
use crate::commands;
use crate::errors::Result;
use crate::parsers;
use crate::requests::{checked_name, checked_value};

use super::not_found;

/// A table header: `# table: front_pub, type: ip, size:204800, used:171`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StickTable {
    pub name: String,
    pub key_type: String,
    pub size: u64,
    pub used: u64,
}

impl StickTable {
    fn parse(line: &str) -> Option<Self> {
        let body = line.trim().strip_prefix('#')?;
        let mut table = StickTable {
            name: String::new(),
            key_type: String::new(),
            size: 0,
            used: 0,
        };
        for part in body.split(',') {
            let (key, value) = parsers::split_key_value(part);
            match key {
                "table" => table.name = value.to_owned(),
                "type" => table.key_type = value.to_owned(),
                "size" => table.size = value.parse().ok()?,
                "used" => table.used = value.parse().ok()?,
                _ => {}
            }
        }
        (!table.name.is_empty()).then_some(table)
    }
}

/// One stored data column such as `gpc0=3` or `conn_rate(10000)=1`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StickData {
    pub name: String,
    /// Averaging period in milliseconds for rate counters.
    pub period: Option<u64>,
    pub value: String,
}

/// One entry: `0x55a8a9d4b6e0: key=127.0.0.1 use=0 exp=3598740 gpc0=0`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StickEntry {
    pub address: u64,
    pub key: String,
    pub use_count: u32,
    /// Milliseconds until expiry; `None` for entries that never expire.
    pub expires_ms: Option<u64>,
    pub data: Vec<StickData>,
}

impl StickEntry {
    fn parse(line: &str) -> Option<Self> {
        let (address, rest) = line.trim().split_once(": ")?;
        let address = u64::from_str_radix(address.strip_prefix("0x")?, 16).ok()?;

        let mut entry = StickEntry {
            address,
            key: String::new(),
            use_count: 0,
            expires_ms: None,
            data: Vec::new(),
        };
        for assignment in rest.split_whitespace() {
            let (name, value) = assignment.split_once('=')?;
            match name {
                "key" => entry.key = value.to_owned(),
                "use" => entry.use_count = value.parse().ok()?,
                "exp" => entry.expires_ms = value.parse().ok(),
                // Shard placement is an implementation detail of the table.
                "shard" => {}
                column => {
                    let (name, period) = match column.split_once('(') {
                        Some((name, period)) => (name, period.strip_suffix(')')?.parse().ok()),
                        None => (column, None),
                    };
                    entry.data.push(StickData {
                        name: name.to_owned(),
                        period,
                        value: value.to_owned(),
                    });
                }
            }
        }
        Some(entry)
    }
}

impl Client {
    pub async fn stick_tables(&self) -> Result<Vec<StickTable>> {
        self.fetch(commands::show_tables(), |text| {
            Ok(text.lines().filter_map(StickTable::parse).collect())
        })
        .await
    }

    /// Entries of `table`, optionally narrowed by a filter such as `data.gpc0 gt 0` or
    /// `key 10.0.0.1`.
    pub async fn stick_table_entries(
        &self,
        table: &str,
        filter: Option<&str>,
    ) -> Result<Vec<StickEntry>> {
        let table = checked_name("table", table)?;
        let filter = filter.map(|f| checked_value("table filter", f)).transpose()?;
        self.fetch(commands::show_table_entries(table, filter), |text| {
            Ok(parsers::parse_lines(text, StickEntry::parse))
        })
        .await
        .map_err(|err| not_found(err, &format!("table {}", table)))
    }
}
