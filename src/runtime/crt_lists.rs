//! crt-lists: per-certificate bind options and SNI filters.

use std::fmt;

use crate::classifier::{Phase, ResourceKind};
use crate::client::Client;
use crate::commands;
use crate::errors::{Error, Result};
use crate::parsers::{self, EntryLine};
use crate::requests::{checked_name, checked_value};

/// One line of a crt-list.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct CrtListEntry {
    pub certificate: String,
    /// Position in the list file, when listed with `-n`.
    pub line_number: Option<u32>,
    /// `[...]` bind options, without the brackets.
    pub ssl_bind_config: Option<String>,
    pub sni_filters: Vec<String>,
}

impl CrtListEntry {
    pub fn new(certificate: impl Into<String>) -> Self {
        Self {
            certificate: certificate.into(),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.ssl_bind_config = Some(config.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.sni_filters.push(filter.into());
        self
    }

    /// `cert[:line]` as accepted by `del ssl crt-list`.
    pub fn reference(&self) -> String {
        match self.line_number {
            Some(line) => format!("{}:{}", self.certificate, line),
            None => self.certificate.clone(),
        }
    }
}

impl From<EntryLine> for CrtListEntry {
    fn from(line: EntryLine) -> Self {
        Self {
            certificate: line.name,
            line_number: line.line_number,
            ssl_bind_config: line.config,
            sni_filters: line.filters,
        }
    }
}

/// Renders the entry as a crt-list line, without the line number.
impl fmt::Display for CrtListEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.certificate)?;
        if let Some(config) = &self.ssl_bind_config {
            write!(f, " [{}]", config)?;
        }
        for filter in &self.sni_filters {
            write!(f, " {}", filter)?;
        }
        Ok(())
    }
}

impl Client {
    /// Paths of the loaded crt-list files.
    pub async fn crt_lists(&self) -> Result<Vec<String>> {
        self.fetch(commands::show_crt_lists(), |text| {
            Ok(parsers::parse_lines(text, |line| {
                parsers::fields(line).first().map(|path| path.to_string())
            }))
        })
        .await
    }

    pub async fn crt_list_entries(&self, list: &str) -> Result<Vec<CrtListEntry>> {
        let list = checked_name("crt-list", list)?;
        self.fetch(commands::show_crt_list_entries(list), |text| {
            Ok(parsers::parse_lines(text, |line| {
                EntryLine::parse(line).ok().map(CrtListEntry::from)
            }))
        })
        .await
    }

    /// Append `entry` to `list`. The certificate must already be loaded.
    pub async fn add_crt_list_entry(&self, list: &str, entry: &CrtListEntry) -> Result<()> {
        let list = checked_name("crt-list", list)?;
        checked_name("certificate", &entry.certificate)?;
        if entry.sni_filters.iter().any(|filter| filter.contains(char::is_whitespace)) {
            return Err(Error::validation("SNI filters must not contain whitespace"));
        }
        let line = entry.to_string();
        let line = checked_value("crt-list entry", &line)?;
        self.confirm(
            ResourceKind::CrtList,
            Phase::Stage,
            commands::add_crt_list_entry(list, line),
        )
        .await
        .map(drop)
    }

    /// Remove the entry named `entry` (`cert` or `cert:line`) from `list`.
    pub async fn del_crt_list_entry(&self, list: &str, entry: &str) -> Result<()> {
        let list = checked_name("crt-list", list)?;
        let entry = checked_name("crt-list entry", entry)?;
        self.confirm(
            ResourceKind::CrtList,
            Phase::Delete,
            commands::del_crt_list_entry(list, entry),
        )
        .await
        .map(drop)
    }
}
