//! ACME certificate renewal status.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::client::Client;
use crate::commands;
use crate::errors::{Error, Result};
use crate::parsers::{self, RowDelimiter};
use crate::requests::checked_name;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum AcmeState {
    Running,
    Scheduled,
    Other(String),
}

impl FromStr for AcmeState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "Running" => AcmeState::Running,
            "Scheduled" => AcmeState::Scheduled,
            other => AcmeState::Other(other.to_owned()),
        })
    }
}

/// One row of `acme status`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AcmeCertificate {
    pub certificate: String,
    pub section: String,
    pub state: AcmeState,
    pub expires_at: Option<DateTime<Utc>>,
    pub expires_in: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub scheduled_in: String,
}

const COLUMNS: usize = 7;

/// `-` marks a date HAProxy does not know yet; anything else must be RFC 3339.
fn optional_date(value: &str) -> Result<Option<DateTime<Utc>>> {
    match value.trim() {
        "" | "-" => Ok(None),
        date => parsers::rfc3339_date(date, date).map(Some),
    }
}

fn parse_status(text: &str) -> Result<Vec<AcmeCertificate>> {
    parsers::parse_rows(text, RowDelimiter::Tab, COLUMNS, |row| {
        Ok(AcmeCertificate {
            certificate: parsers::required(row[0], "certificate", row[0])?.to_owned(),
            section: row[1].to_owned(),
            state: row[2].parse()?,
            expires_at: optional_date(row[3])?,
            expires_in: row[4].to_owned(),
            scheduled_at: optional_date(row[5])?,
            scheduled_in: row[6].to_owned(),
        })
    })
}

impl Client {
    pub async fn acme_status(&self) -> Result<Vec<AcmeCertificate>> {
        self.fetch(commands::acme_status(), parse_status).await
    }

    /// Start an immediate renewal of `certificate`.
    pub async fn acme_renew(&self, certificate: &str) -> Result<()> {
        let certificate = checked_name("certificate", certificate)?;
        self.query(commands::acme_renew(certificate)).await.map(drop)
    }
}
