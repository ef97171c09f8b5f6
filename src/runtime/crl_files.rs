//! Certificate revocation lists.

use chrono::{DateTime, Utc};

use crate::classifier::ResourceKind;
use crate::client::Client;
use crate::commands;
use crate::errors::{Error, Result};
use crate::parsers::{self, KeyValueRecord};
use crate::requests::checked_name;

use super::certs::{parse_stored_files, StoredFile};
use super::not_found;

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RevokedCertificate {
    pub serial: String,
    pub revocation_date: DateTime<Utc>,
}

/// One `Certificate Revocation List #N:` section of a CRL file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CrlRecord {
    pub filename: String,
    pub status: Option<String>,
    pub index: u32,
    pub version: Option<u32>,
    pub signature_algorithm: Option<String>,
    pub issuer: String,
    pub last_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    pub revoked: Vec<RevokedCertificate>,
}

const HEADER: &str = "Certificate Revocation List #";

#[derive(Default)]
struct CrlBuilder {
    filename: String,
    status: Option<String>,
    index: u32,
    version: Option<u32>,
    signature_algorithm: Option<String>,
    issuer: String,
    last_update: Option<DateTime<Utc>>,
    next_update: Option<DateTime<Utc>>,
    revoked: Vec<(String, Option<DateTime<Utc>>)>,
}

impl KeyValueRecord for CrlBuilder {
    fn start(previous: Option<&Self>) -> Self {
        CrlBuilder {
            filename: previous.map(|p| p.filename.clone()).unwrap_or_default(),
            status: previous.and_then(|p| p.status.clone()),
            ..CrlBuilder::default()
        }
    }

    fn is_record_header(key: &str) -> bool {
        key.starts_with(HEADER)
    }

    fn apply(&mut self, key: &str, value: &str, line: &str) -> Result<()> {
        if let Some(index) = key.strip_prefix(HEADER) {
            self.index = parsers::number(index, "CRL index", line)?;
            return Ok(());
        }
        // `Version 1` carries no colon.
        if let Some(version) = key.strip_prefix("Version ") {
            self.version = version.trim().parse().ok();
            return Ok(());
        }

        match key {
            "Filename" => self.filename = value.to_owned(),
            "Status" => self.status = Some(value.to_owned()),
            "Signature Algorithm" => self.signature_algorithm = Some(value.to_owned()),
            "Issuer" => self.issuer = value.to_owned(),
            "Last Update" => self.last_update = Some(parsers::openssl_date(value, line)?),
            "Next Update" => self.next_update = Some(parsers::openssl_date(value, line)?),
            "Serial Number" => self
                .revoked
                .push((parsers::required(value, "serial number", line)?.to_owned(), None)),
            "Revocation Date" => {
                let date = parsers::openssl_date(value, line)?;
                match self.revoked.last_mut() {
                    Some((_, slot)) if slot.is_none() => *slot = Some(date),
                    _ => return Err(Error::parse("revocation date without serial number", line)),
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        if self.index == 0 {
            return Ok(());
        }
        self.build().map(drop)
    }
}

impl CrlBuilder {
    fn build(&self) -> Result<CrlRecord> {
        let context = format!("{} {}{}", self.filename, HEADER, self.index);
        let revoked = self
            .revoked
            .iter()
            .map(|(serial, date)| {
                let revocation_date = date.ok_or_else(|| {
                    Error::parse(format!("missing revocation date for serial {}", serial), &context)
                })?;
                Ok(RevokedCertificate {
                    serial: serial.clone(),
                    revocation_date,
                })
            })
            .collect::<Result<_>>()?;

        Ok(CrlRecord {
            filename: self.filename.clone(),
            status: self.status.clone(),
            index: self.index,
            version: self.version,
            signature_algorithm: self.signature_algorithm.clone(),
            issuer: self.issuer.clone(),
            last_update: self
                .last_update
                .ok_or_else(|| Error::parse("missing Last Update", &context))?,
            next_update: self.next_update,
            revoked,
        })
    }
}

fn parse_crl_file(text: &str) -> Result<Vec<CrlRecord>> {
    parsers::parse_key_value::<CrlBuilder>(text)?
        .iter()
        .filter(|builder| builder.index != 0)
        .map(CrlBuilder::build)
        .collect()
}

impl Client {
    pub async fn crl_files(&self) -> Result<Vec<StoredFile>> {
        self.fetch(commands::show_ssl("crl-file"), |text| Ok(parse_stored_files(text)))
            .await
    }

    /// The revocation lists of one CRL file, in file order.
    pub async fn crl_file(&self, name: &str) -> Result<Vec<CrlRecord>> {
        let name = checked_name("CRL file", name)?;
        self.fetch(commands::show_ssl_entry("crl-file", name), parse_crl_file)
            .await
            .map_err(|err| not_found(err, &format!("CRL file {}", name)))
    }

    pub async fn delete_crl_file(&self, name: &str) -> Result<()> {
        self.delete_stored(ResourceKind::CrlFile, name).await
    }
}
