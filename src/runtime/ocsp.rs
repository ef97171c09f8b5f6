//! Stapled OCSP responses.

use chrono::{DateTime, Utc};

use crate::classifier::{Phase, ResourceKind};
use crate::client::Client;
use crate::commands;
use crate::errors::{Error, Result};
use crate::parsers::{self, KeyValueRecord};
use crate::requests::{checked_name, checked_payload};

use super::not_found;

/// A certificate with a stapled response, from `show ssl ocsp-response`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct OcspCertificate {
    /// Hex certificate ID used to address the response.
    pub id: String,
    pub path: String,
}

impl OcspCertificate {
    /// Parse `- <id> : <path>`.
    fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix('-')?;
        let (id, path) = rest.split_once(" : ")?;
        let (id, path) = (id.trim(), path.trim());
        if id.is_empty() || path.is_empty() {
            return None;
        }
        Some(Self {
            id: id.to_owned(),
            path: path.to_owned(),
        })
    }
}

/// Decoded OCSP response for one certificate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OcspResponse {
    pub responder_id: Option<String>,
    pub produced_at: DateTime<Utc>,
    pub hash_algorithm: Option<String>,
    pub issuer_name_hash: Option<String>,
    pub issuer_key_hash: Option<String>,
    pub serial_number: Option<String>,
    pub cert_status: String,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct OcspBuilder {
    responder_id: Option<String>,
    produced_at: Option<DateTime<Utc>>,
    hash_algorithm: Option<String>,
    issuer_name_hash: Option<String>,
    issuer_key_hash: Option<String>,
    serial_number: Option<String>,
    cert_status: Option<String>,
    this_update: Option<DateTime<Utc>>,
    next_update: Option<DateTime<Utc>>,
}

impl KeyValueRecord for OcspBuilder {
    fn start(_previous: Option<&Self>) -> Self {
        OcspBuilder::default()
    }

    fn apply(&mut self, key: &str, value: &str, line: &str) -> Result<()> {
        let text = || Some(value.to_owned());
        match key {
            "Responder Id" => self.responder_id = text(),
            "Produced At" => self.produced_at = Some(parsers::openssl_date(value, line)?),
            "Hash Algorithm" => self.hash_algorithm = text(),
            "Issuer Name Hash" => self.issuer_name_hash = text(),
            "Issuer Key Hash" => self.issuer_key_hash = text(),
            "Serial Number" => self.serial_number = text(),
            "Cert Status" => self.cert_status = text(),
            "This Update" => self.this_update = Some(parsers::openssl_date(value, line)?),
            "Next Update" => self.next_update = Some(parsers::openssl_date(value, line)?),
            _ => {}
        }
        Ok(())
    }
}

impl OcspBuilder {
    fn build(self) -> Result<OcspResponse> {
        let missing = |field: &str| Error::parse(format!("missing {}", field), "");
        Ok(OcspResponse {
            produced_at: self.produced_at.ok_or_else(|| missing("Produced At"))?,
            this_update: self.this_update.ok_or_else(|| missing("This Update"))?,
            cert_status: self.cert_status.ok_or_else(|| missing("Cert Status"))?,
            responder_id: self.responder_id,
            hash_algorithm: self.hash_algorithm,
            issuer_name_hash: self.issuer_name_hash,
            issuer_key_hash: self.issuer_key_hash,
            serial_number: self.serial_number,
            next_update: self.next_update,
        })
    }
}

fn parse_ocsp_response(text: &str) -> Result<OcspResponse> {
    parsers::parse_key_value::<OcspBuilder>(text)?
        .pop()
        .ok_or_else(|| Error::parse("empty OCSP response", ""))?
        .build()
}

impl Client {
    pub async fn ocsp_responses(&self) -> Result<Vec<OcspCertificate>> {
        self.fetch(commands::show_ocsp_responses(), |text| {
            Ok(parsers::parse_lines(text, OcspCertificate::parse))
        })
        .await
    }

    pub async fn ocsp_response(&self, id: &str) -> Result<OcspResponse> {
        let id = checked_name("OCSP certificate ID", id)?;
        self.fetch(commands::show_ocsp_response(id), parse_ocsp_response)
            .await
            .map_err(|err| not_found(err, &format!("OCSP response {}", id)))
    }

    /// Replace a stapled response with a base64-encoded DER response.
    pub async fn set_ocsp_response(&self, base64: &str) -> Result<()> {
        let base64 = checked_payload("OCSP response", base64)?;
        self.confirm(
            ResourceKind::Ocsp,
            Phase::Stage,
            commands::set_ocsp_response(&base64),
        )
        .await
        .map(drop)
    }

    /// Ask HAProxy to fetch a fresh response for `certificate` from its responder.
    pub async fn update_ocsp_response(&self, certificate: &str) -> Result<()> {
        let certificate = checked_name("certificate", certificate)?;
        self.query(commands::update_ocsp_response(certificate))
            .await
            .map(drop)
    }
}
