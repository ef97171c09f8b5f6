//! SSL certificates in HAProxy's certificate storage.

use chrono::{DateTime, Utc};

use crate::classifier::ResourceKind;
use crate::client::Client;
use crate::commands;
use crate::errors::{Error, Result};
use crate::parsers::{self, KeyValueRecord};
use crate::requests::checked_name;

use super::{file_name, not_found};

/// One entry of a `show ssl cert|ca-file|crl-file` listing.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StoredFile {
    pub path: String,
    /// Final path segment.
    pub description: String,
    /// Listed under `# transaction`, i.e. an uncommitted version exists.
    pub in_transaction: bool,
    /// Certificate count for CA files (`<path> - 2 certificate(s)`).
    pub entries: Option<u32>,
}

impl StoredFile {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (line, in_transaction) = match line.strip_prefix('*') {
            Some(rest) => (rest, true),
            None => (line, false),
        };

        let (path, entries) = match line.split_once(" - ") {
            Some((path, count)) => (path.trim(), count.split_whitespace().next()?.parse().ok()),
            None => (line, None),
        };
        if path.is_empty() || path.contains(char::is_whitespace) {
            return None;
        }

        Some(StoredFile {
            path: path.to_owned(),
            description: file_name(path).to_owned(),
            in_transaction,
            entries,
        })
    }
}

pub(crate) fn parse_stored_files(text: &str) -> Vec<StoredFile> {
    parsers::parse_lines(text, StoredFile::parse)
}

/// X.509 fields printed for certificates and for each certificate of a CA file.
#[derive(Clone, Debug, Default)]
pub(crate) struct X509Fields {
    serial: Option<String>,
    not_before: Option<DateTime<Utc>>,
    not_after: Option<DateTime<Utc>>,
    subject: Option<String>,
    issuer: Option<String>,
    algorithm: Option<String>,
    sha1_fingerprint: Option<String>,
    subject_alt_names: Vec<String>,
}

/// The strict subset of [`X509Fields`].
pub(crate) struct X509Required {
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl X509Fields {
    /// Fold one line; `Ok(false)` when `key` is not an X.509 field.
    pub(crate) fn apply(&mut self, key: &str, value: &str, line: &str) -> Result<bool> {
        match key {
            "Serial" => self.serial = Some(parsers::required(value, "serial", line)?.to_owned()),
            "notBefore" => self.not_before = Some(parsers::openssl_date(value, line)?),
            "notAfter" => self.not_after = Some(parsers::openssl_date(value, line)?),
            "Subject" => self.subject = Some(value.to_owned()),
            "Issuer" => self.issuer = Some(value.to_owned()),
            "Algorithm" => self.algorithm = Some(value.to_owned()),
            "SHA1 FingerPrint" => self.sha1_fingerprint = Some(value.to_owned()),
            "Subject Alternative Name" => {
                self.subject_alt_names = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(|name| name.strip_prefix("DNS:").unwrap_or(name).to_owned())
                    .collect()
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Serial and validity dates; `context` names the record in the error.
    pub(crate) fn required(&self, context: &str) -> Result<X509Required> {
        Ok(X509Required {
            serial: self
                .serial
                .clone()
                .ok_or_else(|| Error::parse("missing serial", context))?,
            not_before: self
                .not_before
                .ok_or_else(|| Error::parse("missing notBefore", context))?,
            not_after: self
                .not_after
                .ok_or_else(|| Error::parse("missing notAfter", context))?,
        })
    }

    pub(crate) fn subject(&self) -> String {
        self.subject.clone().unwrap_or_default()
    }

    pub(crate) fn issuer(&self) -> String {
        self.issuer.clone().unwrap_or_default()
    }

    pub(crate) fn algorithm(&self) -> Option<String> {
        self.algorithm.clone()
    }

    pub(crate) fn sha1_fingerprint(&self) -> Option<String> {
        self.sha1_fingerprint.clone()
    }

    pub(crate) fn subject_alt_names(&self) -> Vec<String> {
        self.subject_alt_names.clone()
    }
}

/// `show ssl cert <name>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateDetail {
    pub filename: String,
    pub status: Option<String>,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub subject: String,
    pub issuer: String,
    pub algorithm: Option<String>,
    pub sha1_fingerprint: Option<String>,
    pub subject_alt_names: Vec<String>,
    pub chain_subjects: Vec<String>,
    pub chain_issuers: Vec<String>,
    pub ocsp_response_key: Option<String>,
}

#[derive(Default)]
struct CertificateRecord {
    filename: String,
    status: Option<String>,
    x509: X509Fields,
    chain_subjects: Vec<String>,
    chain_issuers: Vec<String>,
    ocsp_response_key: Option<String>,
}

impl KeyValueRecord for CertificateRecord {
    fn start(_previous: Option<&Self>) -> Self {
        CertificateRecord::default()
    }

    fn apply(&mut self, key: &str, value: &str, line: &str) -> Result<()> {
        if self.x509.apply(key, value, line)? {
            return Ok(());
        }
        match key {
            "Filename" => self.filename = value.to_owned(),
            "Status" => self.status = Some(value.to_owned()),
            "Chain Subject" => self.chain_subjects.push(value.to_owned()),
            "Chain Issuer" => self.chain_issuers.push(value.to_owned()),
            "OCSP Response Key" => self.ocsp_response_key = Some(value.to_owned()),
            _ => {}
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.x509.required(&self.filename).map(drop)
    }
}

impl CertificateRecord {
    fn into_detail(self) -> Result<CertificateDetail> {
        let required = self.x509.required(&self.filename)?;
        Ok(CertificateDetail {
            serial: required.serial,
            not_before: required.not_before,
            not_after: required.not_after,
            subject: self.x509.subject(),
            issuer: self.x509.issuer(),
            algorithm: self.x509.algorithm(),
            sha1_fingerprint: self.x509.sha1_fingerprint(),
            subject_alt_names: self.x509.subject_alt_names(),
            filename: self.filename,
            status: self.status,
            chain_subjects: self.chain_subjects,
            chain_issuers: self.chain_issuers,
            ocsp_response_key: self.ocsp_response_key,
        })
    }
}

fn parse_certificate(text: &str) -> Result<CertificateDetail> {
    parsers::parse_key_value::<CertificateRecord>(text)?
        .pop()
        .ok_or_else(|| Error::parse("empty certificate detail", ""))?
        .into_detail()
}

impl Client {
    /// List certificates, including uncommitted ones (flagged `in_transaction`).
    pub async fn certificates(&self) -> Result<Vec<StoredFile>> {
        self.fetch(commands::show_ssl("cert"), |text| Ok(parse_stored_files(text)))
            .await
    }

    pub async fn certificate(&self, name: &str) -> Result<CertificateDetail> {
        let name = checked_name("certificate", name)?;
        self.fetch(commands::show_ssl_entry("cert", name), parse_certificate)
            .await
            .map_err(|err| not_found(err, &format!("certificate {}", name)))
    }

    /// Remove an unused certificate from storage.
    pub async fn delete_certificate(&self, name: &str) -> Result<()> {
        self.delete_stored(ResourceKind::SslCert, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scripted_client;
    use chrono::TimeZone;

    const DETAIL: &str = "\
Filename: /etc/ssl/cert.pem
Status: Used
Serial: 0D933C1B1089BF660AE5253A245BB388
notBefore: Sep  9 12:00:00 2020 GMT
notAfter: Sep 14 12:00:00 2021 GMT
Subject Alternative Name: DNS:*.example.com, DNS:example.com
Algorithm: RSA4096
SHA1 FingerPrint: 9A1D2D11A2A0D5D1F7C4C1A2
Subject: /C=FR/O=Example/CN=*.example.com
Issuer: /C=US/O=DigiCert Inc/CN=DigiCert TLS RSA SHA256 2020 CA1
Chain Subject: /C=US/O=DigiCert Inc/CN=DigiCert TLS RSA SHA256 2020 CA1
Chain Issuer: /C=US/O=DigiCert Inc/OU=www.digicert.com/CN=DigiCert Global Root CA
";

    #[tokio::test]
    async fn listing_yields_one_record_per_path() {
        let (client, transport) = scripted_client();
        transport.respond(
            "show ssl cert",
            "/etc/ssl/cert-0.pem\n/etc/ssl/cert-1.pem\n/etc/ssl/cert-2.pem",
        );
        let certs = client.certificates().await.unwrap();
        assert_eq!(certs.len(), 3);
        for (index, cert) in certs.iter().enumerate() {
            assert_eq!(cert.description, format!("cert-{}.pem", index));
            assert!(!cert.in_transaction);
        }
    }

    #[test]
    fn listing_flags_transactions() {
        let files = parse_stored_files("# transaction\n*/etc/ssl/new.pem\n# filename\n/etc/ssl/a.pem\n");
        assert_eq!(files.len(), 2);
        assert!(files[0].in_transaction);
        assert_eq!(files[0].path, "/etc/ssl/new.pem");
        assert!(!files[1].in_transaction);
    }

    #[test]
    fn detail_fields() {
        let detail = parse_certificate(DETAIL).unwrap();
        assert_eq!(detail.filename, "/etc/ssl/cert.pem");
        assert_eq!(detail.serial, "0D933C1B1089BF660AE5253A245BB388");
        assert_eq!(detail.not_before, Utc.with_ymd_and_hms(2020, 9, 9, 12, 0, 0).unwrap());
        assert_eq!(detail.not_after, Utc.with_ymd_and_hms(2021, 9, 14, 12, 0, 0).unwrap());
        assert_eq!(detail.subject_alt_names, vec!["*.example.com", "example.com"]);
        assert_eq!(detail.chain_subjects.len(), 1);
        assert_eq!(detail.algorithm.as_deref(), Some("RSA4096"));
    }

    #[test]
    fn detail_with_bad_date_fails_with_line() {
        let text = DETAIL.replace("Sep 14 12:00:00 2021 GMT", "sometime");
        match parse_certificate(&text).unwrap_err() {
            Error::Parse { line, .. } => assert_eq!(line, "notAfter: sometime"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn detail_without_serial_fails() {
        let text: String = DETAIL
            .lines()
            .filter(|line| !line.starts_with("Serial"))
            .map(|line| format!("{}\n", line))
            .collect();
        assert!(parse_certificate(&text).is_err());
    }

    #[tokio::test]
    async fn parse_errors_carry_command() {
        let (client, transport) = scripted_client();
        transport.respond("show ssl cert a.pem", "Filename: a.pem\nStatus: Unused\n");
        let err = client.certificate("a.pem").await.unwrap_err();
        assert_eq!(err.command(), Some("show ssl cert a.pem"));
    }

    #[tokio::test]
    async fn delete_checks_literal() {
        let (client, transport) = scripted_client();
        transport.respond("del ssl cert a.pem", "Certificate 'a.pem' deleted!");
        transport.respond(
            "del ssl cert b.pem",
            "[3]: Can't remove the certificate: certificate 'b.pem' in use, can't be deleted!",
        );
        client.delete_certificate("a.pem").await.unwrap();
        assert!(client.delete_certificate("b.pem").await.is_err());
        assert!(matches!(client.delete_certificate("").await, Err(Error::Validation(_))));
    }
}
