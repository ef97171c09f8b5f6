//! CA files: bundles of trusted certificates used for client and server verification.

use chrono::{DateTime, Utc};

use crate::classifier::ResourceKind;
use crate::client::Client;
use crate::commands;
use crate::errors::Result;
use crate::parsers::{self, KeyValueRecord};
use crate::requests::checked_name;

use super::certs::{parse_stored_files, StoredFile, X509Fields};
use super::not_found;

/// One certificate of a CA file, as printed under `Certificate #N:`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaCertificate {
    pub filename: String,
    pub status: Option<String>,
    pub index: u32,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub subject: String,
    pub issuer: String,
    pub algorithm: Option<String>,
    pub sha1_fingerprint: Option<String>,
    pub subject_alt_names: Vec<String>,
}

#[derive(Default)]
struct CaRecord {
    filename: String,
    status: Option<String>,
    index: u32,
    x509: X509Fields,
}

const HEADER: &str = "Certificate #";

impl KeyValueRecord for CaRecord {
    fn start(previous: Option<&Self>) -> Self {
        CaRecord {
            filename: previous.map(|p| p.filename.clone()).unwrap_or_default(),
            status: previous.and_then(|p| p.status.clone()),
            ..CaRecord::default()
        }
    }

    fn is_record_header(key: &str) -> bool {
        key.starts_with(HEADER)
    }

    fn apply(&mut self, key: &str, value: &str, line: &str) -> Result<()> {
        if let Some(index) = key.strip_prefix(HEADER) {
            self.index = parsers::number(index, "certificate index", line)?;
            return Ok(());
        }
        if self.x509.apply(key, value, line)? {
            return Ok(());
        }
        match key {
            "Filename" => self.filename = value.to_owned(),
            "Status" => self.status = Some(value.to_owned()),
            _ => {}
        }
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        // Index 0 is a detail without any `Certificate #N` section: an empty CA file.
        if self.index == 0 {
            return Ok(());
        }
        self.x509.required(&self.context()).map(drop)
    }
}

impl CaRecord {
    fn context(&self) -> String {
        format!("{} {}{}", self.filename, HEADER, self.index)
    }

    fn into_certificate(self) -> Result<CaCertificate> {
        let required = self.x509.required(&self.context())?;
        Ok(CaCertificate {
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
            index: self.index,
        })
    }
}

fn parse_ca_file(text: &str) -> Result<Vec<CaCertificate>> {
    parsers::parse_key_value::<CaRecord>(text)?
        .into_iter()
        .filter(|record| record.index != 0)
        .map(CaRecord::into_certificate)
        .collect()
}

impl Client {
    /// List CA files with their certificate counts.
    pub async fn ca_files(&self) -> Result<Vec<StoredFile>> {
        self.fetch(commands::show_ssl("ca-file"), |text| Ok(parse_stored_files(text)))
            .await
    }

    /// The certificates of one CA file, in file order.
    pub async fn ca_file(&self, name: &str) -> Result<Vec<CaCertificate>> {
        let name = checked_name("CA file", name)?;
        self.fetch(commands::show_ssl_entry("ca-file", name), parse_ca_file)
            .await
            .map_err(|err| not_found(err, &format!("CA file {}", name)))
    }

    pub async fn delete_ca_file(&self, name: &str) -> Result<()> {
        self.delete_stored(ResourceKind::CaFile, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::testing::scripted_client;

    const DETAIL: &str = "\
Filename: /etc/ssl/ca.pem
Status: Used

Certificate #1:
Serial: 11A4D1B3B8A6A43B
notBefore: Jan  1 00:00:00 2020 GMT
notAfter: Jan  1 00:00:00 2040 GMT
Subject Alternative Name:
Algorithm: RSA4096
SHA1 FingerPrint: 0A1B2C
Subject: /C=FR/O=Example/CN=Root CA
Issuer: /C=FR/O=Example/CN=Root CA

Certificate #2:
Serial: 22B5
notBefore: Feb  2 00:00:00 2021 GMT
notAfter: Feb  2 00:00:00 2031 GMT
Subject: /C=FR/O=Example/CN=Intermediate CA
Issuer: /C=FR/O=Example/CN=Root CA
";

    #[tokio::test]
    async fn detail_has_one_record_per_certificate() {
        let (client, transport) = scripted_client();
        transport.respond("show ssl ca-file ca.pem", DETAIL);

        let certs = client.ca_file("ca.pem").await.unwrap();
        assert_eq!(certs.len(), 2);
        assert_eq!(certs[0].index, 1);
        assert_eq!(certs[1].index, 2);
        assert_eq!(certs[1].serial, "22B5");
        for cert in &certs {
            assert_eq!(cert.filename, "/etc/ssl/ca.pem");
            assert_eq!(cert.status.as_deref(), Some("Used"));
        }
        assert!(certs[0].subject_alt_names.is_empty());
    }

    #[test]
    fn missing_dates_fail_the_whole_parse() {
        let text = DETAIL.replace("notAfter: Feb  2 00:00:00 2031 GMT\n", "");
        let err = parse_ca_file(&text).unwrap_err();
        assert!(matches!(err, Error::Parse { ref line, .. } if line.contains("Certificate #2")));
    }

    #[test]
    fn empty_ca_file_has_no_records() {
        let certs = parse_ca_file("Filename: /etc/ssl/empty.pem\nStatus: Unused\n").unwrap();
        assert!(certs.is_empty());
    }

    #[tokio::test]
    async fn listing_reads_counts() {
        let (client, transport) = scripted_client();
        transport.respond(
            "show ssl ca-file",
            "# transaction\n*ca-new.pem - 0 certificate(s)\n# filename\n/etc/ssl/ca.pem - 2 certificate(s)\n",
        );
        let files = client.ca_files().await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].in_transaction);
        assert_eq!(files[1].entries, Some(2));
        assert_eq!(files[1].description, "ca.pem");
    }

    #[tokio::test]
    async fn delete_ca_file() {
        let (client, transport) = scripted_client();
        transport.respond("del ssl ca-file ca.pem", "CA file 'ca.pem' deleted!");
        client.delete_ca_file("ca.pem").await.unwrap();
    }
}
