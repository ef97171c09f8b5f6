//! Records shared by ACLs and maps, which HAProxy lists the same way.

use std::str::FromStr;

use crate::errors::{Error, Result};

/// One line of `show acl` or `show map`: `<id> (<file>) <description>`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PatternFile {
    pub id: u32,
    /// The file the patterns were loaded from; `None` for inline patterns.
    pub reference: Option<String>,
    pub description: String,
}

impl FromStr for PatternFile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let line = s.trim();
        let (id, rest) = line
            .split_once(' ')
            .ok_or_else(|| Error::parse("expected id and description", line))?;
        let id = id
            .parse()
            .map_err(|_| Error::parse("invalid pattern id", line))?;

        let rest = rest.trim_start();
        let (reference, description) = match rest.strip_prefix('(') {
            Some(inner) => {
                let end = inner
                    .find(')')
                    .ok_or_else(|| Error::parse("unterminated reference", line))?;
                let reference = inner[..end].trim();
                (
                    (!reference.is_empty()).then(|| reference.to_owned()),
                    inner[end + 1..].trim(),
                )
            }
            None => (None, rest),
        };

        Ok(PatternFile {
            id,
            reference,
            description: description.to_owned(),
        })
    }
}

/// One pattern of an ACL or one key of a map.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PatternEntry {
    /// Element pointer within HAProxy. Kept as u64 so 32-bit clients can address 64-bit servers.
    pub id: u64,
    /// The ACL pattern or the map key.
    pub key: String,
    /// The map value; `None` for ACL patterns.
    pub value: Option<String>,
}

impl FromStr for PatternEntry {
    type Err = Error;

    /// Parse `0x55d1f4b6e0b0 key [value]`.
    fn from_str(s: &str) -> Result<Self> {
        let line = s.trim();
        let mut parts = line.splitn(3, ' ');
        let (id, key) = match (parts.next(), parts.next()) {
            (Some(id), Some(key)) => (id, key),
            _ => return Err(Error::parse("expected element pointer and key", line)),
        };
        let id = id
            .strip_prefix("0x")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .ok_or_else(|| Error::parse("invalid element pointer", line))?;

        Ok(PatternEntry {
            id,
            key: key.to_owned(),
            value: parts
                .next()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_file_with_and_without_reference() {
        let inline: PatternFile = "0 () acl 'src' file '/usr/local/etc/haproxy/haproxy.cfg' line 20"
            .parse()
            .unwrap();
        assert_eq!(inline.id, 0);
        assert_eq!(inline.reference, None);
        assert_eq!(
            inline.description,
            "acl 'src' file '/usr/local/etc/haproxy/haproxy.cfg' line 20"
        );

        let file: PatternFile = "3 (/etc/haproxy/hosts.map) pattern loaded from file '/etc/haproxy/hosts.map'"
            .parse()
            .unwrap();
        assert_eq!(file.reference.as_deref(), Some("/etc/haproxy/hosts.map"));
    }

    #[test]
    fn pattern_entry_from_str() {
        let acl: PatternEntry = "0x1234 127.0.0.1".parse().unwrap();
        assert_eq!(
            acl,
            PatternEntry {
                id: 0x1234,
                key: "127.0.0.1".into(),
                value: None,
            }
        );

        let map: PatternEntry = "0x55d1f4b6e0b0 example.com be_web".parse().unwrap();
        assert_eq!(map.value.as_deref(), Some("be_web"));

        assert!("1234 127.0.0.1".parse::<PatternEntry>().is_err());
    }
}
