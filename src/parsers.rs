//! Parsing strategies shared by every resource kind.
//!
//! HAProxy's CLI output is loosely structured text. Four shapes cover everything the client reads:
//!
//! * header-skip line lists ([`data_lines`], [`parse_lines`]),
//! * `key: value` blocks, optionally split into several records by a repeating header line
//!   ([`KeyValueRecord`], [`parse_key_value`]),
//! * delimiter-separated rows behind a header row ([`parse_rows`]),
//! * crt-list style entry lines ([`EntryLine`]).
//!
//! All functions are pure: parsing the same text twice yields equal results. Lines that cannot be
//! understood are skipped, except where that would drop a required field such as a date or a
//! serial number; those fail with [`Error::Parse`] naming the offending line.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::errors::{Error, Result};

/// Lines of a listing minus blanks and `#` comment/header lines.
pub fn data_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !(line.trim().is_empty() || line.trim_start().starts_with('#')))
}

/// Build one record per data line, skipping lines `parse` rejects.
pub fn parse_lines<T, F>(text: &str, parse: F) -> Vec<T>
where
    F: Fn(&str) -> Option<T>,
{
    data_lines(text).filter_map(parse).collect()
}

/// Build one record per data line, failing on the first line `parse` rejects.
pub fn parse_lines_strict<T, F>(text: &str, parse: F) -> Result<Vec<T>>
where
    F: Fn(&str) -> Result<T>,
{
    data_lines(text).map(parse).collect()
}

/// Split a listing line into positional fields on spaces, tabs, and `:`.
pub fn fields(line: &str) -> Vec<&str> {
    line.split(|c: char| c.is_whitespace() || c == ':')
        .filter(|field| !field.is_empty())
        .collect()
}

/// Split `line` on its first `:` and trim both sides.
///
/// A line without a colon is returned whole as the key with an empty value.
pub fn split_key_value(line: &str) -> (&str, &str) {
    match line.split_once(':') {
        Some((key, value)) => (key.trim(), value.trim()),
        None => (line.trim(), ""),
    }
}

/// Split `key=value, key="quoted value"` pairs as printed by `get acl` and `get map`.
pub fn assignments(text: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim();

        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            }
        };

        pairs.push((key, value.trim()));
        rest = remainder.trim_start_matches([',', ' ']).trim();
    }
    pairs
}

/// A record assembled from `key: value` lines.
pub trait KeyValueRecord: Sized {
    /// Start a record; `previous` is the record (or preamble) that came before, from which
    /// context fields such as the file name are carried over.
    fn start(previous: Option<&Self>) -> Self;

    /// Whether `key` opens a new record.
    fn is_record_header(_key: &str) -> bool {
        false
    }

    /// Fold one line into the record. `line` is the untrimmed original, for error reports.
    fn apply(&mut self, key: &str, value: &str, line: &str) -> Result<()>;

    /// Check the finished record for required fields.
    fn finish(&self) -> Result<()> {
        Ok(())
    }
}

/// Parse `key: value` lines into records.
///
/// Without header lines the whole text forms one record. With header lines, everything before
/// the first header is a preamble that only seeds the carried-over context, and each header
/// starts a new record.
pub fn parse_key_value<R: KeyValueRecord>(text: &str) -> Result<Vec<R>> {
    let mut records = Vec::new();
    let mut current = R::start(None);
    let mut in_record = false;
    let mut saw_header = false;
    let mut saw_field = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = split_key_value(line);

        if R::is_record_header(key) {
            let next = R::start(Some(&current));
            if in_record {
                current.finish()?;
                records.push(current);
            }
            current = next;
            in_record = true;
            saw_header = true;
        }

        current.apply(key, value, line)?;
        saw_field = true;
    }

    if in_record || (!saw_header && saw_field) {
        current.finish()?;
        records.push(current);
    }
    Ok(records)
}

/// Field separator for [`parse_rows`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RowDelimiter {
    Tab,
    Pipe,
    Comma,
    /// Any run of whitespace.
    Whitespace,
}

impl RowDelimiter {
    fn split(self, line: &str) -> Vec<&str> {
        match self {
            RowDelimiter::Tab => line.split('\t').map(str::trim).collect(),
            RowDelimiter::Pipe => line.split('|').map(str::trim).collect(),
            RowDelimiter::Comma => line.split(',').map(str::trim).collect(),
            RowDelimiter::Whitespace => line.split_whitespace().collect(),
        }
    }
}

/// Parse delimited rows. The first non-empty line is a header and always discarded, as are `#`
/// lines. A row with fewer than `expected` fields is a parse error.
pub fn parse_rows<T, F>(text: &str, delimiter: RowDelimiter, expected: usize, build: F) -> Result<Vec<T>>
where
    F: Fn(&[&str]) -> Result<T>,
{
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .skip(1)
        .filter(|line| !line.starts_with('#'))
        .map(|line| {
            let row = delimiter.split(line);
            if row.len() < expected {
                return Err(Error::parse(
                    format!("expected {} fields, found {}", expected, row.len()),
                    line,
                ));
            }
            build(&row).map_err(|err| match err {
                Error::Parse { reason, .. } => Error::parse(reason, line),
                other => other,
            })
        })
        .collect()
}

/// `name[:line] [bracketed config] filter filter ...`, as printed by `show ssl crt-list -n`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct EntryLine {
    pub name: String,
    pub line_number: Option<u32>,
    /// Contents of the `[...]` segment, without the brackets.
    pub config: Option<String>,
    /// Never `None`; empty when the line has no filters.
    pub filters: Vec<String>,
}

impl EntryLine {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (head, rest) = match line.find(char::is_whitespace) {
            Some(at) => (&line[..at], line[at..].trim_start()),
            None => (line, ""),
        };
        if head.is_empty() {
            return Err(Error::parse("missing entry name", line));
        }

        let (name, line_number) = match head.rsplit_once(':') {
            Some((name, number)) if !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()) => {
                let number = number
                    .parse()
                    .map_err(|_| Error::parse("line number out of range", line))?;
                (name, Some(number))
            }
            _ => (head, None),
        };

        let (config, rest) = match rest.strip_prefix('[') {
            Some(bracketed) => {
                let end = bracketed
                    .find(']')
                    .ok_or_else(|| Error::parse("unterminated '[' in entry", line))?;
                (
                    Some(bracketed[..end].trim().to_owned()),
                    &bracketed[end + 1..],
                )
            }
            None => (None, rest),
        };

        Ok(Self {
            name: name.to_owned(),
            line_number,
            config,
            filters: rest.split_whitespace().map(str::to_owned).collect(),
        })
    }
}

/// Parse an OpenSSL-style date such as `Sep  8 14:45:39 2048 GMT`.
pub fn openssl_date(value: &str, line: &str) -> Result<DateTime<Utc>> {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&normalized, "%b %d %H:%M:%S %Y GMT")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|err| Error::parse(format!("invalid date {:?}: {}", value, err), line))
}

/// Parse an RFC 3339 timestamp such as `2025-07-14T08:03:27Z`.
pub fn rfc3339_date(value: &str, line: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|err| Error::parse(format!("invalid date {:?}: {}", value, err), line))
}

/// Parse a value that must be present and numeric.
pub fn number<T: std::str::FromStr>(value: &str, what: &str, line: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::parse(format!("invalid {} {:?}", what, value), line))
}

/// Require a non-empty value.
pub fn required<'a>(value: &'a str, what: &str, line: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        Err(Error::parse(format!("missing {}", what), line))
    } else {
        Ok(value.trim())
    }
}
