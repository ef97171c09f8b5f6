//! Split Runtime API output into frames and classify them.
//!
//! With `set severity-output number` active, HAProxy prefixes diagnostics with a bracketed
//! severity digit, e.g. `[3]: Unknown command.`. Severities `0` through `3` (emerg, alert, crit,
//! err) mark a failed command; anything else is informational.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Highest severity digit that marks a response as an error.
pub const MAX_ERROR_SEVERITY: u8 = 3;

/// Prompt the master CLI sometimes leaves in front of a frame.
const PROMPT: &str = "> ";

/// Byte that terminates one frame.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Delimiter {
    #[default]
    Newline,
    /// Used by `show events -0`.
    Nul,
}

impl Delimiter {
    pub fn byte(self) -> u8 {
        match self {
            Delimiter::Newline => b'\n',
            Delimiter::Nul => b'\0',
        }
    }

    /// The delimiter that is not `self`; a single one of these may lead a frame.
    fn artifact(self) -> char {
        match self {
            Delimiter::Newline => '\0',
            Delimiter::Nul => '\n',
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FrameStatus {
    Empty,
    Ok,
    /// Carries the severity digit (`0`-`3`).
    Error(u8),
}

/// One decoded frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    pub status: FrameStatus,
    /// The frame text, minus the severity marker for error frames.
    pub payload: String,
}

impl Frame {
    /// Classify an already delimited frame.
    pub fn decode(raw: &str) -> Frame {
        let text = clean(raw, Delimiter::Newline);
        if text.is_empty() {
            return Frame {
                status: FrameStatus::Empty,
                payload: String::new(),
            };
        }

        match error_severity(text) {
            Some((severity, message)) => Frame {
                status: FrameStatus::Error(severity),
                payload: message.to_owned(),
            },
            None => Frame {
                status: FrameStatus::Ok,
                payload: text.to_owned(),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, FrameStatus::Error(_))
    }
}

/// Severity digit and message of a frame such as `[3]: No such map.`.
///
/// Returns `None` when the frame carries no marker or a non-error severity.
pub fn error_severity(frame: &str) -> Option<(u8, &str)> {
    let mut chars = frame.char_indices();
    chars.next()?;
    let (at, marker) = chars.next()?;
    let digit = marker.to_digit(10)?;
    if digit > u32::from(MAX_ERROR_SEVERITY) {
        return None;
    }

    let rest = &frame[at + 1..];
    let message = rest
        .strip_prefix("]:")
        .or_else(|| rest.strip_prefix(']'))
        .unwrap_or(rest);
    Some((digit as u8, message.trim()))
}

/// Like [`error_severity`], but only for a literal `[N]` marker at the start of `frame`.
///
/// Pushed event frames start with a syslog tag such as `<134>`, whose second character is a
/// digit too; only a bracketed marker means the sink refused the subscription.
pub fn bracketed_severity(frame: &str) -> Option<(u8, &str)> {
    let rest = frame.strip_prefix('[')?;
    let mut chars = rest.chars();
    let digit = chars.next()?.to_digit(10)?;
    if digit > u32::from(MAX_ERROR_SEVERITY) {
        return None;
    }
    let rest = chars.as_str().strip_prefix(']')?;
    Some((digit as u8, rest.strip_prefix(':').unwrap_or(rest).trim()))
}

/// Severity and message of the first non-empty frame of a full response.
pub fn response_error(response: &str) -> Option<(u8, &str)> {
    response
        .lines()
        .map(str::trim_end)
        .find(|line| !line.is_empty())
        .and_then(error_severity)
}

/// Strip a single leading artifact byte and the prompt prefix.
fn clean(raw: &str, delimiter: Delimiter) -> &str {
    let text = raw.strip_prefix(delimiter.artifact()).unwrap_or(raw);
    let text = text.strip_prefix(PROMPT).unwrap_or(text);
    text.trim_end_matches(['\r', '\n', '\0'])
}

/// Reads delimiter-terminated frames from an async byte stream.
pub struct FrameReader<R> {
    reader: R,
    delimiter: Delimiter,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, delimiter: Delimiter) -> Self {
        Self {
            reader,
            delimiter,
            buf: Vec::with_capacity(256),
        }
    }

    /// Read the next frame, or `None` at end of stream.
    pub async fn next_frame(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(self.delimiter.byte(), &mut self.buf)
            .await?;
        if read == 0 {
            return Ok(None);
        }

        let raw = String::from_utf8_lossy(&self.buf);
        Ok(Some(clean(&raw, self.delimiter).to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketed_severity_needs_the_brackets() {
        assert_eq!(
            bracketed_severity("[3]: no such event sink"),
            Some((3, "no such event sink"))
        );
        assert_eq!(bracketed_severity("[0] down"), Some((0, "down")));
        assert_eq!(bracketed_severity("[5]: notice"), None);
        assert_eq!(bracketed_severity("<134>2024-05-02T10:11:12Z Server be/s1 is DOWN"), None);
        assert_eq!(bracketed_severity("<30>2024-05-02T10:11:12Z up"), None);
        assert_eq!(bracketed_severity("[3 unterminated"), None);
    }

    #[test]
    fn error_frames_are_classified_by_second_character() {
        let frame = Frame::decode("[3]: Unknown command.");
        assert_eq!(frame.status, FrameStatus::Error(3));
        assert_eq!(frame.payload, "Unknown command.");

        let frame = Frame::decode("[0]: Emergency");
        assert_eq!(frame.status, FrameStatus::Error(0));
    }

    #[test]
    fn informational_severities_are_not_errors() {
        let frame = Frame::decode("[6]: Server is going DOWN for maintenance.");
        assert_eq!(frame.status, FrameStatus::Ok);
        assert!(!frame.is_error());
        assert!(error_severity("[4]: warning").is_none());
    }

    #[test]
    fn plain_text_is_ok() {
        let frame = Frame::decode("admin");
        assert_eq!(frame.status, FrameStatus::Ok);
        assert_eq!(frame.payload, "admin");
        assert!(error_severity("New version created: 2").is_none());
    }

    #[test]
    fn empty_frame_is_success() {
        assert_eq!(Frame::decode("").status, FrameStatus::Empty);
        assert_eq!(Frame::decode("\n").status, FrameStatus::Empty);
        assert_eq!(Frame::decode("> ").status, FrameStatus::Empty);
    }

    #[test]
    fn prompt_prefix_is_stripped() {
        assert_eq!(Frame::decode("> admin").payload, "admin");
    }

    #[test]
    fn response_error_checks_first_non_empty_frame() {
        assert_eq!(
            response_error("\n[2]: Missing arguments.\n"),
            Some((2, "Missing arguments."))
        );
        assert_eq!(response_error("ok\n[3]: later"), None);
        assert_eq!(response_error(""), None);
    }

    #[tokio::test]
    async fn reader_splits_on_newline() {
        let input: &[u8] = b"first\nsecond\n\nlast";
        let mut reader = FrameReader::new(input, Delimiter::Newline);
        assert_eq!(reader.next_frame().await.unwrap().as_deref(), Some("first"));
        assert_eq!(reader.next_frame().await.unwrap().as_deref(), Some("second"));
        assert_eq!(reader.next_frame().await.unwrap().as_deref(), Some(""));
        assert_eq!(reader.next_frame().await.unwrap().as_deref(), Some("last"));
        assert_eq!(reader.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reader_splits_on_nul_and_drops_leading_newline() {
        let input: &[u8] = b"<0>2024-01-01T00:00:00Z a\n\0\n<0>2024-01-01T00:00:01Z b\n\0";
        let mut reader = FrameReader::new(input, Delimiter::Nul);
        assert_eq!(
            reader.next_frame().await.unwrap().as_deref(),
            Some("<0>2024-01-01T00:00:00Z a")
        );
        assert_eq!(
            reader.next_frame().await.unwrap().as_deref(),
            Some("<0>2024-01-01T00:00:01Z b")
        );
        assert_eq!(reader.next_frame().await.unwrap(), None);
    }
}
