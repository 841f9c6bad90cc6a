//! FTP control-channel message definitions and parsers

use crate::client::RemoteEntry;
use ftpsync_types::{Error, Result};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::warn;

/// A complete (possibly multi-line) server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Three-digit reply code
    pub code: u16,
    /// Reply text, one element per line, code prefixes removed
    pub lines: Vec<String>,
}

impl Reply {
    /// Create a reply from a code and its text lines
    pub fn new(code: u16, lines: Vec<String>) -> Self {
        Self { code, lines }
    }

    /// Reply text joined with newlines
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// 1xx: the server started the action and will send another reply
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// 2xx: the action completed
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// 3xx: the server needs another command (e.g. PASS after USER)
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }

    /// Turn a reply into an error unless its code is one of `expected`
    pub fn expect(self, expected: &[u16]) -> Result<Self> {
        if expected.contains(&self.code) {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Convert a reply into the matching error
    pub fn into_error(self) -> Error {
        Error::remote(self.code, self.text())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text())
    }
}

/// Header of one reply line: code and whether it ends the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineHeader {
    /// Reply code carried by the line
    pub code: u16,
    /// `true` for `ddd text`, `false` for `ddd-text`
    pub last: bool,
}

/// Parse the `ddd ` / `ddd-` prefix of a reply line.
///
/// Lines inside a multi-line reply need not carry a code; those return `None`.
pub fn parse_line_header(line: &str) -> Option<LineHeader> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let code = line[..3].parse().ok()?;
    match bytes.get(3) {
        None | Some(b' ') => Some(LineHeader { code, last: true }),
        Some(b'-') => Some(LineHeader { code, last: false }),
        Some(_) => None,
    }
}

/// Strip the code prefix from a reply line
pub fn line_text(line: &str) -> &str {
    match parse_line_header(line) {
        Some(_) if line.len() > 4 => &line[4..],
        Some(_) => "",
        None => line,
    }
}

/// Extract the data port from a `229 Entering Extended Passive Mode (|||port|)` reply
pub fn parse_epsv_port(text: &str) -> Result<u16> {
    let start = text
        .find('(')
        .ok_or_else(|| Error::protocol(format!("Malformed EPSV reply: {}", text)))?;
    let end = text[start..]
        .find(')')
        .map(|offset| start + offset)
        .ok_or_else(|| Error::protocol(format!("Malformed EPSV reply: {}", text)))?;

    let inner = &text[start + 1..end];
    let delimiter = inner
        .chars()
        .next()
        .ok_or_else(|| Error::protocol(format!("Malformed EPSV reply: {}", text)))?;
    inner
        .split(delimiter)
        .filter(|piece| !piece.is_empty())
        .last()
        .and_then(|port| port.parse().ok())
        .ok_or_else(|| Error::protocol(format!("Malformed EPSV reply: {}", text)))
}

/// Extract the data address from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply
pub fn parse_pasv_addr(text: &str) -> Result<SocketAddrV4> {
    let numbers: Vec<u8> = text
        .split(|c: char| !c.is_ascii_digit() && c != ',')
        .find(|run| run.matches(',').count() == 5)
        .map(|run| run.split(',').filter_map(|n| n.parse().ok()).collect())
        .unwrap_or_default();

    if numbers.len() != 6 {
        return Err(Error::protocol(format!("Malformed PASV reply: {}", text)));
    }

    let ip = Ipv4Addr::new(numbers[0], numbers[1], numbers[2], numbers[3]);
    let port = u16::from(numbers[4]) << 8 | u16::from(numbers[5]);
    Ok(SocketAddrV4::new(ip, port))
}

/// Parse one `MLSD` line (`fact=value;fact=value; name`).
///
/// Only plain files and directories are reported; the listed directory itself
/// (`cdir`), its parent (`pdir`), links and device entries yield `None`.
pub fn parse_mlsd_line(line: &str) -> Option<RemoteEntry> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (facts, name) = line.split_once(' ')?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }

    let kind = facts.split(';').find_map(|fact| {
        let (key, value) = fact.split_once('=')?;
        key.eq_ignore_ascii_case("type")
            .then(|| value.to_ascii_lowercase())
    })?;

    match kind.as_str() {
        "file" => Some(RemoteEntry::file(name)),
        "dir" => Some(RemoteEntry::dir(name)),
        _ => None,
    }
}

/// Parse a raw `MLSD` payload.
///
/// Lines whose names are not valid UTF-8 cannot be addressed by a later
/// command and are skipped with a warning; the rest of the listing stands.
pub fn parse_mlsd_listing(payload: &[u8]) -> Vec<RemoteEntry> {
    payload
        .split(|&byte| byte == b'\n')
        .filter(|line| !line.is_empty())
        .filter_map(|line| match std::str::from_utf8(line) {
            Ok(line) => parse_mlsd_line(line),
            Err(_) => {
                warn!(
                    "Skipping listing entry with a non UTF-8 name: {}",
                    String::from_utf8_lossy(line).trim_end()
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftpsync_types::EntryKind;
    use rstest::rstest;

    #[rstest]
    #[case("220 Service ready", Some(LineHeader { code: 220, last: true }))]
    #[case("220-Welcome", Some(LineHeader { code: 220, last: false }))]
    #[case("226", Some(LineHeader { code: 226, last: true }))]
    #[case(" continuation text", None)]
    #[case("22x nope", None)]
    #[case("2200 nope", None)]
    fn test_parse_line_header(#[case] line: &str, #[case] expected: Option<LineHeader>) {
        assert_eq!(parse_line_header(line), expected);
    }

    #[test]
    fn test_line_text() {
        assert_eq!(line_text("257 \"/a\" created"), "\"/a\" created");
        assert_eq!(line_text("226"), "");
        assert_eq!(line_text("  plain"), "  plain");
    }

    #[test]
    fn test_reply_expect() {
        let reply = Reply::new(550, vec!["No such file".to_string()]);
        let error = reply.clone().expect(&[250]).unwrap_err();
        assert!(error.is_rejection());
        assert!(error.to_string().contains("No such file"));

        let ok = Reply::new(250, vec!["Done".to_string()]).expect(&[250]).unwrap();
        assert!(ok.is_completion());
        assert!(!reply.is_preliminary());
    }

    #[test]
    fn test_parse_epsv_port() {
        assert_eq!(
            parse_epsv_port("Entering Extended Passive Mode (|||6446|)").unwrap(),
            6446
        );
        assert!(parse_epsv_port("Entering Extended Passive Mode").is_err());
        assert!(parse_epsv_port("Entering Extended Passive Mode (|||x|)").is_err());
    }

    #[test]
    fn test_parse_pasv_addr() {
        let addr = parse_pasv_addr("Entering Passive Mode (192,168,1,20,19,137).").unwrap();
        assert_eq!(*addr.ip(), Ipv4Addr::new(192, 168, 1, 20));
        assert_eq!(addr.port(), 19 * 256 + 137);

        let bare = parse_pasv_addr("Entering Passive Mode 10,0,0,5,4,1").unwrap();
        assert_eq!(bare.port(), 1025);

        assert!(parse_pasv_addr("Entering Passive Mode (1,2,3)").is_err());
    }

    #[test]
    fn test_parse_mlsd_line() {
        let file = parse_mlsd_line("type=file;size=2;modify=20240101000000; a b.txt\r\n").unwrap();
        assert_eq!(file.name, "a b.txt");
        assert_eq!(file.kind, EntryKind::File);

        let dir = parse_mlsd_line("Type=dir;modify=20240101000000; sub").unwrap();
        assert_eq!(dir.kind, EntryKind::Directory);

        assert!(parse_mlsd_line("type=cdir;modify=20240101000000; .").is_none());
        assert!(parse_mlsd_line("type=pdir; ..").is_none());
        assert!(parse_mlsd_line("type=OS.unix=slink:/x; link").is_none());
        assert!(parse_mlsd_line("garbage").is_none());
    }

    #[test]
    fn test_parse_mlsd_listing_skips_undecodable_names() {
        let mut payload = b"type=file;size=1; good.txt\r\n".to_vec();
        payload.extend_from_slice(b"type=file;size=1; \xff.bin\r\n");
        payload.extend_from_slice(b"type=dir; sub\r\n");

        let entries = parse_mlsd_listing(&payload);
        let names: Vec<_> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["good.txt", "sub"]);
    }

    #[test]
    fn test_parse_mlsd_listing_empty() {
        assert!(parse_mlsd_listing(b"").is_empty());
        assert!(parse_mlsd_listing(b"\r\n").is_empty());
    }
}
