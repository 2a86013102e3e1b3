//! UDP datagram encoding and decoding
//!
//! Requests are `COMMAND key=value&key=value` with values HTML-encoded.
//! Responses start with `<tag> <code>[ <text>]` followed by the body; a
//! datagram that starts with two zero bytes carries a zlib stream.

use bytes::{BufMut, Bytes, BytesMut};
use flate2::read::ZlibDecoder;
use rand::Rng;
use std::io::Read;

use crate::error::ProtocolError;
use crate::protocol::MAX_PACKET_SIZE;

/// Commands sent without a session key
pub const ANONYMOUS_COMMANDS: [&str; 6] = ["PING", "ENCODING", "ENCRYPT", "AUTH", "VERSION", "USER"];

/// Newline replacement inside values
pub const ENCODED_NEWLINE: &str = "<br />";

/// Whether a command must carry `s=<session>`
pub fn requires_session(command: &str) -> bool {
    !ANONYMOUS_COMMANDS.contains(&command)
}

/// HTML-encode a parameter value and flatten its newlines
pub fn encode_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len() + 8);
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                result.push_str(ENCODED_NEWLINE);
            }
            '\n' => result.push_str(ENCODED_NEWLINE),
            _ => result.push(ch),
        }
    }

    result
}

/// Undo AniDB's escaping of a response field
///
/// `<br />` is a newline and a backtick stands for an apostrophe.
pub fn decode_value(value: &str) -> String {
    value.replace(ENCODED_NEWLINE, "\n").replace('`', "'")
}

/// Random 8 hex digit request tag
pub fn generate_tag() -> String {
    format!("{:08x}", rand::rng().random::<u32>())
}

/// Build the request datagram
///
/// `session` is appended as `s=` and `tag` last; the caller decides whether
/// the command needs a session.
pub fn encode_request(
    command: &str,
    params: &[(String, String)],
    session: Option<&str>,
    tag: &str,
) -> Result<Bytes, ProtocolError> {
    let mut pairs: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{key}={}", encode_value(value)))
        .collect();
    if let Some(session) = session {
        pairs.push(format!("s={}", encode_value(session)));
    }
    pairs.push(format!("tag={tag}"));

    let text = format!("{command} {}", pairs.join("&"));
    if text.len() > MAX_PACKET_SIZE {
        return Err(ProtocolError::malformed(format!(
            "{command} request is {} bytes, limit is {MAX_PACKET_SIZE}",
            text.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(text.len());
    buf.put_slice(text.as_bytes());
    Ok(buf.freeze())
}

/// Replace password and session values for logging
pub fn mask_secrets(request: &str) -> String {
    let Some((command, params)) = request.split_once(' ') else {
        return request.to_string();
    };
    let masked: Vec<String> = params
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key @ ("pass" | "s"), _)) => format!("{key}=****"),
            _ => pair.to_string(),
        })
        .collect();
    format!("{command} {}", masked.join("&"))
}

/// First line of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    pub tag: String,
    pub code: u16,
    pub text: String,
}

/// Parse `<tag> <code>[ <text>]`
///
/// The tag is 8 lower-case hex digits and the code exactly 3 digits.
pub fn parse_response_line(line: &str) -> Option<ResponseLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (tag, rest) = line.split_once(' ')?;
    if tag.len() != 8 || !tag.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }

    let (code, text) = match rest.split_once(' ') {
        Some((code, text)) => (code, text),
        None => (rest, ""),
    };
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(ResponseLine {
        tag: tag.to_string(),
        code: code.parse().ok()?,
        text: text.to_string(),
    })
}

/// Decoded response datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub tag: String,
    pub code: u16,
    /// Text after the code on the first line
    pub text: String,
    /// Remaining lines, trailing whitespace removed
    pub body: String,
}

/// Decode a received datagram
///
/// Returns `Ok(None)` when the first line is not a response line.
pub fn decode_datagram(datagram: &[u8]) -> Result<Option<RawResponse>, ProtocolError> {
    let text = match datagram {
        [0, 0, compressed @ ..] => {
            let mut decoder = ZlibDecoder::new(compressed);
            let mut text = String::new();
            decoder
                .read_to_string(&mut text)
                .map_err(|e| ProtocolError::malformed(format!("Bad compressed datagram: {e}")))?;
            text
        }
        _ => String::from_utf8(datagram.to_vec())
            .map_err(|e| ProtocolError::malformed(format!("Datagram is not UTF-8: {e}")))?,
    };

    let (first, body) = match text.split_once('\n') {
        Some((first, body)) => (first, body),
        None => (text.as_str(), ""),
    };

    Ok(parse_response_line(first).map(|line| RawResponse {
        tag: line.tag,
        code: line.code,
        text: line.text,
        body: body.trim_end().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn test_encode_value() {
        assert_eq!(encode_value("simple"), "simple");
        assert_eq!(encode_value("with&ampersand"), "with&amp;ampersand");
        assert_eq!(encode_value("<tag>"), "&lt;tag&gt;");
        assert_eq!(encode_value("say \"hi\""), "say &quot;hi&quot;");
        assert_eq!(encode_value("it's"), "it&#39;s");
        assert_eq!(encode_value("a\nb\r\nc\rd"), "a<br />b<br />c<br />d");
        assert_eq!(encode_value("P@ssw0rd!#2024"), "P@ssw0rd!#2024");
    }

    #[test]
    fn test_decode_value() {
        assert_eq!(decode_value("line1<br />line2"), "line1\nline2");
        assert_eq!(decode_value("Kino`s Journey"), "Kino's Journey");
        assert_eq!(decode_value("/path/to/file"), "/path/to/file");
    }

    #[test]
    fn test_encode_request_param_order() {
        let params = vec![
            ("fid".to_string(), "312498".to_string()),
            ("fmask".to_string(), "7FF8FEF8".to_string()),
        ];
        let bytes = encode_request("FILE", &params, Some("abcde"), "0a1b2c3d").unwrap();
        assert_eq!(&bytes[..], b"FILE fid=312498&fmask=7FF8FEF8&s=abcde&tag=0a1b2c3d");
    }

    #[test]
    fn test_encode_request_without_session() {
        let bytes = encode_request("PING", &[("nat".to_string(), "1".to_string())], None, "00000000")
            .unwrap();
        assert_eq!(&bytes[..], b"PING nat=1&tag=00000000");
    }

    #[test]
    fn test_encode_request_rejects_oversized() {
        let params = vec![("value".to_string(), "x".repeat(MAX_PACKET_SIZE))];
        assert!(encode_request("MYLISTADD", &params, Some("s"), "00000000").is_err());
    }

    #[test]
    fn test_requires_session() {
        assert!(!requires_session("AUTH"));
        assert!(!requires_session("PING"));
        assert!(requires_session("FILE"));
        assert!(requires_session("LOGOUT"));
    }

    #[test]
    fn test_generate_tag() {
        let tag = generate_tag();
        assert_eq!(tag.len(), 8);
        assert!(parse_response_line(&format!("{tag} 300 PONG")).is_some());
    }

    #[test]
    fn test_mask_secrets() {
        assert_eq!(
            mask_secrets("AUTH user=me&pass=secret&protover=3&tag=00000001"),
            "AUTH user=me&pass=****&protover=3&tag=00000001"
        );
        assert_eq!(
            mask_secrets("FILE fid=1&s=abcde&tag=00000002"),
            "FILE fid=1&s=****&tag=00000002"
        );
    }

    #[test]
    fn test_parse_response_line() {
        let line = parse_response_line("0a1b2c3d 200 xyzzy LOGIN ACCEPTED").unwrap();
        assert_eq!(line.tag, "0a1b2c3d");
        assert_eq!(line.code, 200);
        assert_eq!(line.text, "xyzzy LOGIN ACCEPTED");

        let line = parse_response_line("0a1b2c3d 300").unwrap();
        assert_eq!(line.text, "");

        assert!(parse_response_line("200 LOGIN ACCEPTED").is_none());
        assert!(parse_response_line("0A1B2C3D 200 UPPER TAG").is_none());
        assert!(parse_response_line("0a1b2c3d 2000 LONG CODE").is_none());
        assert!(parse_response_line("").is_none());
    }

    #[test]
    fn test_decode_plain_datagram() {
        let response = decode_datagram(b"0a1b2c3d 220 FILE\n312498|22|4567\n")
            .unwrap()
            .unwrap();
        assert_eq!(response.code, 220);
        assert_eq!(response.text, "FILE");
        assert_eq!(response.body, "312498|22|4567");
    }

    #[test]
    fn test_decode_compressed_datagram() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"0a1b2c3d 300 PONG\n").unwrap();
        let mut datagram = vec![0u8, 0u8];
        datagram.extend(encoder.finish().unwrap());

        let response = decode_datagram(&datagram).unwrap().unwrap();
        assert_eq!(response.code, 300);
        assert_eq!(response.body, "");
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(decode_datagram(b"garbage").unwrap(), None);
        assert!(decode_datagram(&[0, 0, 1, 2, 3]).is_err());
        assert!(decode_datagram(&[0xff, 0xfe]).is_err());
    }

    proptest! {
        #[test]
        fn parse_response_line_never_panics(line in ".*") {
            let _ = parse_response_line(&line);
        }

        #[test]
        fn parse_response_line_accepts_well_formed(
            tag in "[0-9a-f]{8}",
            code in 100u16..1000,
            text in "[A-Z ]{0,20}",
        ) {
            let line = if text.is_empty() {
                format!("{tag} {code}")
            } else {
                format!("{tag} {code} {text}")
            };
            let parsed = parse_response_line(&line).unwrap();
            prop_assert_eq!(parsed.tag, tag);
            prop_assert_eq!(parsed.code, code);
            prop_assert_eq!(parsed.text, text);
        }
    }
}
