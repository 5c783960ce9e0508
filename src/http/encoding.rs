//! Percent-encoding and base64 helpers used by URL/form parsing and Basic auth.

use base64::{engine::general_purpose::STANDARD, Engine};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::borrow::Cow;

// RFC 3986 reserved characters plus space; header/path-safe superset.
const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'%')
    .add(b'/')
    .add(b'&')
    .add(b'=');

/// Percent-encodes a string for safe inclusion in a URL path segment or query value.
#[inline]
pub fn url_encode(value: &str) -> String {
    utf8_percent_encode(value, FRAGMENT).to_string()
}

/// Decodes a percent-encoded string. Invalid UTF-8 in the decoded bytes is
/// replaced lossily rather than rejected, matching how most HTTP servers
/// treat hostile or buggy clients.
#[inline]
pub fn url_decode(value: &str) -> Cow<'_, str> {
    percent_decode_str(value).decode_utf8_lossy()
}

/// Encodes bytes as standard base64 (used for `Authorization: Basic` credentials).
#[inline]
pub fn base64_encode(value: &[u8]) -> String {
    STANDARD.encode(value)
}

/// Decodes a standard base64 string.
#[inline]
pub fn base64_decode(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(value)
}
