//! Cookie parsing and `Set-Cookie` construction.
//!
//! Parsing reads the request's `Cookie:` header (a single `name=value; name2=value2`
//! line, per [RFC 6265](https://tools.ietf.org/html/rfc6265#section-5.4)). Building
//! targets the subset of `Set-Cookie` attributes this crate actually emits: `Path`
//! and `Max-Age`.

use memchr::memchr;

/// A single parsed cookie pair, borrowed from the request's `Cookie` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cookie<'a> {
    pub name: &'a [u8],
    pub value: &'a [u8],
}

/// Parses a `Cookie:` header value into individual name/value pairs.
///
/// # Examples
/// ```
/// use maker_web::cookie::parse;
///
/// let pairs: Vec<_> = parse(b"session=abc123; theme=dark").collect();
/// assert_eq!(pairs[0].name, b"session");
/// assert_eq!(pairs[0].value, b"abc123");
/// assert_eq!(pairs[1].name, b"theme");
/// assert_eq!(pairs[1].value, b"dark");
/// ```
pub fn parse(header: &[u8]) -> impl Iterator<Item = Cookie<'_>> {
    header
        .split(|&b| b == b';')
        .filter_map(|pair| {
            let pair = trim(pair);
            if pair.is_empty() {
                return None;
            }

            let split = memchr(b'=', pair)?;
            Some(Cookie {
                name: trim(&pair[..split]),
                value: trim(&pair[split + 1..]),
            })
        })
}

fn trim(value: &[u8]) -> &[u8] {
    let value = value
        .iter()
        .position(|b| *b != b' ')
        .map_or(&value[value.len()..], |start| &value[start..]);

    match value.iter().rposition(|b| *b != b' ') {
        Some(end) => &value[..=end],
        None => &value[..0],
    }
}

/// Looks up a single cookie by name in a `Cookie:` header value.
pub fn get<'a>(header: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    parse(header).find(|c| c.name == name).map(|c| c.value)
}

/// Builds a `Set-Cookie` header value.
///
/// `max_age = Some(0)` deletes the cookie immediately on the client
/// (this crate's chosen semantics, see `DESIGN.md`). `max_age = None` omits
/// the attribute, producing a session cookie.
///
/// # Examples
/// ```
/// use maker_web::cookie::set_cookie_value;
///
/// assert_eq!(set_cookie_value("session", "abc123", "/", Some(3600)),
///     "session=abc123; Path=/; Max-Age=3600");
/// assert_eq!(set_cookie_value("session", "", "/", Some(0)),
///     "session=; Path=/; Max-Age=0");
/// ```
pub fn set_cookie_value(name: &str, value: &str, path: &str, max_age: Option<u64>) -> String {
    match max_age {
        Some(age) => format!("{name}={value}; Path={path}; Max-Age={age}"),
        None => format!("{name}={value}; Path={path}"),
    }
}
