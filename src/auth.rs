//! Per-resource authentication gate: Basic-auth credential checking with a
//! lazily-evicted verification cache, and cookie-based sessions built on top
//! of it.

use crate::{
    http::encoding::base64_decode,
    limits::AuthLimits,
    Handled, Request, Response, StatusCode,
};
use rand::{distributions::Alphanumeric, Rng};
use std::{
    collections::HashMap,
    sync::RwLock,
    time::Instant,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Public,
    Protected,
}

/// Longest-prefix-match gate over request paths, backed by HTTP Basic
/// credentials and an optional cookie session issued after a successful check.
///
/// Build one with [`Authenticator::builder`], register users, then mark
/// resource prefixes as protected. Paths with no matching prefix default to
/// public.
pub struct Authenticator {
    rules: Vec<(Vec<u8>, Rule)>,
    users: HashMap<String, String>,
    limits: AuthLimits,

    // Basic-auth: "user:pass" -> last-verified time.
    credential_cache: RwLock<HashMap<String, Instant>>,
    // Cookie session id -> last-verified time.
    sessions: RwLock<HashMap<String, Instant>>,
}

impl Authenticator {
    #[inline]
    pub fn builder() -> AuthenticatorBuilder {
        AuthenticatorBuilder {
            rules: Vec::new(),
            users: HashMap::new(),
            limits: AuthLimits::default(),
        }
    }

    /// An authenticator with no protected resources and no registered users;
    /// [`needs_auth`](Self::needs_auth) always returns `false`.
    pub(crate) fn none() -> Self {
        Authenticator::builder().build()
    }

    /// Longest-prefix match over the registered rules. Unmatched paths are public.
    ///
    /// A rule only matches at a path-segment boundary: prefix `K` matches
    /// path `P` when `K` is empty, `K == P`, or `P` starts with `K + "/"`.
    /// `restrict("/api")` must not also protect `/apiextra`.
    pub(crate) fn needs_auth(&self, path: &[u8]) -> bool {
        self.rules
            .iter()
            .filter(|(prefix, _)| Self::is_boundary_match(path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .is_some_and(|(_, rule)| *rule == Rule::Protected)
    }

    fn is_boundary_match(path: &[u8], prefix: &[u8]) -> bool {
        prefix.is_empty()
            || (path.starts_with(prefix) && (path.len() == prefix.len() || path[prefix.len()] == b'/'))
    }

    /// Runs the gate for a request whose path requires authentication: checks
    /// an existing session cookie first, then falls back to `Authorization: Basic`.
    /// On failure, writes a `401` (with `WWW-Authenticate` for the Basic path)
    /// into `response` and returns `Err`.
    pub(crate) fn authorize(&self, request: &Request, response: &mut Response) -> Result<(), Handled> {
        if let Some(session) = request.cookie(b"session") {
            if self.validate_session(session) {
                return Ok(());
            }
        }

        let Some(header) = request.header(b"authorization") else {
            return Err(self.challenge(response));
        };

        match self.verify_basic(header) {
            true => Ok(()),
            false => Err(self.challenge(response)),
        }
    }

    fn challenge(&self, response: &mut Response) -> Handled {
        response
            .status(StatusCode::Unauthorized)
            .header(b"www-authenticate", b"Basic realm=\"restricted\"")
            .body("Authentication required")
    }

    fn verify_basic(&self, header: &[u8]) -> bool {
        let Some(encoded) = header.strip_prefix(b"Basic ") else {
            return false;
        };
        let Ok(encoded) = std::str::from_utf8(encoded) else {
            return false;
        };
        let Ok(decoded) = base64_decode(encoded) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };

        self.evict_expired();

        if let Ok(mut cache) = self.credential_cache.write() {
            if let Some(seen) = cache.get(&decoded) {
                if seen.elapsed() < self.limits.cache_expiration {
                    return true;
                }
            }

            let Some((user, pass)) = decoded.split_once(':') else {
                return false;
            };
            if self.users.get(user).map(String::as_str) == Some(pass) {
                cache.insert(decoded, Instant::now());
                return true;
            }
        }

        false
    }

    /// Issues a new session id for `user` and returns the `Set-Cookie` value
    /// to attach to the response (e.g. after a login handler validates credentials).
    pub fn start_session(&self) -> String {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(id.clone(), Instant::now());
        }

        crate::cookie::set_cookie_value(
            "session",
            &id,
            "/",
            Some(self.limits.cookie_lifetime.as_secs()),
        )
    }

    /// Invalidates a session id immediately; returns the `Set-Cookie` value
    /// that deletes the cookie client-side.
    pub fn end_session(&self, id: &[u8]) -> String {
        if let (Ok(mut sessions), Ok(id)) = (self.sessions.write(), std::str::from_utf8(id)) {
            sessions.remove(id);
        }

        crate::cookie::set_cookie_value("session", "", "/", Some(0))
    }

    fn validate_session(&self, id: &[u8]) -> bool {
        let Ok(id) = std::str::from_utf8(id) else {
            return false;
        };

        self.evict_expired();

        self.sessions
            .read()
            .ok()
            .and_then(|sessions| sessions.get(id).copied())
            .is_some_and(|seen| seen.elapsed() < self.limits.cookie_lifetime)
    }

    // Lazy full-scan eviction: no separate live-entry counter is kept, so a
    // write simply walks and drops anything past its expiration.
    fn evict_expired(&self) {
        if let Ok(mut cache) = self.credential_cache.write() {
            cache.retain(|_, seen| seen.elapsed() < self.limits.cache_expiration);
        }
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.retain(|_, seen| seen.elapsed() < self.limits.cookie_lifetime);
        }
    }
}

/// Builder for [`Authenticator`].
pub struct AuthenticatorBuilder {
    rules: Vec<(Vec<u8>, Rule)>,
    users: HashMap<String, String>,
    limits: AuthLimits,
}

impl AuthenticatorBuilder {
    /// Marks every path starting with `prefix` as requiring authentication.
    #[inline]
    pub fn restrict(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.rules.push((prefix.into(), Rule::Protected));
        self
    }

    /// Marks every path starting with `prefix` as public, overriding a
    /// shorter [`restrict`](Self::restrict) prefix it falls under.
    #[inline]
    pub fn permit(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.rules.push((prefix.into(), Rule::Public));
        self
    }

    /// Registers a username/password pair accepted by HTTP Basic auth.
    #[inline]
    pub fn user(mut self, name: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(name.into(), password.into());
        self
    }

    /// Overrides the cache/session expiration limits.
    #[inline]
    pub fn limits(mut self, limits: AuthLimits) -> Self {
        self.limits = limits;
        self
    }

    #[inline]
    pub fn build(self) -> Authenticator {
        Authenticator {
            rules: self.rules,
            users: self.users,
            limits: self.limits,
            credential_cache: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::encoding::base64_encode;

    #[test]
    fn longest_prefix_wins() {
        let auth = Authenticator::builder()
            .restrict("/api")
            .permit("/api/public")
            .build();

        assert!(auth.needs_auth(b"/api/users"));
        assert!(!auth.needs_auth(b"/api/public/health"));
        assert!(!auth.needs_auth(b"/status"));
    }

    #[test]
    fn basic_auth_roundtrip() {
        let auth = Authenticator::builder().user("alice", "wonderland").build();

        let header = format!("Basic {}", base64_encode(b"alice:wonderland"));
        assert!(auth.verify_basic(header.as_bytes()));

        let bad = format!("Basic {}", base64_encode(b"alice:wrong"));
        assert!(!auth.verify_basic(bad.as_bytes()));
    }

    #[test]
    fn basic_auth_cache_hit_skips_user_lookup() {
        let auth = Authenticator::builder().user("alice", "wonderland").build();
        let header = format!("Basic {}", base64_encode(b"alice:wonderland"));

        assert!(auth.verify_basic(header.as_bytes()));

        // Even if the user is removed from the backing store the cached
        // verification should still satisfy the check until it expires.
        assert!(auth.credential_cache.read().unwrap().contains_key("alice:wonderland"));
        assert!(auth.verify_basic(header.as_bytes()));
    }

    #[test]
    fn session_lifecycle() {
        let auth = Authenticator::builder().build();
        let set_cookie = auth.start_session();

        let id = set_cookie
            .strip_prefix("session=")
            .unwrap()
            .split(';')
            .next()
            .unwrap();

        assert!(auth.validate_session(id.as_bytes()));

        let deletion = auth.end_session(id.as_bytes());
        assert_eq!(deletion, "session=; Path=/; Max-Age=0");
        assert!(!auth.validate_session(id.as_bytes()));
    }

    #[test]
    fn no_rules_means_public() {
        let auth = Authenticator::none();
        assert!(!auth.needs_auth(b"/anything"));
    }

    #[test]
    fn prefix_match_respects_segment_boundary() {
        let auth = Authenticator::builder().restrict("/api").build();

        assert!(auth.needs_auth(b"/api"));
        assert!(auth.needs_auth(b"/api/users"));
        assert!(!auth.needs_auth(b"/apiextra"));

        let auth = Authenticator::builder()
            .restrict("/api")
            .permit("/api/public")
            .build();

        assert!(auth.needs_auth(b"/api/publicAdmin"));
        assert!(!auth.needs_auth(b"/api/public"));
        assert!(!auth.needs_auth(b"/api/public/health"));
    }
}
