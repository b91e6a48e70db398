//! Stateless session tokens.
//!
//! A token is `b64url(user|issued_at|b64url(hmac_sha256(secret, "user|issued_at")))`.
//! Nothing is stored server side; a token stays valid until its TTL runs out.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '|';

#[derive(Clone)]
pub struct SessionCodec {
    key: HmacSha256,
    ttl: Duration,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> anyhow::Result<Self> {
        let key = <HmacSha256 as Mac>::new_from_slice(secret.as_ref())
            .map_err(|e| anyhow::anyhow!("invalid session secret: {e}"))?;
        Ok(Self { key, ttl })
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn issue(&self, username: &str) -> String {
        self.issue_at(username, now_epoch())
    }

    #[must_use]
    pub fn issue_at(&self, username: &str, issued_at: i64) -> String {
        let payload = format!("{username}{SEPARATOR}{issued_at}");
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&payload).finalize().into_bytes());
        URL_SAFE_NO_PAD.encode(format!("{payload}{SEPARATOR}{signature}"))
    }

    /// Returns the username carried by a valid, unexpired token.
    #[must_use]
    pub fn validate(&self, token: &str) -> Option<String> {
        self.validate_at(token, now_epoch())
    }

    #[must_use]
    pub fn validate_at(&self, token: &str, now: i64) -> Option<String> {
        let decoded = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;

        let mut fields = decoded.split(SEPARATOR);
        let (Some(username), Some(issued), Some(signature), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return None;
        };

        if username.is_empty() {
            return None;
        }

        let issued_at: i64 = issued.parse().ok()?;
        let age = u64::try_from(now.saturating_sub(issued_at)).unwrap_or(0);
        if age > self.ttl.as_secs() {
            return None;
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let payload = format!("{username}{SEPARATOR}{issued}");
        // verify_slice compares in constant time.
        self.mac(&payload).verify_slice(&signature).ok()?;

        Some(username.to_string())
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.key.clone();
        mac.update(payload.as_bytes());
        mac
    }
}

fn now_epoch() -> i64 {
    Utc::now().timestamp()
}
