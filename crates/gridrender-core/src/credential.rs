//! Delegated grid credentials (proxy certificates).
//!
//! The remote session reports its proxy as `name : value` lines, e.g.
//!
//! ```text
//! subject  : /C=PL/O=GRID/O=Cyfronet/CN=plgjdoe/CN=1234
//! path     : /tmp/x509up_u1234
//! timeleft : 11:59:52
//! ```
//!
//! A proxy is usable unless `timeleft` is exactly [`ZERO_TIMELEFT`].

use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// `timeleft` value reported for an expired proxy.
pub const ZERO_TIMELEFT: &str = "00:00:00";

const FIELD_DELIMITER: &str = " : ";

/// Parsed `name : value` report of the current proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyInfo {
    fields: BTreeMap<String, String>,
}

impl ProxyInfo {
    /// Parse report lines. Lines without the delimiter are ignored.
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let fields = lines
            .into_iter()
            .filter_map(|line| line.split_once(FIELD_DELIMITER))
            .map(|(key, value)| (key.trim_end().to_string(), value.trim_end().to_string()))
            .collect();
        Self { fields }
    }

    /// Look up a field by name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Reported remaining lifetime, verbatim.
    pub fn timeleft(&self) -> Option<&str> {
        self.get("timeleft")
    }

    /// Reported certificate path on the remote host.
    pub fn path(&self) -> Option<&str> {
        self.get("path")
    }

    /// Any `timeleft` other than the zero sentinel counts as valid.
    pub fn is_valid(&self) -> bool {
        matches!(self.timeleft(), Some(t) if t != ZERO_TIMELEFT)
    }

    /// Turn a valid report into a credential acquired at `acquired_at`.
    ///
    /// Returns `None` when the proxy is expired or the report has no path.
    pub fn into_credential(self, acquired_at: Instant) -> Option<Credential> {
        if !self.is_valid() {
            return None;
        }
        let path = self.path()?.to_string();
        let timeleft = self.timeleft()?.to_string();
        Some(Credential {
            remaining_lifetime: parse_timeleft(&timeleft),
            path,
            timeleft,
            acquired_at,
        })
    }
}

/// Parse an `HH:MM:SS` lifetime. Hours may exceed 23.
pub fn parse_timeleft(value: &str) -> Option<Duration> {
    let mut parts = value.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + minutes * 60 + seconds))
}

/// A usable proxy certificate on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Where the remote session stores the certificate.
    pub path: String,
    /// `timeleft` as reported at acquisition.
    pub timeleft: String,
    /// Parsed lifetime at acquisition; `None` if the report was not `HH:MM:SS`.
    pub remaining_lifetime: Option<Duration>,
    /// When the report was read.
    pub acquired_at: Instant,
}

impl Credential {
    /// Lifetime left at `now`, if known.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.remaining_lifetime
            .map(|lifetime| lifetime.saturating_sub(now.saturating_duration_since(self.acquired_at)))
    }

    /// Whether less than `margin` of the known lifetime is left at `now`.
    ///
    /// A credential with unknown lifetime never needs refreshing.
    pub fn needs_refresh_at(&self, now: Instant, margin: Duration) -> bool {
        matches!(self.remaining_at(now), Some(left) if left < margin)
    }
}

/// Base64 proxy certificate, sent in the `PROXY` request header.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedProxy(String);

impl EncodedProxy {
    /// Encode raw certificate content as a single base64 line.
    pub fn encode(content: &[u8]) -> Self {
        let mut encoded = STANDARD.encode(content);
        encoded.retain(|c| c != '\n');
        Self(encoded)
    }

    /// Header value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EncodedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncodedProxy(<{} bytes redacted>)", self.0.len())
    }
}
