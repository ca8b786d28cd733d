use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Header (or RPC metadata key) carrying a caller-supplied correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Whether `name` is the correlation id header, ignoring case.
#[inline]
#[must_use]
pub fn is_request_id_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(REQUEST_ID_HEADER)
}

/// Per-request correlation id backed by ULID.
///
/// Every [`DispatchRequest`](crate::dispatcher::DispatchRequest) carries one;
/// all dispatch log lines include it as the `request_id` field.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Reuse the caller's id when it parses as a ULID, otherwise mint a new one.
    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|s| s.trim().parse::<RequestId>().ok())
            .unwrap_or_default()
    }

    /// Request id carried by one header.
    ///
    /// `None` when `name` is some other header. A correlation header whose
    /// value is not a ULID yields a fresh id.
    #[must_use]
    pub fn from_header(name: &str, value: &str) -> Option<Self> {
        is_request_id_header(name).then(|| Self::from_header_or_new(Some(value)))
    }

    /// Request id from RPC metadata, matching the key case-insensitively.
    #[must_use]
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Self {
        let value = metadata
            .get(REQUEST_ID_HEADER)
            .or_else(|| {
                metadata
                    .iter()
                    .find(|(k, _)| is_request_id_header(k))
                    .map(|(_, v)| v)
            })
            .map(String::as_str);
        Self::from_header_or_new(value)
    }

    #[must_use]
    pub fn as_ulid(&self) -> ulid::Ulid {
        self.0
    }

    /// Milliseconds since the Unix epoch at which the id was minted
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for RequestId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(RequestId)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<RequestId>()
            .map_err(|_| serde::de::Error::custom("invalid request id"))
    }
}
