//! Newtype identifiers exchanged through a portal.
//!
//! Each identity-bearing concept gets its own newtype so a [`KeyId`] can never
//! be passed where a [`Name`] is expected even though both are text on the
//! wire. The core never interprets any of them beyond what is documented here.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one portal handle for the lifetime of the process.
///
/// Generated when the handle is created and attached to every log event the
/// handle emits, so all activity of one stack can be correlated. Every
/// reference obtained through `acquire` reports the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackId(Uuid);

impl StackId {
    /// Generates a new random stack identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`StackId`] from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: byte-backed (key identity)
// ---------------------------------------------------------------------------

/// Opaque identity of the signing key associated with a portal.
///
/// Typically a digest of a public key, but the portal only stores and returns
/// it. Rendered and configured as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyId(Vec<u8>);

impl KeyId {
    /// Creates a key identity from raw bytes, returning `None` if `bytes` is empty.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Option<Self> {
        let b = bytes.into();
        if b.is_empty() {
            None
        } else {
            Some(Self(b))
        }
    }

    /// Parses a hex-encoded key identity.
    ///
    /// Returns `None` if `text` is empty or is not valid hex.
    pub fn from_hex(text: &str) -> Option<Self> {
        hex::decode(text.trim()).ok().and_then(Self::new)
    }

    /// Returns the raw identity bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl TryFrom<String> for KeyId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value).ok_or_else(|| format!("'{value}' is not a non-empty hex key id"))
    }
}

impl From<KeyId> for String {
    fn from(value: KeyId) -> Self {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Identifiers: hierarchical names
// ---------------------------------------------------------------------------

/// A hierarchical content name, e.g. `/parc/sensors/temp`.
///
/// Stored as its `/`-separated segments. An optional `ccnx:` or `lci:` scheme
/// prefix is accepted and dropped on parse; the root name `/` has no segments.
/// Used as the argument to `listen`/`ignore` and carried by messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(Vec<String>);

impl Name {
    /// Parses a name, returning `None` if it is empty or not rooted at `/`.
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let text = value.as_ref().trim();
        let path = text
            .strip_prefix("ccnx:")
            .or_else(|| text.strip_prefix("lci:"))
            .unwrap_or(text);
        if !path.starts_with('/') {
            return None;
        }
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Some(Self(segments))
    }

    /// The root name `/`, which is a prefix of every name.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new name with `segment` appended.
    ///
    /// Returns `None` if `segment` is empty, contains `/`, or has surrounding
    /// whitespace: none of those would survive a trip through the text form.
    pub fn child(&self, segment: impl Into<String>) -> Option<Self> {
        let segment = segment.into();
        if segment.is_empty() || segment.contains('/') || segment.trim() != segment {
            return None;
        }
        let mut segments = self.0.clone();
        segments.push(segment);
        Some(Self(segments))
    }

    /// Iterates over the segments of this name.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the root name.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `prefix` matches the leading segments of `self`.
    ///
    /// Matching is segment-wise: `/a/b` is a prefix of `/a/b/c` but not of `/a/bc`.
    pub fn has_prefix(&self, prefix: &Name) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Name {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or_else(|| format!("'{s}' is not a rooted name"))
    }
}

impl TryFrom<String> for Name {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Name> for String {
    fn from(value: Name) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_accepts_scheme_prefix() {
        let plain = Name::new("/parc/sensors").unwrap();
        assert_eq!(Name::new("ccnx:/parc/sensors").unwrap(), plain);
        assert_eq!(Name::new("lci:/parc/sensors").unwrap(), plain);
        assert_eq!(plain.to_string(), "/parc/sensors");
    }

    #[test]
    fn name_rejects_unrooted_text() {
        assert!(Name::new("").is_none());
        assert!(Name::new("parc/sensors").is_none());
        assert!(Name::new("ccnx:parc").is_none());
    }

    #[test]
    fn prefix_matching_is_segment_wise() {
        let name = Name::new("/a/b/c").unwrap();
        assert!(name.has_prefix(&Name::new("/a/b").unwrap()));
        assert!(name.has_prefix(&Name::root()));
        assert!(name.has_prefix(&name));
        assert!(!Name::new("/a/bc").unwrap().has_prefix(&Name::new("/a/b").unwrap()));
        assert!(!Name::new("/a").unwrap().has_prefix(&name));
    }

    #[test]
    fn root_displays_as_slash() {
        assert_eq!(Name::new("/").unwrap(), Name::root());
        assert_eq!(Name::root().to_string(), "/");
        assert_eq!(Name::root().child("x").unwrap().to_string(), "/x");
    }

    #[test]
    fn child_rejects_segments_that_do_not_survive_text_form() {
        let base = Name::new("/a").unwrap();
        assert!(base.child("b/c").is_none());
        assert!(base.child("").is_none());
        assert!(base.child(" b").is_none());

        let child = base.child("b c").unwrap();
        assert_eq!(child.to_string().parse::<Name>().unwrap(), child);
        assert_eq!(child.len(), 2);
    }

    #[test]
    fn stack_id_wraps_its_uuid() {
        let uuid = Uuid::new_v4();
        let id = StackId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
        assert_eq!(id.to_string(), uuid.to_string());
        assert_ne!(StackId::new_random(), id);
    }

    #[test]
    fn key_id_round_trips_through_hex() {
        let key = KeyId::from_hex("00ff10").unwrap();
        assert_eq!(key.as_bytes(), &[0x00, 0xff, 0x10]);
        assert_eq!(key.to_string(), "00ff10");
        assert!(KeyId::from_hex("").is_none());
        assert!(KeyId::from_hex("zz").is_none());
        assert!(KeyId::new(Vec::new()).is_none());
    }
}
