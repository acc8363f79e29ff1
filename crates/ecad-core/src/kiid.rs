use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used when synthesizing deterministic identifiers for files that
/// predate UUIDs. Derived once from the project URL so repeated reads of the
/// same legacy file produce the same root identifier.
const LEGACY_NAMESPACE: Uuid = Uuid::from_u128(0x8c1c1d65_6b5c_4f0a_9f3a_52f2f0d5b1aa);

/// A document-unique identifier attached to every persistent entity.
///
/// Wraps a UUID. New items draw a random v4; items read from a file keep the
/// file's value (de-duplicated by the parser via [`Kiid::increment`]); legacy
/// files get a deterministic v5 synthesized from the screen identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kiid(Uuid);

impl Kiid {
    /// A fresh random identifier.
    pub fn new() -> Self {
        Kiid(Uuid::new_v4())
    }

    /// The nil identifier (all zero). Used as "not yet assigned".
    pub const fn nil() -> Self {
        Kiid(Uuid::nil())
    }

    /// Deterministically derive an identifier from a screen identity string.
    ///
    /// Legacy schematics (version < 20210406) have no stored UUID; instance
    /// paths must still be stable across repeated reads, so the root sheet
    /// identifier is a v5 UUID of the screen identity rather than a random
    /// draw.
    pub fn deterministic(screen_identity: &str) -> Self {
        Kiid(Uuid::new_v5(&LEGACY_NAMESPACE, screen_identity.as_bytes()))
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Bump the identifier by one. Used to resolve collisions while reading
    /// a single document: the second occurrence of a UUID is incremented
    /// until unique.
    pub fn increment(&mut self) {
        self.0 = Uuid::from_u128(self.0.as_u128().wrapping_add(1));
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for Kiid {
    fn default() -> Self {
        Kiid::new()
    }
}

impl fmt::Display for Kiid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Kiid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Kiid(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for Kiid {
    fn from(u: Uuid) -> Self {
        Kiid(u)
    }
}

/// An ordered list of sheet UUIDs identifying one instance in a hierarchy.
///
/// Serialized in files as `/uuid/uuid/...`; the root UUID is prepended on
/// read for formats that stored root-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KiidPath(pub Vec<Kiid>);

impl KiidPath {
    pub fn new() -> Self {
        KiidPath(Vec::new())
    }

    /// Parse a `/uuid/uuid` path. Segments that fail to parse as UUIDs are
    /// skipped, matching the permissive behaviour of the original reader.
    pub fn parse(path: &str) -> Self {
        KiidPath(
            path.split('/')
                .filter(|seg| !seg.is_empty())
                .filter_map(|seg| seg.parse().ok())
                .collect(),
        )
    }

    pub fn prepend(&mut self, root: Kiid) {
        self.0.insert(0, root);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for KiidPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }

        for id in &self.0 {
            write!(f, "/{id}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_changes_value() {
        let mut a = Kiid::deterministic("screen-1");
        let b = a;
        a.increment();
        assert_ne!(a, b);
    }

    #[test]
    fn deterministic_is_stable() {
        assert_eq!(Kiid::deterministic("screen-1"), Kiid::deterministic("screen-1"));
        assert_ne!(Kiid::deterministic("screen-1"), Kiid::deterministic("screen-2"));
    }

    #[test]
    fn serializes_transparently() {
        let id = Kiid::deterministic("screen-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: Kiid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn path_roundtrip() {
        let a = Kiid::new();
        let b = Kiid::new();
        let path = KiidPath(vec![a, b]);
        let parsed = KiidPath::parse(&path.to_string());
        assert_eq!(parsed, path);
    }

    #[test]
    fn path_skips_garbage_segments() {
        let a = Kiid::new();
        let parsed = KiidPath::parse(&format!("/not-a-uuid/{a}"));
        assert_eq!(parsed.0, vec![a]);
    }
}
