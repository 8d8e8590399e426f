//! Hashed string identifiers for component and message types.
//!
//! A [`TypeId`] names a kind of component or message. It carries the original
//! name for diagnostics and a 64-bit FNV-1a hash of that name which is used for
//! equality, ordering and hashing. Hashing the name makes the identifier
//! deterministic across processes: any two parties that agree on a name agree
//! on its id.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Type identifier used for component types.
pub type ComponentType = TypeId;

/// Type identifier used for message types.
pub type MessageType = TypeId;

/// A hashed, named type identifier.
///
/// Two `TypeId`s are equal when their name hashes are equal. The name is kept
/// only for logging and display.
///
/// # Examples
///
/// ```rust
/// use engine_component::TypeId;
///
/// const POSITION: TypeId = TypeId::from_static("Position");
///
/// assert_eq!(POSITION, TypeId::new("Position"));
/// assert_eq!(POSITION.name(), "Position");
/// ```
#[derive(Clone)]
pub struct TypeId {
    hash: u64,
    name: Cow<'static, str>,
}

impl TypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// The "no type" sentinel, the id of the empty name.
    pub const NONE: TypeId = TypeId::from_static("");

    /// Hash a name with the FNV-1a 64-bit algorithm.
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3
    /// ```
    #[must_use]
    pub const fn hash_name(name: &str) -> u64 {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        hash
    }

    /// Create a type id from a static name. Usable in `const` items.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self {
            hash: Self::hash_name(name),
            name: Cow::Borrowed(name),
        }
    }

    /// Create a type id from any name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            hash: Self::hash_name(&name),
            name: Cow::Owned(name),
        }
    }

    /// Returns the name this id was created from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the 64-bit name hash.
    #[must_use]
    pub const fn hash_value(&self) -> u64 {
        self.hash
    }

    /// Returns `true` if this is the [`TypeId::NONE`] sentinel (the hash of
    /// the empty name is the offset basis).
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.hash == Self::FNV_OFFSET_BASIS
    }
}

impl PartialEq for TypeId {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for TypeId {}

impl Hash for TypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl PartialOrd for TypeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl Default for TypeId {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({:?}, {:#018x})", self.name, self.hash)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for TypeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl Serialize for TypeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for TypeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}
