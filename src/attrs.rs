//! Attribute bags attached to plugs, slots and connection endpoints.
//!
//! Values are a small tagged union (string, integer, nested map) kept in an
//! ordered map, so structural equality never depends on insertion order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors from typed attribute lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttrError {
    /// The attribute is not present.
    #[error("attribute {name:?} not found")]
    Missing {
        /// Name of the missing attribute.
        name: String,
    },
    /// The attribute exists but holds a different kind of value.
    #[error("attribute {name:?} is a {actual}, expected {expected}")]
    WrongType {
        /// Name of the attribute.
        name: String,
        /// Kind the caller asked for.
        expected: &'static str,
        /// Kind actually stored.
        actual: &'static str,
    },
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Integer value.
    Int(i64),
    /// String value.
    Str(String),
    /// Nested attribute map.
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Str(_) => "string",
            Self::Map(_) => "map",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<BTreeMap<String, AttrValue>> for AttrValue {
    fn from(v: BTreeMap<String, AttrValue>) -> Self {
        Self::Map(v)
    }
}

/// Ordered, string-keyed attribute bag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttrValue>);

impl Attributes {
    /// Create an empty attribute bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace an attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Raw lookup.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    /// Whether the attribute is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Look up a string attribute.
    ///
    /// # Errors
    ///
    /// Returns [`AttrError::Missing`] or [`AttrError::WrongType`].
    pub fn get_str(&self, name: &str) -> Result<&str, AttrError> {
        match self.require(name)? {
            AttrValue::Str(v) => Ok(v),
            other => Err(wrong_type(name, "string", other)),
        }
    }

    /// Look up an integer attribute.
    ///
    /// # Errors
    ///
    /// Returns [`AttrError::Missing`] or [`AttrError::WrongType`].
    pub fn get_int(&self, name: &str) -> Result<i64, AttrError> {
        match self.require(name)? {
            AttrValue::Int(v) => Ok(*v),
            other => Err(wrong_type(name, "integer", other)),
        }
    }

    /// Look up a nested map attribute.
    ///
    /// # Errors
    ///
    /// Returns [`AttrError::Missing`] or [`AttrError::WrongType`].
    pub fn get_map(&self, name: &str) -> Result<&BTreeMap<String, AttrValue>, AttrError> {
        match self.require(name)? {
            AttrValue::Map(v) => Ok(v),
            other => Err(wrong_type(name, "map", other)),
        }
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    fn require(&self, name: &str) -> Result<&AttrValue, AttrError> {
        self.0.get(name).ok_or_else(|| AttrError::Missing {
            name: name.to_owned(),
        })
    }
}

fn wrong_type(name: &str, expected: &'static str, actual: &AttrValue) -> AttrError {
    AttrError::WrongType {
        name: name.to_owned(),
        expected,
        actual: actual.kind(),
    }
}

impl FromIterator<(String, AttrValue)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (String, AttrValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
