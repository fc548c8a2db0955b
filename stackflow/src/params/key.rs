//! Parameter keys and values.

use crate::errors::InvalidParameterKeyError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Maximum key length accepted by the parameter store.
pub const MAX_KEY_LEN: usize = 1011;

static KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/?[A-Za-z0-9_.\-]+(/[A-Za-z0-9_.\-]+)*$").expect("valid key regex"));

/// A validated, globally scoped parameter key.
///
/// Either flat (`user-pool-id`) or hierarchical (`/auth/user-pool-id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParameterKey(String);

impl ParameterKey {
    /// Parses and validates a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, too long, or contains
    /// characters outside `[A-Za-z0-9_.-/]`.
    pub fn new(key: impl Into<String>) -> Result<Self, InvalidParameterKeyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(InvalidParameterKeyError::new(key, "key cannot be empty"));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(InvalidParameterKeyError::new(
                key,
                format!("key exceeds {MAX_KEY_LEN} characters"),
            ));
        }
        if !KEY_PATTERN.is_match(&key) {
            return Err(InvalidParameterKeyError::new(
                key,
                "only letters, digits, '_', '.', '-' and '/'-separated segments are allowed",
            ));
        }
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for `/`-prefixed keys.
    #[must_use]
    pub fn is_hierarchical(&self) -> bool {
        self.0.starts_with('/')
    }
}

impl TryFrom<String> for ParameterKey {
    type Error = InvalidParameterKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ParameterKey {
    type Error = InvalidParameterKeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParameterKey> for String {
    fn from(key: ParameterKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ParameterKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a parameter value is interpreted by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// A plain string.
    #[default]
    String,
    /// A comma separated list.
    StringList,
}

/// A typed string value held by the parameter store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterValue {
    /// The raw value.
    pub value: String,
    /// How to interpret it.
    #[serde(default)]
    pub kind: ParameterKind,
}

impl ParameterValue {
    /// Creates a plain string value.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: ParameterKind::String,
        }
    }

    /// Creates a list value.
    #[must_use]
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let value = items
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            value,
            kind: ParameterKind::StringList,
        }
    }

    /// Returns the raw value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Splits a list value into its items. A plain string yields one item.
    #[must_use]
    pub fn items(&self) -> Vec<&str> {
        match self.kind {
            ParameterKind::String => vec![self.value.as_str()],
            ParameterKind::StringList if self.value.is_empty() => Vec::new(),
            ParameterKind::StringList => self.value.split(',').collect(),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
