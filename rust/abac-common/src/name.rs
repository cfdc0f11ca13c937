//! Hierarchical names for principals, data items and service endpoints.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Errors that can occur when parsing a [`Name`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// A component contains a character that cannot appear in a name.
    #[error("invalid name component '{0}'")]
    InvalidComponent(String),
}

/// A hierarchical, immutable path such as `/hospital/records/alice`.
///
/// Names are compared component-wise. Empty components are dropped while
/// parsing, so `"//a//b/"` and `"/a/b"` denote the same name, and `"/"` is
/// the root name with no components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Vec<String>);

impl Name {
    /// The root name `/`.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a name from its `/`-separated text form.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::InvalidComponent`] when a component contains a
    /// control character or whitespace.
    pub fn parse(text: &str) -> Result<Self, NameError> {
        let mut components = Vec::new();
        for component in text.split('/').filter(|c| !c.is_empty()) {
            components.push(validate(component)?.to_owned());
        }
        Ok(Self(components))
    }

    /// The components of this name, outermost first.
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root name.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy of this name extended with one more component.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::InvalidComponent`] if `component` is empty or
    /// contains `/`, whitespace or a control character.
    pub fn push(&self, component: &str) -> Result<Self, NameError> {
        if component.is_empty() || component.contains('/') {
            return Err(NameError::InvalidComponent(component.to_owned()));
        }
        let mut components = self.0.clone();
        components.push(validate(component)?.to_owned());
        Ok(Self(components))
    }

    /// Returns the concatenation of this name and `suffix`.
    #[must_use]
    pub fn append(&self, suffix: &Name) -> Self {
        let mut components = self.0.clone();
        components.extend(suffix.0.iter().cloned());
        Self(components)
    }

    /// Whether every component of `self` matches the leading components of
    /// `other`. Every name is a prefix of itself and the root is a prefix of
    /// every name.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a == b)
    }

    /// Returns the remainder of this name after `prefix`, or `None` when
    /// `prefix` is not a prefix of this name.
    pub fn strip_prefix(&self, prefix: &Name) -> Option<Name> {
        if prefix.is_prefix_of(self) {
            Some(Self(self.0[prefix.0.len()..].to_vec()))
        } else {
            None
        }
    }
}

fn validate(component: &str) -> Result<&str, NameError> {
    if component
        .chars()
        .any(|c| c.is_control() || c.is_whitespace())
    {
        return Err(NameError::InvalidComponent(component.to_owned()));
    }
    Ok(component)
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for component in &self.0 {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Name {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(text: &str) -> Name {
        Name::parse(text).unwrap()
    }

    #[test]
    fn it_normalizes_empty_components() {
        assert_eq!(name("//a//b/"), name("/a/b"));
        assert_eq!(name("a/b"), name("/a/b"));
        assert_eq!(name("/a/b").to_string(), "/a/b");
        assert!(name("/").is_root());
        assert_eq!(Name::root().to_string(), "/");
    }

    #[test]
    fn it_rejects_whitespace_in_components() {
        assert!(Name::parse("/a b").is_err());
        assert!(Name::parse("/a\tb/c").is_err());
    }

    #[test]
    fn it_checks_prefixes_component_wise() {
        let producer = name("/hospital");
        let data = name("/hospital/records/alice");

        assert!(producer.is_prefix_of(&data));
        assert!(data.is_prefix_of(&data));
        assert!(Name::root().is_prefix_of(&data));
        assert!(!data.is_prefix_of(&producer));
        assert!(!name("/hosp").is_prefix_of(&data));
    }

    #[test]
    fn it_strips_and_appends() {
        let producer = name("/hospital");
        let data = name("/records/alice");
        let full = producer.append(&data);

        assert_eq!(full, name("/hospital/records/alice"));
        assert_eq!(full.strip_prefix(&producer), Some(data));
        assert_eq!(full.strip_prefix(&name("/clinic")), None);
        assert_eq!(producer.strip_prefix(&producer), Some(Name::root()));
    }

    #[test]
    fn it_pushes_single_components() {
        let base = name("/hospital");
        assert_eq!(base.push("records").unwrap(), name("/hospital/records"));
        assert!(base.push("a/b").is_err());
        assert!(base.push("").is_err());
    }

    #[test]
    fn it_serializes_as_text() {
        let value = name("/hospital/records");
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"/hospital/records\"");
        let back: Name = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
