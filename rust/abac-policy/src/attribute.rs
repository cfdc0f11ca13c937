use crate::PolicyError;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Label reserved for the public policy.
pub const PUBLIC_POLICY: &str = "*";

/// An opaque attribute label, such as `role:doctor`.
///
/// Attributes are compared as exact, case-sensitive strings. A label must be
/// non-empty, must not contain `,` (the policy separator), whitespace or
/// control characters, and must not be the reserved [`PUBLIC_POLICY`] marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Attribute(String);

impl Attribute {
    /// Creates an attribute from its label.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidAttribute`] when the label is not a
    /// valid attribute.
    pub fn new(label: impl Into<String>) -> Result<Self, PolicyError> {
        let label = label.into();
        let invalid = label.is_empty()
            || label == PUBLIC_POLICY
            || label
                .chars()
                .any(|c| c == ',' || c.is_whitespace() || c.is_control());
        if invalid {
            return Err(PolicyError::InvalidAttribute(label));
        }
        Ok(Self(label))
    }

    /// The attribute label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Attribute {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Attribute {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Attribute> for String {
    fn from(attribute: Attribute) -> Self {
        attribute.0
    }
}

/// An unordered set of attributes.
///
/// Iteration yields attributes in their canonical (sorted) order, which is
/// what every role relies on when deriving keys or signing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(BTreeSet<Attribute>);

impl AttributeSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute, returning whether it was newly inserted.
    pub fn insert(&mut self, attribute: Attribute) -> bool {
        self.0.insert(attribute)
    }

    /// Whether `attribute` is a member.
    pub fn contains(&self, attribute: &Attribute) -> bool {
        self.0.contains(attribute)
    }

    /// Whether every member of `other` is also a member of `self`.
    pub fn is_superset(&self, other: &AttributeSet) -> bool {
        self.0.is_superset(&other.0)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Attributes in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }

    /// Members of `self` that are not in `other`, in canonical order.
    pub fn difference<'a>(&'a self, other: &'a AttributeSet) -> impl Iterator<Item = &'a Attribute> {
        self.0.difference(&other.0)
    }
}

impl FromIterator<Attribute> for AttributeSet {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for AttributeSet {
    type Item = Attribute;
    type IntoIter = std::collections::btree_set::IntoIter<Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a AttributeSet {
    type Item = &'a Attribute;
    type IntoIter = std::collections::btree_set::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, attribute) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            f.write_str(attribute.as_str())?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribute(label: &str) -> Attribute {
        Attribute::new(label).unwrap()
    }

    #[test]
    fn it_accepts_namespaced_labels() {
        assert_eq!(Attribute::new("role:doctor").unwrap().as_str(), "role:doctor");
    }

    #[test]
    fn it_rejects_reserved_and_blank_labels() {
        for label in ["", "*", "a,b", "a b", " role", "line\n"] {
            assert_eq!(
                Attribute::new(label),
                Err(PolicyError::InvalidAttribute(label.to_owned())),
                "{label:?} should be rejected"
            );
        }
    }

    #[test]
    fn it_is_case_sensitive() {
        assert_ne!(
            Attribute::new("Role:Doctor").unwrap(),
            Attribute::new("role:doctor").unwrap()
        );
    }

    #[test]
    fn it_ignores_insertion_order() {
        let a: AttributeSet = ["b", "a"].into_iter().map(attribute).collect();
        let b: AttributeSet = ["a", "b", "a"].into_iter().map(attribute).collect();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "{a,b}");
    }

    #[test]
    fn it_validates_on_deserialize() {
        let result: Result<AttributeSet, _> = serde_json::from_str(r#"["ok", "not ok"]"#);
        assert!(result.is_err());
    }
}
