use crate::{Attribute, AttributeSet, PUBLIC_POLICY, PolicyError};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A conjunction of attributes gating access to a data item.
///
/// A policy is satisfied by an [`AttributeSet`] that contains every required
/// attribute. The public policy requires nothing and is satisfied by every
/// set; it can only be created with [`Policy::public`] or the `*` text form,
/// never by accident from an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Policy {
    required: AttributeSet,
}

impl Policy {
    /// Parse a policy from its text form.
    ///
    /// The grammar is a comma-separated list of attributes, with optional
    /// whitespace around each entry, or the single marker `*` for public data.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::MalformedPolicy`] for empty text, empty list
    /// entries, invalid attribute labels, or `*` mixed with attributes.
    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        let malformed = |reason: &str| PolicyError::MalformedPolicy {
            text: text.to_owned(),
            reason: reason.to_owned(),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(malformed("empty policy; use `*` to mark data as public"));
        }
        if trimmed == PUBLIC_POLICY {
            return Ok(Self::public());
        }

        let mut required = AttributeSet::new();
        for entry in trimmed.split(',').map(str::trim) {
            if entry.is_empty() {
                return Err(malformed("empty attribute in list"));
            }
            if entry == PUBLIC_POLICY {
                return Err(malformed("`*` cannot be combined with attributes"));
            }
            let attribute = Attribute::new(entry).map_err(|error| malformed(&error.to_string()))?;
            required.insert(attribute);
        }
        Ok(Self { required })
    }

    /// The policy that every attribute set satisfies.
    #[must_use]
    pub fn public() -> Self {
        Self {
            required: AttributeSet::new(),
        }
    }

    /// A policy requiring all of the given attributes. An empty iterator
    /// yields `None`; use [`Policy::public`] to opt into public data.
    pub fn all_of(attributes: impl IntoIterator<Item = Attribute>) -> Option<Self> {
        let required: AttributeSet = attributes.into_iter().collect();
        (!required.is_empty()).then_some(Self { required })
    }

    /// Whether this is the public policy.
    pub fn is_public(&self) -> bool {
        self.required.is_empty()
    }

    /// The attributes this policy requires.
    pub fn required(&self) -> &AttributeSet {
        &self.required
    }

    /// Returns true iff every required attribute is present in `attributes`.
    pub fn matches(&self, attributes: &AttributeSet) -> bool {
        attributes.is_superset(&self.required)
    }

    /// Required attributes missing from `attributes`, in canonical order.
    pub fn missing<'a>(&'a self, attributes: &'a AttributeSet) -> impl Iterator<Item = &'a Attribute> {
        self.required.difference(attributes)
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_public() {
            return f.write_str(PUBLIC_POLICY);
        }
        for (index, attribute) in self.required.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            f.write_str(attribute.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for Policy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Policy {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Policy> for String {
    fn from(policy: Policy) -> Self {
        policy.to_string()
    }
}
