//! K8s-style object and resource types shared by both repositories.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CatalogError, ConversionError};

/// A resource as stored in a repository: its canonical id and a JSON
/// snapshot of the full object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Canonical identifier, see [`crate::identity::identity`].
    pub id: String,
    /// Serialized object content, replaced wholesale on every update.
    pub content: Vec<u8>,
}

impl Resource {
    pub fn new(id: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            content,
        }
    }

    /// Parses the stored content back into a JSON value.
    pub fn content_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.content)
    }

    /// Renders the content as indented JSON, for inspection views.
    pub fn pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.content_json()?)
    }
}

/// An API group and version, e.g. `apps/v1`. The core group is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    /// Parses `group/version` or a bare `version` (core group).
    pub fn parse(api_version: &str) -> Result<Self, CatalogError> {
        let invalid = || CatalogError::InvalidGroupVersion(api_version.to_string());

        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => {
                if group.is_empty() || version.contains('/') {
                    return Err(invalid());
                }
                (group, version)
            }
            None => ("", api_version),
        };

        if version.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(group, version))
    }

    pub fn with_kind(&self, kind: impl Into<String>) -> GroupVersionKind {
        GroupVersionKind {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: kind.into(),
        }
    }
}

impl std::fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.version)
        } else {
            write!(f, "{}/{}", self.group, self.version)
        }
    }
}

/// The self-reported type of an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }
}

impl std::fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}, Kind={}", self.group, self.version, self.kind)
    }
}

/// An unstructured object as received from a change stream or parsed from a
/// file.
///
/// Construction checks the shape once: the value is a mapping with a
/// non-empty `metadata.name`. Everything downstream relies on that.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObject {
    value: Value,
}

impl RawObject {
    pub fn from_value(value: Value) -> Result<Self, ConversionError> {
        if !value.is_object() {
            return Err(ConversionError::Malformed(format!(
                "expected a mapping at the top level, found {}",
                type_name(&value)
            )));
        }

        match value.pointer("/metadata/name") {
            Some(Value::String(name)) if !name.is_empty() => {}
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(ConversionError::MissingField("metadata.name"));
            }
            Some(other) => {
                return Err(ConversionError::Malformed(format!(
                    "metadata.name must be a string, found {}",
                    type_name(other)
                )));
            }
        }

        Ok(Self { value })
    }

    pub fn api_version(&self) -> &str {
        self.str_at("/apiVersion").unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.str_at("/kind").unwrap_or_default()
    }

    /// Group, version and kind as reported by the object itself.
    pub fn group_version_kind(&self) -> Result<GroupVersionKind, CatalogError> {
        Ok(GroupVersion::parse(self.api_version())?.with_kind(self.kind()))
    }

    pub fn name(&self) -> &str {
        self.str_at("/metadata/name").unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.str_at("/metadata/namespace").filter(|ns| !ns.is_empty())
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    fn str_at(&self, pointer: &str) -> Option<&str> {
        self.value.pointer(pointer).and_then(Value::as_str)
    }
}

impl TryFrom<Value> for RawObject {
    type Error = ConversionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

// ============================================================================
// Tests
// ============================================================================
