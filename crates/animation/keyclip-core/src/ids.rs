//! Identifiers for engines and clips.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-assigned engine identifier, used to tell engines apart in logs and outputs.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A clip is identified by its name within a layer.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ClipKey {
    pub layer: String,
    pub name: String,
}

impl ClipKey {
    pub fn new(layer: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ClipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.name)
    }
}
