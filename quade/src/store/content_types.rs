//! Polymorphic object references and the content-type registry that renders them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Id, Model};

/// Reference to a row of any table: `{content_type, object_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub content_type: String,
    pub object_id: Id,
}

impl ObjectRef {
    pub fn new(content_type: impl Into<String>, object_id: Id) -> Self {
        Self {
            content_type: content_type.into(),
            object_id,
        }
    }

    pub fn of<M: Model>(object_id: Id) -> Self {
        Self::new(M::TABLE, object_id)
    }

    pub fn is<M: Model>(&self) -> bool {
        self.content_type == M::TABLE
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.content_type, self.object_id)
    }
}

type Describe = fn(&Value) -> Option<String>;

/// Maps a content type tag to a typed describer for its rows.
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    describers: BTreeMap<&'static str, Describe>,
}

impl ContentTypes {
    /// Register `M` so its rows render through `M`'s `Display`.
    pub fn register<M: Model + fmt::Display>(&mut self) -> &mut Self {
        self.describers.insert(M::TABLE, describe::<M>);
        self
    }

    pub fn with<M: Model + fmt::Display>(mut self) -> Self {
        self.register::<M>();
        self
    }

    pub fn is_registered(&self, content_type: &str) -> bool {
        self.describers.contains_key(content_type)
    }

    /// Render a row; unknown or malformed rows fall back to the reference itself.
    pub fn describe(&self, object: &ObjectRef, value: &Value) -> String {
        self.describers
            .get(object.content_type.as_str())
            .and_then(|describe| describe(value))
            .unwrap_or_else(|| object.to_string())
    }
}

fn describe<M: Model + fmt::Display>(value: &Value) -> Option<String> {
    serde_json::from_value::<M>(value.clone())
        .ok()
        .map(|model| model.to_string())
}
