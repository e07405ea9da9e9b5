//! Persisted entities: scenarios, execution records and recorded objects.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{RecordStatus, ScenarioConfig, ScenarioStatus};
use crate::store::{Id, Model, ObjectRef, StoreError, Stored};

/// A named, reusable template of ordered fixture invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub slug: String,
    pub status: ScenarioStatus,
    pub config: ScenarioConfig,
    pub description: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Model for Scenario {
    const TABLE: &'static str = "scenario";
}

impl Scenario {
    pub fn is_active(&self) -> bool {
        self.status == ScenarioStatus::Active
    }
}

impl fmt::Display for Stored<Scenario> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}: {}", self.id, self.model.description)
    }
}

/// One execution attempt of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub scenario: Id,
    /// Execution report on success, rendered error on failure.
    pub instructions: Option<String>,
    pub status: RecordStatus,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl Model for Record {
    const TABLE: &'static str = "record";
}

impl fmt::Display for Stored<Record> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record #{} ({})", self.id, self.model.status)
    }
}

/// Audit link between a record and an object created while it executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedObject {
    pub record: Id,
    #[serde(flatten)]
    pub object: ObjectRef,
}

impl Model for RecordedObject {
    const TABLE: &'static str = "recorded_object";
}

/// Errors from scenario and record operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A field value was rejected; nothing was written.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("scenario '{slug}' is referenced by {records} record(s) and cannot be deleted")]
    Protected { slug: String, records: usize },

    #[error("no scenario with slug '{0}'")]
    UnknownScenario(String),

    #[error("scenario '{0}' is not active")]
    InactiveScenario(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ModelError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ModelError::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Current time for `created_on` / `updated_on` stamps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}
