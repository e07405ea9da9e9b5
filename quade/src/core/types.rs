//! Shared deterministic types for scenario configuration and status tracking.
//!
//! These types define stable contracts between the engine components and the
//! persisted data. They do not depend on external state or I/O.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keyword arguments passed to a fixture function (a JSON object).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kwargs(Map<String, Value>);

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful in tests and fixture catalogs.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserialize the arguments into a typed argument struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for Kwargs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One `[function_name, kwargs]` pair of a scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStep", into = "RawStep")]
pub struct Step {
    pub function: String,
    pub kwargs: Kwargs,
}

impl Step {
    pub fn new(function: impl Into<String>, kwargs: Kwargs) -> Self {
        Self {
            function: function.into(),
            kwargs,
        }
    }
}

/// Wire form of a step: a two-element JSON array.
#[derive(Serialize, Deserialize)]
struct RawStep(String, Kwargs);

impl From<RawStep> for Step {
    fn from(raw: RawStep) -> Self {
        Self {
            function: raw.0,
            kwargs: raw.1,
        }
    }
}

impl From<Step> for RawStep {
    fn from(step: Step) -> Self {
        RawStep(step.function, step.kwargs)
    }
}

/// Ordered fixture invocations. Order is the dependency order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioConfig(Vec<Step>);

impl ScenarioConfig {
    pub fn new(steps: Vec<Step>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Function names in step order (duplicates preserved).
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|step| step.function.as_str())
    }
}

impl FromIterator<Step> for ScenarioConfig {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Compact JSON, e.g. `[["customer",{}]]`.
impl fmt::Display for ScenarioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Scenario availability. Only active scenarios can start new records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Inactive,
    #[default]
    Active,
}

impl ScenarioStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioStatus::Inactive => "inactive",
            ScenarioStatus::Active => "active",
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status of a record.
///
/// Ordered by [`RecordStatus::code`], which keeps the historical numbering
/// (`FAILED < NOT_READY < READY < IN_PROGRESS < DONE`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Failed,
    #[default]
    NotReady,
    Ready,
    InProgress,
    Done,
}

impl RecordStatus {
    pub fn code(self) -> i32 {
        match self {
            RecordStatus::Failed => -10,
            RecordStatus::NotReady => -1,
            RecordStatus::Ready => 1,
            RecordStatus::InProgress => 10,
            RecordStatus::Done => 20,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Failed => "failed",
            RecordStatus::NotReady => "not_ready",
            RecordStatus::Ready => "ready",
            RecordStatus::InProgress => "in_progress",
            RecordStatus::Done => "done",
        }
    }

    /// Display label, e.g. `Not Ready`.
    pub fn label(self) -> &'static str {
        match self {
            RecordStatus::Failed => "Failed",
            RecordStatus::NotReady => "Not Ready",
            RecordStatus::Ready => "Ready",
            RecordStatus::InProgress => "In Progress",
            RecordStatus::Done => "Done",
        }
    }
}

impl PartialOrd for RecordStatus {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordStatus {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.code().cmp(&other.code())
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_parses_array_of_pairs() {
        let raw = json!([
            ["customer", {}],
            ["staff_user", {"first_name": "Baron", "last_name": "von Count"}]
        ]);
        let config: ScenarioConfig = serde_json::from_value(raw).expect("parse");
        assert_eq!(config.len(), 2);
        assert_eq!(config.steps()[0].function, "customer");
        assert!(config.steps()[0].kwargs.is_empty());
        assert_eq!(
            config.steps()[1].kwargs.get("last_name"),
            Some(&json!("von Count"))
        );
    }

    #[test]
    fn config_display_is_compact_json() {
        let config = ScenarioConfig::new(vec![
            Step::new("does_not_exist", Kwargs::new()),
            Step::new("staff_user", Kwargs::new().with("first_name", "Baron")),
        ]);
        assert_eq!(
            config.to_string(),
            r#"[["does_not_exist",{}],["staff_user",{"first_name":"Baron"}]]"#
        );
    }

    #[test]
    fn step_rejects_wrong_arity() {
        let err = serde_json::from_value::<ScenarioConfig>(json!([["customer"]]));
        assert!(err.is_err());
    }

    #[test]
    fn kwargs_parse_into_typed_struct() {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Args {
            first_name: String,
        }

        let kwargs = Kwargs::new().with("first_name", "Baron");
        let args: Args = kwargs.parse().expect("parse");
        assert_eq!(args.first_name, "Baron");

        let unexpected = Kwargs::new().with("nickname", "B");
        assert!(unexpected.parse::<Args>().is_err());
    }

    /// Status ordering follows the numeric codes, not declaration order.
    #[test]
    fn record_status_orders_by_code() {
        assert!(RecordStatus::Failed < RecordStatus::NotReady);
        assert!(RecordStatus::NotReady < RecordStatus::Ready);
        assert!(RecordStatus::Ready < RecordStatus::InProgress);
        assert!(RecordStatus::InProgress < RecordStatus::Done);
        assert_eq!(RecordStatus::default(), RecordStatus::NotReady);
        assert_eq!(ScenarioStatus::default(), ScenarioStatus::Active);
    }
}
