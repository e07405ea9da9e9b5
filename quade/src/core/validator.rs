//! Scenario configuration validation against the set of registered names.
//!
//! Reports every unregistered function name at once so a broken scenario can be
//! fixed in a single edit.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::types::ScenarioConfig;

/// A scenario configuration references functions that are not registered.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "scenario config references unregistered function(s): {}",
    join_names(.unregistered)
)]
pub struct ConfigurationError {
    /// Every referenced name missing from the registry (sorted, deduplicated).
    pub unregistered: BTreeSet<String>,
    /// The configuration that failed validation.
    pub config: ScenarioConfig,
}

impl ConfigurationError {
    /// Missing names joined with `,` in sorted order.
    pub fn joined_names(&self) -> String {
        join_names(&self.unregistered)
    }
}

/// Validate that every function named in `config` is in `registered`.
///
/// Does not stop at the first missing name: the error carries the full set
/// difference `config names - registered names`.
pub fn validate_config<'a>(
    config: &ScenarioConfig,
    registered: impl IntoIterator<Item = &'a str>,
) -> Result<(), ConfigurationError> {
    let referenced: BTreeSet<&str> = config.function_names().collect();
    let registered: BTreeSet<&str> = registered.into_iter().collect();
    let unregistered: BTreeSet<String> = referenced
        .difference(&registered)
        .map(|name| (*name).to_string())
        .collect();
    if unregistered.is_empty() {
        return Ok(());
    }
    Err(ConfigurationError {
        unregistered,
        config: config.clone(),
    })
}

fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Kwargs, Step};

    fn config(names: &[&str]) -> ScenarioConfig {
        names
            .iter()
            .map(|name| Step::new(*name, Kwargs::new()))
            .collect()
    }

    #[test]
    fn registered_names_pass() {
        let config = config(&["customer", "staff_user", "customer"]);
        validate_config(&config, ["customer", "staff_user"]).expect("valid");
    }

    #[test]
    fn empty_config_is_valid() {
        validate_config(&ScenarioConfig::default(), []).expect("valid");
    }

    /// The error reports the full set difference, not only the first miss.
    #[test]
    fn reports_every_unregistered_name() {
        let config = config(&["ghost", "customer", "phantom", "ghost", "staff_user"]);
        let err = validate_config(&config, ["customer", "staff_user"]).unwrap_err();
        let expected: BTreeSet<String> = ["ghost", "phantom"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(err.unregistered, expected);
        assert_eq!(err.config, config);
        assert_eq!(err.joined_names(), "ghost,phantom");
        assert_eq!(
            err.to_string(),
            "scenario config references unregistered function(s): ghost,phantom"
        );
    }

    #[test]
    fn nothing_registered_rejects_everything() {
        let config = config(&["customer"]);
        let err = validate_config(&config, []).unwrap_err();
        assert_eq!(err.joined_names(), "customer");
    }
}
