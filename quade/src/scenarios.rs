//! Scenario operations: creation, config edits, status toggles and deletion.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::core::types::{ScenarioConfig, ScenarioStatus};
use crate::models::{ModelError, Record, Scenario, now};
use crate::registry::Registry;
use crate::store::{Session, Stored};

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug pattern"));

/// Fields of a scenario that is about to be created.
#[derive(Debug, Clone)]
pub struct NewScenario {
    pub slug: String,
    pub description: String,
    pub config: ScenarioConfig,
    pub status: ScenarioStatus,
}

impl NewScenario {
    /// An active scenario.
    pub fn new(
        slug: impl Into<String>,
        description: impl Into<String>,
        config: ScenarioConfig,
    ) -> Self {
        Self {
            slug: slug.into(),
            description: description.into(),
            config,
            status: ScenarioStatus::Active,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.status = ScenarioStatus::Inactive;
        self
    }
}

/// Validate and insert a new scenario.
pub fn create(
    session: &mut Session<'_>,
    registry: &Registry,
    new: NewScenario,
) -> Result<Stored<Scenario>, ModelError> {
    check_slug(&new.slug)?;
    if get_by_slug(session, &new.slug)?.is_some() {
        return Err(ModelError::validation(
            "slug",
            format!("scenario with slug '{}' already exists", new.slug),
        ));
    }
    check_config(registry, &new.config)?;
    let stamp = now();
    let stored = session.insert(Scenario {
        slug: new.slug,
        status: new.status,
        config: new.config,
        description: new.description,
        created_on: stamp,
        updated_on: stamp,
    })?;
    info!(id = %stored.id, slug = %stored.slug, "scenario created");
    Ok(stored)
}

/// Replace the config of `slug` after validating it against `registry`.
pub fn update_config(
    session: &mut Session<'_>,
    registry: &Registry,
    slug: &str,
    config: ScenarioConfig,
) -> Result<Stored<Scenario>, ModelError> {
    let mut scenario = find(session, slug)?;
    check_config(registry, &config)?;
    scenario.config = config;
    save(session, &mut scenario)?;
    Ok(scenario)
}

pub fn activate(session: &mut Session<'_>, slug: &str) -> Result<Stored<Scenario>, ModelError> {
    set_status(session, slug, ScenarioStatus::Active)
}

pub fn deactivate(session: &mut Session<'_>, slug: &str) -> Result<Stored<Scenario>, ModelError> {
    set_status(session, slug, ScenarioStatus::Inactive)
}

/// Soft delete: the scenario is kept but can no longer start records.
pub fn delete(session: &mut Session<'_>, slug: &str) -> Result<Stored<Scenario>, ModelError> {
    deactivate(session, slug)
}

/// Remove the row. Refused while any record references the scenario.
pub fn hard_delete(session: &mut Session<'_>, slug: &str) -> Result<(), ModelError> {
    let scenario = find(session, slug)?;
    let records = session
        .all::<Record>()?
        .iter()
        .filter(|record| record.scenario == scenario.id)
        .count();
    if records > 0 {
        return Err(ModelError::Protected {
            slug: slug.to_string(),
            records,
        });
    }
    session.delete::<Scenario>(scenario.id)?;
    info!(id = %scenario.id, slug, "scenario hard deleted");
    Ok(())
}

pub fn get_by_slug(
    session: &Session<'_>,
    slug: &str,
) -> Result<Option<Stored<Scenario>>, ModelError> {
    Ok(session
        .all::<Scenario>()?
        .into_iter()
        .find(|scenario| scenario.slug == slug))
}

/// Like [`get_by_slug`], but a missing slug is an error.
pub fn find(session: &Session<'_>, slug: &str) -> Result<Stored<Scenario>, ModelError> {
    get_by_slug(session, slug)?.ok_or_else(|| ModelError::UnknownScenario(slug.to_string()))
}

/// Active scenarios ordered by description.
pub fn active(session: &Session<'_>) -> Result<Vec<Stored<Scenario>>, ModelError> {
    let mut scenarios: Vec<_> = all(session)?
        .into_iter()
        .filter(|scenario| scenario.is_active())
        .collect();
    scenarios.sort_by(|a, b| a.description.cmp(&b.description).then(a.id.cmp(&b.id)));
    Ok(scenarios)
}

/// Every scenario in id order.
pub fn all(session: &Session<'_>) -> Result<Vec<Stored<Scenario>>, ModelError> {
    Ok(session.all::<Scenario>()?)
}

fn set_status(
    session: &mut Session<'_>,
    slug: &str,
    status: ScenarioStatus,
) -> Result<Stored<Scenario>, ModelError> {
    let mut scenario = find(session, slug)?;
    scenario.status = status;
    save(session, &mut scenario)?;
    info!(id = %scenario.id, slug, status = %status, "scenario status changed");
    Ok(scenario)
}

fn save(session: &mut Session<'_>, scenario: &mut Stored<Scenario>) -> Result<(), ModelError> {
    scenario.updated_on = now();
    session.update(scenario)?;
    Ok(())
}

fn check_slug(slug: &str) -> Result<(), ModelError> {
    if SLUG.is_match(slug) {
        return Ok(());
    }
    Err(ModelError::validation(
        "slug",
        format!("'{slug}' must consist of letters, numbers, underscores or hyphens"),
    ))
}

fn check_config(registry: &Registry, config: &ScenarioConfig) -> Result<(), ModelError> {
    registry.validate(config).map_err(|err| {
        ModelError::validation(
            "config",
            format!(
                "config {} contains unregistered function(s): {}",
                err.config,
                err.joined_names()
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, steps};

    fn nice(config: ScenarioConfig) -> NewScenario {
        NewScenario::new("nice", "A Nice Test", config)
    }

    #[test]
    fn create_persists_active_scenario() {
        let db = test_support::database();
        let registry = test_support::people_registry();
        let mut session = db.session().expect("session");
        let scenario = create(&mut session, &registry, nice(steps(&["customer"]))).expect("create");
        assert!(scenario.is_active());
        assert_eq!(scenario.to_string(), "#1: A Nice Test");
        assert_eq!(
            find(&session, "nice").expect("find").config,
            steps(&["customer"])
        );
    }

    /// Rejected writes list every missing name and persist nothing.
    #[test]
    fn unregistered_functions_are_rejected() {
        let db = test_support::database();
        let registry = test_support::people_registry();
        let mut session = db.session().expect("session");
        let config = steps(&["zeta", "customer", "alpha"]);
        let err = create(&mut session, &registry, nice(config)).unwrap_err();
        match err {
            ModelError::Validation { field, message } => {
                assert_eq!(field, "config");
                assert_eq!(
                    message,
                    r#"config [["zeta",{}],["customer",{}],["alpha",{}]] contains unregistered function(s): alpha,zeta"#
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(all(&session).expect("all").len(), 0);
    }

    #[test]
    fn update_config_revalidates() {
        let db = test_support::database();
        let registry = test_support::people_registry();
        let mut session = db.session().expect("session");
        create(&mut session, &registry, nice(steps(&["customer"]))).expect("create");

        let err = update_config(&mut session, &registry, "nice", steps(&["ghost"])).unwrap_err();
        assert!(matches!(err, ModelError::Validation { field: "config", .. }));
        assert_eq!(
            find(&session, "nice").expect("find").config,
            steps(&["customer"])
        );

        let updated = update_config(
            &mut session,
            &registry,
            "nice",
            steps(&["customer", "staff_user"]),
        )
        .expect("update");
        assert_eq!(updated.config.len(), 2);
    }

    #[test]
    fn slug_must_be_valid_and_unique() {
        let db = test_support::database();
        let registry = test_support::people_registry();
        let mut session = db.session().expect("session");
        let bad = NewScenario::new("no spaces", "x", steps(&["customer"]));
        assert!(matches!(
            create(&mut session, &registry, bad).unwrap_err(),
            ModelError::Validation { field: "slug", .. }
        ));
        let empty = NewScenario::new("", "x", steps(&["customer"]));
        assert!(create(&mut session, &registry, empty).is_err());

        create(&mut session, &registry, nice(steps(&["customer"]))).expect("create");
        assert!(matches!(
            create(&mut session, &registry, nice(steps(&["customer"]))).unwrap_err(),
            ModelError::Validation { field: "slug", .. }
        ));
    }

    #[test]
    fn activate_deactivate_and_soft_delete() {
        let db = test_support::database();
        let registry = test_support::people_registry();
        let mut session = db.session().expect("session");
        create(&mut session, &registry, nice(steps(&["customer"]))).expect("create");

        assert!(!deactivate(&mut session, "nice").expect("deactivate").is_active());
        assert!(activate(&mut session, "nice").expect("activate").is_active());
        let deleted = delete(&mut session, "nice").expect("delete");
        assert_eq!(deleted.status, ScenarioStatus::Inactive);
        assert!(get_by_slug(&session, "nice").expect("get").is_some());
    }

    #[test]
    fn active_is_ordered_by_description() {
        let db = test_support::database();
        let registry = test_support::people_registry();
        let mut session = db.session().expect("session");
        for (slug, description) in [("c", "Charlie"), ("a", "Alpha"), ("b", "Bravo")] {
            create(
                &mut session,
                &registry,
                NewScenario::new(slug, description, steps(&["customer"])),
            )
            .expect("create");
        }
        deactivate(&mut session, "b").expect("deactivate");

        let descriptions: Vec<String> = active(&session)
            .expect("active")
            .into_iter()
            .map(|scenario| scenario.model.description)
            .collect();
        assert_eq!(descriptions, vec!["Alpha", "Charlie"]);
    }

    #[test]
    fn hard_delete_is_blocked_by_records() {
        let db = test_support::database();
        let registry = test_support::people_registry();
        let mut session = db.session().expect("session");
        let scenario =
            create(&mut session, &registry, nice(steps(&["customer"]))).expect("create");
        let record = crate::records::create(&mut session, scenario.id, "admin").expect("record");

        let err = hard_delete(&mut session, "nice").unwrap_err();
        assert!(matches!(err, ModelError::Protected { records: 1, .. }));

        crate::records::delete(&mut session, record.id).expect("delete record");
        hard_delete(&mut session, "nice").expect("hard delete");
        assert!(get_by_slug(&session, "nice").expect("get").is_none());
    }

    #[test]
    fn unknown_slug_is_reported() {
        let db = test_support::database();
        let mut session = db.session().expect("session");
        assert!(matches!(
            activate(&mut session, "ghost").unwrap_err(),
            ModelError::UnknownScenario(slug) if slug == "ghost"
        ));
    }
}
