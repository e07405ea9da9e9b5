//! Test-only builders for databases, registries, scenarios and records.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use thiserror::Error;

use crate::core::types::{Kwargs, ScenarioConfig, Step};
use crate::io::config::{QuadeConfig, write_config};
use crate::io::init::{InitOptions, QuadePaths, init_quade};
use crate::models::{self, Record};
use crate::registry::Registry;
use crate::scenarios::{self, NewScenario};
use crate::store::{Database, Model, Session, Stored};
use crate::{fixtures, records};

/// Minimal model for exercising the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    pub name: String,
}

impl Widget {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Model for Widget {
    const TABLE: &'static str = "widget";
}

impl fmt::Display for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Widget {}", self.name)
    }
}

/// Error raised by the `explode` fixture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FixtureFailure(pub String);

/// In-memory database that renders users and widgets.
pub fn database() -> Database {
    let mut types = crate::app::default_content_types();
    types.register::<Widget>();
    Database::in_memory(types)
}

/// The builtin people fixtures plus:
///
/// - `explode`: fails with `FixtureFailure("boom")`
/// - `two_widgets`: creates two widgets
pub fn people_registry() -> Registry {
    let mut registry = Registry::new();
    fixtures::register(&mut registry);
    registry.register("explode", |_, _| -> anyhow::Result<&'static str> {
        Err(FixtureFailure("boom".to_string()).into())
    });
    registry.register("two_widgets", |session, _| -> anyhow::Result<String> {
        let first = session.insert(Widget::named("left"))?;
        let second = session.insert(Widget::named("right"))?;
        Ok(format!("{} and {}", first.model, second.model))
    });
    registry
}

/// Config calling each of `names` with no keyword arguments.
pub fn steps(names: &[&str]) -> ScenarioConfig {
    names
        .iter()
        .map(|name| Step::new(*name, Kwargs::new()))
        .collect()
}

/// Create an active scenario named after `slug`.
pub fn scenario(
    session: &mut Session<'_>,
    registry: &Registry,
    slug: &str,
    names: &[&str],
) -> Stored<models::Scenario> {
    scenarios::create(
        session,
        registry,
        NewScenario::new(slug, format!("{slug} scenario"), steps(names)),
    )
    .expect("create scenario")
}

/// Create a fresh scenario for `names` and a `NOT_READY` record for it.
pub fn record(session: &mut Session<'_>, registry: &Registry, names: &[&str]) -> Stored<Record> {
    let slug = format!("scenario-{}", session.count::<models::Scenario>() + 1);
    let scenario = scenario(session, registry, &slug, names);
    records::create(session, scenario.id, "admin").expect("create record")
}

/// A temporary project directory with an initialized `.quade/`.
pub struct TempProject {
    dir: TempDir,
}

impl TempProject {
    pub fn new() -> Self {
        Self::with_config(&QuadeConfig::default())
    }

    pub fn with_config(config: &QuadeConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = init_quade(dir.path(), &InitOptions { force: false }).expect("init");
        write_config(&paths.config_path, config).expect("write config");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn paths(&self) -> QuadePaths {
        QuadePaths::new(self.dir.path())
    }

    pub fn database_path(&self) -> PathBuf {
        self.paths().database_path
    }
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}
