//! Application context: settings, the fixture registry and the database.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::fixtures;
use crate::io::config::{Settings, load_config};
use crate::io::init::QuadePaths;
use crate::models::{ModelError, Record};
use crate::records;
use crate::registry::{FixtureCatalog, LoadError, Registry};
use crate::scenarios;
use crate::store::{ContentTypes, Database, Id, Session, StoreError, Stored};

/// Content types of the objects fixtures create.
///
/// Scenarios and records are read through their typed tables; only rows
/// reached through an `ObjectRef` need a describer.
pub fn default_content_types() -> ContentTypes {
    let mut types = ContentTypes::default();
    fixtures::register_models(&mut types);
    types
}

/// Everything a request or command needs to run scenarios.
pub struct Quade {
    settings: Settings,
    registry: Registry,
    database: Database,
}

impl Quade {
    /// Assemble from an explicit registry, skipping the environment gate.
    pub fn new(settings: Settings, registry: Registry, database: Database) -> Self {
        Self {
            settings,
            registry,
            database,
        }
    }

    /// Load the configured fixture module when the environment allows it.
    ///
    /// In a disallowed environment the registry stays empty: scenarios and
    /// records can still be read, but nothing can be configured or executed.
    pub fn bootstrap(
        settings: Settings,
        catalog: &FixtureCatalog,
        database: Database,
    ) -> Result<Self, LoadError> {
        let mut registry = Registry::new();
        if settings.allowed() {
            registry.load(settings.fixtures_module(), catalog)?;
            info!(
                module = settings.fixtures_module(),
                fixtures = registry.len(),
                "fixtures loaded"
            );
        } else {
            warn!(
                allowed_envs = ?settings.allowed_envs(),
                "environment not allowed; fixtures not loaded"
            );
        }
        Ok(Self::new(settings, registry, database))
    }

    /// Read `.quade/config.toml`, open `.quade/db.json` and bootstrap.
    pub fn open(paths: &QuadePaths, catalog: &FixtureCatalog) -> Result<Self> {
        let config = load_config(&paths.config_path)?;
        let settings = Settings::from_config(&config)?;
        let database = Database::open(&paths.database_path, default_content_types())
            .with_context(|| format!("open database {}", paths.database_path.display()))?;
        Ok(Self::bootstrap(settings, catalog, database)?)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn session(&self) -> Result<Session<'_>, StoreError> {
        self.database.session()
    }

    /// Create a record for the active scenario `slug`.
    pub fn submit(&self, slug: &str, created_by: &str) -> Result<Stored<Record>, ModelError> {
        let mut session = self.session()?;
        let scenario = scenarios::find(&session, slug)?;
        if !scenario.is_active() {
            return Err(ModelError::InactiveScenario(slug.to_string()));
        }
        records::create(&mut session, scenario.id, created_by)
    }

    /// Run `execute_test` for `record_id` on a fresh session.
    pub fn execute(&self, record_id: Id) -> Result<Stored<Record>> {
        let mut session = self.session()?;
        records::execute_test(&mut session, &self.registry, record_id)
    }
}
