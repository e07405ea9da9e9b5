//! Name → fixture function registry.
//!
//! The registry is an explicitly constructed value: applications build one at
//! startup (usually through [`Registry::load`]) and pass it by reference to the
//! executor. Tests build isolated registries instead of patching shared state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::debug;

use crate::core::types::{Kwargs, ScenarioConfig};
use crate::core::validator::{ConfigurationError, validate_config};
use crate::store::Session;

type FixtureFn = dyn Fn(&mut Session<'_>, &Kwargs) -> Result<String> + Send + Sync;

/// A registered fixture function.
///
/// Cloning is cheap and clones share the underlying callable.
#[derive(Clone)]
pub struct Fixture {
    name: String,
    func: Arc<FixtureFn>,
}

impl Fixture {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the fixture inside its own atomic scope.
    ///
    /// Nested inside the executor's scope this is a savepoint, so a failing
    /// fixture never leaves half of its own writes behind.
    pub fn call(&self, session: &mut Session<'_>, kwargs: &Kwargs) -> Result<String> {
        session.atomic(|session| (self.func)(session, kwargs))
    }

    /// True if both handles wrap the same callable.
    pub fn same_callable(&self, other: &Fixture) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture").field("name", &self.name).finish()
    }
}

fn erase<F>(func: F) -> Arc<FixtureFn>
where
    F: Fn(&mut Session<'_>, &Kwargs) -> Result<String> + Send + Sync + 'static,
{
    Arc::new(func)
}

/// Registration function of a fixture module.
pub type ModuleInit = fn(&mut Registry);

/// Known fixture modules, addressed by dotted path.
#[derive(Debug, Clone, Default)]
pub struct FixtureCatalog {
    modules: BTreeMap<String, ModuleInit>,
}

impl FixtureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The modules shipped with this crate (`quade.fixtures`).
    pub fn builtin() -> Self {
        Self::new().with_module(crate::fixtures::MODULE_PATH, crate::fixtures::register)
    }

    pub fn with_module(mut self, path: impl Into<String>, init: ModuleInit) -> Self {
        self.modules.insert(path.into(), init);
        self
    }

    pub fn module_paths(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    fn get(&self, path: &str) -> Option<ModuleInit> {
        self.modules.get(path).copied()
    }
}

/// Loading a fixture module failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("no fixture module named '{module}' (available: {})", .available.join(", "))]
    ModuleNotFound {
        module: String,
        available: Vec<String>,
    },
}

/// The executor was asked to run a name that is not registered.
///
/// Configurations are validated on write, so this means the caller skipped
/// validation or the registry changed underneath a stored scenario.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fixture function '{name}' is not registered")]
pub struct UnregisteredFixture {
    pub name: String,
}

/// Fixture functions by name. Re-registering a name replaces the entry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    fixtures: BTreeMap<String, Fixture>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name`, overwriting any previous entry.
    ///
    /// The return value of `func` is rendered with `Display` and becomes one
    /// line of the execution report. Returns the registered handle.
    pub fn register<F, T>(&mut self, name: impl Into<String>, func: F) -> Fixture
    where
        F: Fn(&mut Session<'_>, &Kwargs) -> Result<T> + Send + Sync + 'static,
        T: fmt::Display,
    {
        let name = name.into();
        let fixture = Fixture {
            name: name.clone(),
            func: erase(move |session, kwargs| {
                func(session, kwargs).map(|output| output.to_string())
            }),
        };
        if self.fixtures.insert(name.clone(), fixture.clone()).is_some() {
            debug!(name = %name, "fixture re-registered");
        } else {
            debug!(name = %name, "fixture registered");
        }
        fixture
    }

    /// Run the registration function of `module_path` from `catalog`.
    pub fn load(&mut self, module_path: &str, catalog: &FixtureCatalog) -> Result<(), LoadError> {
        let init = catalog
            .get(module_path)
            .ok_or_else(|| LoadError::ModuleNotFound {
                module: module_path.to_string(),
                available: catalog.module_paths(),
            })?;
        let before = self.fixtures.len();
        init(self);
        debug!(
            module = module_path,
            added = self.fixtures.len().saturating_sub(before),
            total = self.fixtures.len(),
            "fixture module loaded"
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Fixture> {
        self.fixtures.get(name)
    }

    /// Like [`Registry::get`], but a missing name is an error.
    pub fn lookup(&self, name: &str) -> Result<&Fixture, UnregisteredFixture> {
        self.get(name).ok_or_else(|| UnregisteredFixture {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fixtures.contains_key(name)
    }

    /// Registered names in lexicographic order.
    pub fn registered_names(&self) -> Vec<String> {
        self.fixtures.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// Check that every function in `config` is registered.
    pub fn validate(&self, config: &ScenarioConfig) -> Result<(), ConfigurationError> {
        validate_config(config, self.fixtures.keys().map(String::as_str))
    }
}
