//! Quade configuration stored under `.quade/config.toml`, and the runtime
//! [`Settings`] built from it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::fixtures;

/// Quade configuration (TOML).
///
/// Missing fields take their defaults; unknown fields are rejected so a typo
/// does not silently fall back to a default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct QuadeConfig {
    /// Dotted path of the fixture module loaded at startup.
    pub fixtures_module: String,

    /// How the web UI dispatches `execute_test` after a submission.
    pub execution: ExecutionMode,

    /// Number of records shown on the main page.
    pub recent_records_limit: usize,

    pub allowed_envs: AllowedEnvsConfig,

    pub environment: Environment,

    pub access: AccessConfig,
}

impl Default for QuadeConfig {
    fn default() -> Self {
        Self {
            fixtures_module: fixtures::MODULE_PATH.to_string(),
            execution: ExecutionMode::default(),
            recent_records_limit: 30,
            allowed_envs: AllowedEnvsConfig::default(),
            environment: Environment::default(),
            access: AccessConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run in the request before redirecting.
    Sync,
    /// Hand off to a background worker and redirect immediately.
    #[default]
    Async,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnvMode {
    All,
    #[default]
    Debug,
    Env,
    Envs,
}

/// `[allowed_envs]`: which environments may load fixtures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AllowedEnvsConfig {
    pub mode: EnvMode,
    /// Exact environment name for `mode = "env"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Accepted environment names for `mode = "envs"`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<String>,
}

/// `[environment]`: the ambient settings the environment gate looks at.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Environment {
    pub debug: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Free-form values for programmatic predicates.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    Superusers,
    Anyone,
}

/// `[access]`: who may use the web views.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    pub mode: AccessMode,
    /// Superuser names for `mode = "superusers"`.
    pub users: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            mode: AccessMode::Superusers,
            users: vec!["admin".to_string()],
        }
    }
}

impl QuadeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fixtures_module.trim().is_empty() {
            return Err(anyhow!("fixtures_module must be a non-empty module path"));
        }
        if self.recent_records_limit == 0 {
            return Err(anyhow!("recent_records_limit must be > 0"));
        }
        match self.allowed_envs.mode {
            EnvMode::Env
                if self
                    .allowed_envs
                    .env
                    .as_deref()
                    .is_none_or(|env| env.trim().is_empty()) =>
            {
                return Err(anyhow!(
                    "allowed_envs.env must be set when allowed_envs.mode = \"env\""
                ));
            }
            EnvMode::Envs if self.allowed_envs.envs.is_empty() => {
                return Err(anyhow!(
                    "allowed_envs.envs must be a non-empty array when allowed_envs.mode = \"envs\""
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `QuadeConfig::default()`.
pub fn load_config(path: &Path) -> Result<QuadeConfig> {
    if !path.exists() {
        let cfg = QuadeConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: QuadeConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &QuadeConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

type EnvPredicate = dyn Fn(&Environment) -> bool + Send + Sync;
type UserPredicate = dyn Fn(&str) -> bool + Send + Sync;

/// Environment gate for fixture loading.
#[derive(Clone)]
pub enum AllowedEnvs {
    /// Always allowed.
    All,
    /// Allowed when `environment.debug` is set.
    Debug,
    /// Allowed when `environment.env` equals this name exactly.
    Env(String),
    /// Allowed when `environment.env` is one of these names.
    Envs(BTreeSet<String>),
    /// Arbitrary check over the environment.
    Predicate(Arc<EnvPredicate>),
}

impl AllowedEnvs {
    pub fn predicate(check: impl Fn(&Environment) -> bool + Send + Sync + 'static) -> Self {
        AllowedEnvs::Predicate(Arc::new(check))
    }

    pub fn allows(&self, environment: &Environment) -> bool {
        let env = environment.env.as_deref();
        match self {
            AllowedEnvs::All => true,
            AllowedEnvs::Debug => environment.debug,
            AllowedEnvs::Env(name) => env == Some(name.as_str()),
            AllowedEnvs::Envs(names) => env.is_some_and(|env| names.contains(env)),
            AllowedEnvs::Predicate(check) => check(environment),
        }
    }

    fn from_config(config: &AllowedEnvsConfig) -> Self {
        match config.mode {
            EnvMode::All => AllowedEnvs::All,
            EnvMode::Debug => AllowedEnvs::Debug,
            EnvMode::Env => AllowedEnvs::Env(config.env.clone().unwrap_or_default()),
            EnvMode::Envs => AllowedEnvs::Envs(config.envs.iter().cloned().collect()),
        }
    }
}

impl fmt::Debug for AllowedEnvs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllowedEnvs::All => f.write_str("All"),
            AllowedEnvs::Debug => f.write_str("Debug"),
            AllowedEnvs::Env(name) => f.debug_tuple("Env").field(name).finish(),
            AllowedEnvs::Envs(names) => f.debug_tuple("Envs").field(names).finish(),
            AllowedEnvs::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Who may use the web views.
#[derive(Clone)]
pub enum AccessPolicy {
    /// Only the named superusers.
    Superusers(BTreeSet<String>),
    Anyone,
    /// Arbitrary check over the requesting user name.
    Predicate(Arc<UserPredicate>),
}

impl AccessPolicy {
    pub fn predicate(check: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        AccessPolicy::Predicate(Arc::new(check))
    }

    /// `user` is `None` for anonymous requests.
    pub fn allows(&self, user: Option<&str>) -> bool {
        match (self, user) {
            (AccessPolicy::Anyone, _) => true,
            (_, None) => false,
            (AccessPolicy::Superusers(users), Some(user)) => users.contains(user),
            (AccessPolicy::Predicate(check), Some(user)) => check(user),
        }
    }

    fn from_config(config: &AccessConfig) -> Self {
        match config.mode {
            AccessMode::Superusers => {
                AccessPolicy::Superusers(config.users.iter().cloned().collect())
            }
            AccessMode::Anyone => AccessPolicy::Anyone,
        }
    }
}

impl fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPolicy::Superusers(users) => f.debug_tuple("Superusers").field(users).finish(),
            AccessPolicy::Anyone => f.write_str("Anyone"),
            AccessPolicy::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Resolved runtime settings. Read-only once built.
#[derive(Debug, Clone)]
pub struct Settings {
    fixtures_module: String,
    execution: ExecutionMode,
    recent_records_limit: usize,
    allowed_envs: AllowedEnvs,
    environment: Environment,
    access: AccessPolicy,
}

impl Settings {
    /// Validate `config` and resolve it into settings.
    pub fn from_config(config: &QuadeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fixtures_module: config.fixtures_module.clone(),
            execution: config.execution,
            recent_records_limit: config.recent_records_limit,
            allowed_envs: AllowedEnvs::from_config(&config.allowed_envs),
            environment: config.environment.clone(),
            access: AccessPolicy::from_config(&config.access),
        })
    }

    /// Replace the environment gate. Only available before the settings are shared.
    pub fn with_allowed_envs(mut self, allowed_envs: AllowedEnvs) -> Self {
        self.allowed_envs = allowed_envs;
        self
    }

    pub fn with_access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Whether fixtures may be loaded in the current environment.
    pub fn allowed(&self) -> bool {
        self.allowed_envs.allows(&self.environment)
    }

    pub fn fixtures_module(&self) -> &str {
        &self.fixtures_module
    }

    pub fn execution(&self) -> ExecutionMode {
        self.execution
    }

    pub fn recent_records_limit(&self) -> usize {
        self.recent_records_limit
    }

    pub fn allowed_envs(&self) -> &AllowedEnvs {
        &self.allowed_envs
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn access(&self) -> &AccessPolicy {
        &self.access
    }
}

impl Default for Settings {
    fn default() -> Self {
        let config = QuadeConfig::default();
        Self {
            fixtures_module: config.fixtures_module,
            execution: config.execution,
            recent_records_limit: config.recent_records_limit,
            allowed_envs: AllowedEnvs::from_config(&config.allowed_envs),
            environment: config.environment,
            access: AccessPolicy::from_config(&config.access),
        }
    }
}
