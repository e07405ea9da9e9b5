//! Scenario configs supplied as JSON text (CLI arguments, files).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;

use crate::core::types::ScenarioConfig;

/// JSON Schema every scenario config must satisfy.
pub const SCENARIO_CONFIG_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/scenario_config.schema.json"
));

/// Parse `raw` as a scenario config after checking it against the schema.
pub fn parse_scenario_config(raw: &str) -> Result<ScenarioConfig> {
    let instance: Value = serde_json::from_str(raw).context("parse scenario config json")?;
    validate_schema(&instance)?;
    serde_json::from_value(instance).context("decode scenario config")
}

/// Read and parse a scenario config file.
pub fn load_scenario_config(path: &Path) -> Result<ScenarioConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_scenario_config(&raw).with_context(|| format!("scenario config {}", path.display()))
}

/// Validate a JSON instance against the bundled schema (Draft 2020-12).
fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(SCENARIO_CONFIG_SCHEMA).context("parse scenario config schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
