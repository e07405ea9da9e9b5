//! Runs a scenario configuration against a registry.

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::types::ScenarioConfig;
use crate::registry::Registry;
use crate::store::Session;

/// Execute every step of `config` in order and return the report.
///
/// Each step's output is one line; lines are joined with `\n` and there is no
/// trailing newline. The whole run is one atomic scope: if any step fails,
/// writes from every earlier step are rolled back and the step's error is
/// returned as is.
#[instrument(skip_all, fields(steps = config.len()))]
pub fn execute(
    registry: &Registry,
    session: &mut Session<'_>,
    config: &ScenarioConfig,
) -> Result<String> {
    session.atomic(|session| -> Result<String> {
        let mut lines = Vec::with_capacity(config.len());
        for (index, step) in config.steps().iter().enumerate() {
            let fixture = registry.lookup(&step.function)?;
            debug!(index, function = %step.function, "running step");
            lines.push(fixture.call(session, &step.kwargs)?);
        }
        Ok(lines.join("\n"))
    })
}
