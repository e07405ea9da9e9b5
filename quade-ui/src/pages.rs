//! HTML rendering of the main page.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use quade::app::Quade;
use quade::core::types::RecordStatus;
use quade::models::Scenario;
use quade::records;
use quade::scenarios;
use serde::Serialize;

const MAIN_TEMPLATE: &str = include_str!("../templates/main.html");

/// Template engine wrapper around minijinja.
pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("main.html", MAIN_TEMPLATE)
            .context("main template")?;
        Ok(Self { env })
    }

    pub fn render_main(&self, page: &MainPage) -> Result<String> {
        let template = self.env.get_template("main.html")?;
        let rendered = template.render(context! {
            user => page.user,
            allowed => page.allowed,
            error => page.error,
            scenarios => page.scenarios,
            records => page.records,
        })?;
        Ok(rendered)
    }
}

/// An active scenario offered in the execute form.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioChoice {
    pub slug: String,
    pub label: String,
}

/// One row of the recent records table.
#[derive(Debug, Clone, Serialize)]
pub struct RecordRow {
    pub id: u64,
    pub scenario: String,
    pub status: &'static str,
    pub status_label: &'static str,
    pub instructions: String,
    pub recorded_objects: usize,
    pub created_by: String,
    pub created_on: String,
    pub can_mark_done: bool,
}

/// Everything the main page shows.
#[derive(Debug, Clone, Serialize)]
pub struct MainPage {
    pub user: String,
    pub allowed: bool,
    pub error: Option<String>,
    /// Empty when there is nothing to execute; the form is then omitted.
    pub scenarios: Vec<ScenarioChoice>,
    pub records: Vec<RecordRow>,
}

impl MainPage {
    pub fn load(quade: &Quade, user: &str, error: Option<String>) -> Result<Self> {
        let session = quade.session()?;
        let scenarios = scenarios::active(&session)?
            .into_iter()
            .map(|scenario| ScenarioChoice {
                label: scenario.to_string(),
                slug: scenario.model.slug,
            })
            .collect();

        let limit = quade.settings().recent_records_limit();
        let mut rows = Vec::new();
        for record in records::recent(&session, limit)? {
            let scenario = session
                .get::<Scenario>(record.scenario)?
                .map_or_else(|| format!("#{}", record.scenario), |s| s.to_string());
            rows.push(RecordRow {
                id: record.id.0,
                scenario,
                status: record.status.as_str(),
                status_label: record.status.label(),
                instructions: record.instructions.clone().unwrap_or_default(),
                recorded_objects: records::recorded_objects(&session, record.id)?.len(),
                created_by: record.created_by.clone(),
                created_on: record.created_on.format("%Y-%m-%d %H:%M").to_string(),
                can_mark_done: record.status != RecordStatus::Done,
            });
        }

        Ok(Self {
            user: user.to_string(),
            allowed: quade.settings().allowed(),
            error,
            scenarios,
            records: rows,
        })
    }
}
