//! Shared application state for the UI server.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use quade::app::Quade;
use quade::io::init::QuadePaths;
use quade::registry::FixtureCatalog;

use crate::pages::Pages;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub quade: Arc<Quade>,
    pub pages: Arc<Pages>,
}

impl AppState {
    pub fn new(quade: Quade) -> Result<Self> {
        Ok(Self {
            quade: Arc::new(quade),
            pages: Arc::new(Pages::new()?),
        })
    }

    /// Open the project at `project_dir` (contains `.quade/`).
    pub fn open(project_dir: &Path) -> Result<Self> {
        let paths = QuadePaths::new(project_dir);
        Self::new(Quade::open(&paths, &FixtureCatalog::builtin())?)
    }
}
