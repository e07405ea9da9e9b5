//! HTTP route handlers.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use quade::io::config::ExecutionMode;
use quade::models::ModelError;
use quade::records;
use quade::store::{Id, StoreError};
use quade::tasks::execute_test_task;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::pages::MainPage;
use crate::state::AppState;

/// Header carrying the authenticated user name, set by the fronting proxy.
pub const USER_HEADER: &str = "x-remote-user";

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(main_page).post(submit))
        .route("/record/{id}/done/", post(mark_done))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct ExecuteForm {
    #[serde(default)]
    pub scenarios: Option<String>,
}

/// GET / - recent records and the execute form.
pub async fn main_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, StatusCode> {
    let user = authorize(&state, &headers)?;
    blocking(&state, move |state| render(state, &user, None))
        .await
        .map(Html)
}

/// POST / - create a record for the chosen scenario and dispatch its execution.
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ExecuteForm>,
) -> Result<Response, StatusCode> {
    let user = authorize(&state, &headers)?;
    if !state.quade.settings().allowed() {
        return invalid(&state, user, "Quade is not enabled in this environment.".to_string()).await;
    }
    let slug = form.scenarios.as_deref().map(str::trim).unwrap_or_default().to_string();
    if slug.is_empty() {
        return invalid(&state, user, "This field is required.".to_string()).await;
    }

    let submitted = {
        let (slug, user) = (slug.clone(), user.clone());
        blocking(&state, move |state| Ok(state.quade.submit(&slug, &user))).await?
    };
    let record = match submitted {
        Ok(record) => record,
        Err(err @ (ModelError::UnknownScenario(_) | ModelError::InactiveScenario(_))) => {
            return invalid(&state, user, format!("Select a valid choice. {err}.")).await;
        }
        Err(err) => return Err(internal(err)),
    };
    info!(record = %record.id, slug = %slug, user = %user, "record submitted");
    dispatch(&state, record.id).await;
    Ok(Redirect::to("/").into_response())
}

/// POST /record/{id}/done/ - operator sign-off.
pub async fn mark_done(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Redirect, StatusCode> {
    authorize(&state, &headers)?;
    blocking(&state, move |state| {
        let mut session = state.quade.session().map_err(internal)?;
        match records::mark_done(&mut session, Id(id)) {
            Ok(_) => Ok(Redirect::to("/")),
            Err(ModelError::Store(StoreError::NotFound { .. })) => Err(StatusCode::NOT_FOUND),
            Err(err) => Err(internal(err)),
        }
    })
    .await
}

/// Run database work on the blocking pool; a session may wait on a running scenario.
async fn blocking<T, F>(state: &AppState, work: F) -> Result<T, StatusCode>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> Result<T, StatusCode> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || work(&state))
        .await
        .map_err(internal)?
}

/// Hand `execute_test` to a blocking worker; wait for it in sync mode.
async fn dispatch(state: &AppState, record: Id) {
    let quade = Arc::clone(&state.quade);
    let job = tokio::task::spawn_blocking(move || execute_test_task(&quade, record));
    match state.quade.settings().execution() {
        ExecutionMode::Async => info!(record = %record, "execute_test dispatched"),
        ExecutionMode::Sync => {
            if let Err(err) = job.await {
                error!(record = %record, error = %err, "execute_test worker panicked");
            }
        }
    }
}

/// Resolve the requesting user and check the access policy.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<String, StatusCode> {
    let user = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if !state.quade.settings().access().allows(user) {
        warn!(user = user.unwrap_or("<anonymous>"), "access denied");
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(user.unwrap_or("anonymous").to_string())
}

fn render(state: &AppState, user: &str, error: Option<String>) -> Result<String, StatusCode> {
    let page = MainPage::load(&state.quade, user, error).map_err(internal)?;
    state.pages.render_main(&page).map_err(internal)
}

async fn invalid(state: &AppState, user: String, message: String) -> Result<Response, StatusCode> {
    let page = blocking(state, move |state| render(state, &user, Some(message))).await?;
    Ok((StatusCode::BAD_REQUEST, Html(page)).into_response())
}

fn internal(err: impl std::fmt::Display) -> StatusCode {
    error!(error = %err, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}
