//! Record operations and the execution entry point.

use anyhow::Result;
use tracing::{error, info, instrument, warn};

use crate::core::fsm::{RecordEvent, transition};
use crate::core::types::RecordStatus;
use crate::executor;
use crate::models::{ModelError, Record, RecordedObject, Scenario, now};
use crate::observer::CreationObserver;
use crate::registry::Registry;
use crate::store::{Id, Session, Stored};

/// Create a `NOT_READY` record for an existing scenario.
pub fn create(
    session: &mut Session<'_>,
    scenario: Id,
    created_by: &str,
) -> Result<Stored<Record>, ModelError> {
    session.fetch::<Scenario>(scenario)?;
    let stamp = now();
    let record = session.insert(Record {
        scenario,
        instructions: None,
        status: RecordStatus::NotReady,
        created_by: created_by.to_string(),
        created_on: stamp,
        updated_on: stamp,
    })?;
    info!(record = %record.id, scenario = %scenario, created_by, "record created");
    Ok(record)
}

/// Execute the record's scenario. The only way a record leaves `NOT_READY`.
///
/// Objects created during the run are linked to the record. On success the
/// report becomes the instructions and the record is `READY`. On failure the
/// rendered error becomes the instructions, the record is `FAILED` and the
/// original error is returned. A record that is not `NOT_READY` is refused
/// with [`TransitionNotAllowed`](crate::core::fsm::TransitionNotAllowed)
/// before anything runs.
#[instrument(skip_all, fields(record = %record_id))]
pub fn execute_test(
    session: &mut Session<'_>,
    registry: &Registry,
    record_id: Id,
) -> Result<Stored<Record>> {
    let mut record = session.fetch::<Record>(record_id)?;
    transition(record.status, RecordEvent::Execute)?;
    let scenario = session.fetch::<Scenario>(record.scenario)?;

    let db = session.database();
    let outcome = {
        let _observer = CreationObserver::start(db.signals(), record.id);
        executor::execute(registry, session, &scenario.config)
    };

    match outcome {
        Ok(report) => {
            record.status = transition(record.status, RecordEvent::Execute)?;
            record.instructions = Some(report);
            save(session, &mut record)?;
            info!(scenario = %scenario.slug, "record ready");
            Ok(record)
        }
        Err(err) => {
            record.status = transition(record.status, RecordEvent::Fail)?;
            record.instructions = Some(format!("{err:#}"));
            if let Err(save_err) = save(session, &mut record) {
                error!(error = %format!("{save_err:#}"), "failed to persist FAILED status");
            }
            warn!(scenario = %scenario.slug, error = %format!("{err:#}"), "record failed");
            Err(err)
        }
    }
}

/// Operator sign-off. Plain assignment: any status becomes `DONE`.
pub fn mark_done(session: &mut Session<'_>, record_id: Id) -> Result<Stored<Record>, ModelError> {
    let mut record = session.fetch::<Record>(record_id)?;
    record.status = RecordStatus::Done;
    save(session, &mut record)?;
    info!(record = %record_id, "record marked done");
    Ok(record)
}

pub fn get(session: &Session<'_>, record_id: Id) -> Result<Option<Stored<Record>>, ModelError> {
    Ok(session.get::<Record>(record_id)?)
}

/// Up to `limit` records, newest first.
pub fn recent(session: &Session<'_>, limit: usize) -> Result<Vec<Stored<Record>>, ModelError> {
    let mut records = session.all::<Record>()?;
    records.sort_by(|a, b| b.created_on.cmp(&a.created_on).then(b.id.cmp(&a.id)));
    records.truncate(limit);
    Ok(records)
}

/// Objects created while `record_id` executed, in creation order.
pub fn recorded_objects(
    session: &Session<'_>,
    record_id: Id,
) -> Result<Vec<Stored<RecordedObject>>, ModelError> {
    Ok(session
        .all::<RecordedObject>()?
        .into_iter()
        .filter(|recorded| recorded.record == record_id)
        .collect())
}

/// `RecordedObject #<id>: <object>`, rendering the object through its content type.
pub fn describe_recorded_object(session: &Session<'_>, recorded: &Stored<RecordedObject>) -> String {
    format!(
        "RecordedObject #{}: {}",
        recorded.id,
        session.describe(&recorded.object)
    )
}

/// Delete a record together with its recorded objects.
///
/// The linked objects themselves are left in place. Returns false if the
/// record did not exist.
pub fn delete(session: &mut Session<'_>, record_id: Id) -> Result<bool, ModelError> {
    session.atomic(|session| -> Result<bool, ModelError> {
        let linked = recorded_objects(session, record_id)?;
        for recorded in &linked {
            session.delete::<RecordedObject>(recorded.id)?;
        }
        let removed = session.delete::<Record>(record_id)?;
        if removed {
            info!(record = %record_id, recorded_objects = linked.len(), "record deleted");
        }
        Ok(removed)
    })
}

fn save(session: &mut Session<'_>, record: &mut Stored<Record>) -> Result<(), ModelError> {
    record.updated_on = now();
    session.update(record)?;
    Ok(())
}
