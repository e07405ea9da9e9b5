//! Background task bodies.

use anyhow::Result;
use tracing::{error, info, instrument};

use crate::app::Quade;
use crate::models::Record;
use crate::store::{Id, Stored};

/// Load record `record_id` and run `execute_test` on it.
///
/// Failures are logged and returned unchanged; retrying is up to the caller.
/// A repeated delivery for a record that already ran fails with
/// [`TransitionNotAllowed`](crate::core::fsm::TransitionNotAllowed).
#[instrument(skip(quade), fields(record = %record_id))]
pub fn execute_test_task(quade: &Quade, record_id: Id) -> Result<Stored<Record>> {
    match quade.execute(record_id) {
        Ok(record) => {
            info!(status = %record.status, "execute_test task finished");
            Ok(record)
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "execute_test task failed");
            Err(err)
        }
    }
}
