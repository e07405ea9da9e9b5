//! End-to-end tests for the record lifecycle through the public API.
//!
//! Each test builds an application context over a file-backed database in a
//! temporary project, submits a scenario and drives `execute_test_task`.

use std::sync::Arc;

use quade::app::{Quade, default_content_types};
use quade::core::fsm::TransitionNotAllowed;
use quade::core::types::RecordStatus;
use quade::io::config::Settings;
use quade::models::{Record, RecordedObject};
use quade::records;
use quade::registry::Registry;
use quade::store::{Database, ObjectRef, SaveEvent, SaveListener, Session, StoreError};
use quade::tasks::execute_test_task;
use quade::test_support::{self, FixtureFailure, TempProject, Widget};

fn quade_over(project: &TempProject, registry: Registry) -> Quade {
    let mut types = default_content_types();
    types.register::<Widget>();
    let database = Database::open(&project.database_path(), types).expect("open db");
    Quade::new(Settings::default(), registry, database)
}

fn scenario(quade: &Quade, slug: &str, names: &[&str]) {
    let mut session = quade.session().expect("session");
    test_support::scenario(&mut session, quade.registry(), slug, names);
}

/// `[["customer", {}], ["staff_user", {}]]` reports both names and ends `READY`.
#[test]
fn customer_and_staff_user_end_to_end() {
    let project = TempProject::new();
    let quade = quade_over(&project, test_support::people_registry());
    scenario(&quade, "people", &["customer", "staff_user"]);

    let record = quade.submit("people", "admin").expect("submit");
    let done = execute_test_task(&quade, record.id).expect("execute");

    assert_eq!(done.status, RecordStatus::Ready);
    assert_eq!(done.instructions.as_deref(), Some("Jane Doe\nJohn Staff"));

    // Everything survives a reopen of the same file.
    let reopened = quade_over(&project, Registry::new());
    let session = reopened.session().expect("session");
    let stored = session.fetch::<Record>(record.id).expect("record");
    assert_eq!(stored.status, RecordStatus::Ready);
    let described: Vec<String> = records::recorded_objects(&session, record.id)
        .expect("recorded objects")
        .iter()
        .map(|recorded| records::describe_recorded_object(&session, recorded))
        .collect();
    assert_eq!(
        described,
        vec!["RecordedObject #1: Jane Doe", "RecordedObject #2: John Staff"]
    );
}

#[test]
fn second_execution_leaves_record_untouched() {
    let project = TempProject::new();
    let quade = quade_over(&project, test_support::people_registry());
    scenario(&quade, "people", &["customer"]);
    let record = quade.submit("people", "admin").expect("submit");
    execute_test_task(&quade, record.id).expect("first");

    let err = execute_test_task(&quade, record.id).unwrap_err();
    assert!(err.downcast_ref::<TransitionNotAllowed>().is_some());

    let session = quade.session().expect("session");
    let stored = session.fetch::<Record>(record.id).expect("record");
    assert_eq!(stored.instructions.as_deref(), Some("Jane Doe"));
    assert_eq!(session.count::<RecordedObject>(), 1);
}

/// A failing step undoes earlier steps, records the error and re-raises it.
#[test]
fn failure_rolls_back_and_reraises() {
    let project = TempProject::new();
    let quade = quade_over(&project, test_support::people_registry());
    scenario(&quade, "doomed", &["two_widgets", "customer", "explode"]);
    let record = quade.submit("doomed", "admin").expect("submit");

    let err = execute_test_task(&quade, record.id).unwrap_err();
    assert_eq!(
        err.downcast_ref::<FixtureFailure>(),
        Some(&FixtureFailure("boom".to_string()))
    );

    let session = quade.session().expect("session");
    let stored = session.fetch::<Record>(record.id).expect("record");
    assert_eq!(stored.status, RecordStatus::Failed);
    assert_eq!(stored.instructions.as_deref(), Some("boom"));
    assert_eq!(session.count::<Widget>(), 0);
    assert_eq!(session.count::<RecordedObject>(), 0);
    assert_eq!(quade.database().signals().listener_count(), 0);
}

/// Registry whose `block_flush` fixture creates a widget, then makes every
/// later flush of `project`'s database fail. With `fail`, it also errors.
fn flush_blocking_registry(project: &TempProject, fail: bool) -> Registry {
    let blocker = project.database_path().with_extension("json.tmp");
    let mut registry = test_support::people_registry();
    registry.register("block_flush", move |session, _| -> anyhow::Result<&'static str> {
        session.insert(Widget::named("stranded"))?;
        std::fs::create_dir(&blocker)?;
        if fail {
            return Err(FixtureFailure("boom".to_string()).into());
        }
        Ok("blocked")
    });
    registry
}

/// A run whose commit cannot be written leaves nothing for a later commit to flush.
#[test]
fn failed_commit_discards_the_run() {
    let project = TempProject::new();
    let quade = quade_over(&project, flush_blocking_registry(&project, false));
    scenario(&quade, "blocked", &["block_flush"]);
    let record = quade.submit("blocked", "admin").expect("submit");

    let err = execute_test_task(&quade, record.id).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::Flush { .. })
    ));
    {
        let session = quade.session().expect("session");
        assert_eq!(session.count::<Widget>(), 0);
        assert_eq!(session.count::<RecordedObject>(), 0);
    }

    std::fs::remove_dir(project.database_path().with_extension("json.tmp")).expect("unblock");
    let mut session = quade.session().expect("session");
    records::mark_done(&mut session, record.id).expect("mark done");
    drop(session);

    let reopened = quade_over(&project, Registry::new());
    let session = reopened.session().expect("session");
    assert_eq!(session.count::<Widget>(), 0);
    assert_eq!(session.count::<RecordedObject>(), 0);
    assert_eq!(
        session.fetch::<Record>(record.id).expect("record").status,
        RecordStatus::Done
    );
}

/// The fixture's error reaches the caller even when FAILED cannot be saved.
#[test]
fn fixture_error_survives_failed_status_save() {
    let project = TempProject::new();
    let quade = quade_over(&project, flush_blocking_registry(&project, true));
    scenario(&quade, "doomed", &["block_flush"]);
    let record = quade.submit("doomed", "admin").expect("submit");

    let err = execute_test_task(&quade, record.id).unwrap_err();
    assert_eq!(
        err.downcast_ref::<FixtureFailure>(),
        Some(&FixtureFailure("boom".to_string()))
    );
    assert_eq!(quade.session().expect("session").count::<Widget>(), 0);
}

/// Re-registering a name in a test registry replaces the builtin fixture.
#[test]
fn overridden_fixture_is_used() {
    let project = TempProject::new();
    let mut registry = test_support::people_registry();
    registry.register("customer", |_, _| Ok("Override"));
    let quade = quade_over(&project, registry);
    scenario(&quade, "people", &["customer"]);
    let record = quade.submit("people", "admin").expect("submit");

    let done = execute_test_task(&quade, record.id).expect("execute");
    assert_eq!(done.instructions.as_deref(), Some("Override"));
    assert!(
        records::recorded_objects(&quade.session().expect("session"), record.id)
            .expect("recorded")
            .is_empty()
    );
}

/// Other listeners on the channel keep seeing creations around an execution.
#[test]
fn observer_coexists_with_other_listeners() {
    struct Seen(std::sync::Mutex<Vec<ObjectRef>>);
    impl SaveListener for Seen {
        fn on_save(&self, _: &mut Session<'_>, event: &SaveEvent<'_>) -> Result<(), StoreError> {
            if event.created {
                self.0.lock().expect("seen").push(event.object.clone());
            }
            Ok(())
        }
    }

    let project = TempProject::new();
    let quade = quade_over(&project, test_support::people_registry());
    let seen = Arc::new(Seen(std::sync::Mutex::new(Vec::new())));
    quade.database().signals().subscribe(seen.clone());
    scenario(&quade, "widgets", &["two_widgets"]);
    let record = quade.submit("widgets", "admin").expect("submit");
    execute_test_task(&quade, record.id).expect("execute");

    let seen = seen.0.lock().expect("seen");
    let widgets = seen.iter().filter(|object| object.is::<Widget>()).count();
    let links = seen
        .iter()
        .filter(|object| object.is::<RecordedObject>())
        .count();
    assert_eq!((widgets, links), (2, 2));
    assert_eq!(quade.database().signals().listener_count(), 1);
}
