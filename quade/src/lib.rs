//! QA scenario fixture execution engine.
//!
//! Operators define scenarios (ordered lists of fixture calls with keyword
//! arguments) and execute them. Each execution is a record: the fixtures run
//! inside one atomic scope, their output lines become the record's
//! instructions, and every object created along the way is linked to the
//! record so it can be reviewed or cleaned up later.
//!
//! - **[`core`]**: Pure logic (config types, validation, the record state
//!   machine, listing output). No I/O.
//! - **[`store`]**: The transactional datastore with save notifications.
//! - **[`io`]**: Configuration and `.quade/` scaffolding.
//!
//! [`registry`], [`executor`] and [`observer`] make up the engine;
//! [`scenarios`] and [`records`] own the persisted lifecycle; [`app`] and
//! [`tasks`] wire it together for the CLI and the web UI.

pub mod app;
pub mod core;
pub mod executor;
pub mod exit_codes;
pub mod fixtures;
pub mod io;
pub mod logging;
pub mod models;
pub mod observer;
pub mod records;
pub mod registry;
pub mod scenarios;
pub mod store;
pub mod tasks;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
