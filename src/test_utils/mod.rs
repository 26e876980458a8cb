//! Scripted driver and async helpers for exercising the pool without a database.

pub mod scripted;
pub mod test_helpers;

pub use scripted::{QueryScript, ScriptedConnection, ScriptedDriver, ScriptedFinish};
pub use test_helpers::{create_test_row, poll_once, wait_until};
