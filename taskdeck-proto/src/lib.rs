//! Shared wire definitions for the `taskdeck` task API.

pub mod codec;
pub mod task;
