//! `taskdeck` — task list client with an optimistic sync cache.

pub mod config;
pub mod filter;
pub mod repository;
pub mod sync;
