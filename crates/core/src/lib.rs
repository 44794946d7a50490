//! Domain types shared across the mjrelay workspace: job pushes and
//! records, outcomes, message text, errors and config helpers.

pub mod config;
pub mod error;
pub mod job;
pub mod job_events;
pub mod outcome;
pub mod types;
