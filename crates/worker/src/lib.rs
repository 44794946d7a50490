//! Command-line front end that submits one Midjourney job and follows it
//! to completion.

pub mod command;
pub mod config;
