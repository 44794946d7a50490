//! Environment-variable helpers shared by the binaries' `from_env`
//! constructors.

use std::str::FromStr;

use crate::error::CoreError;

/// Read `key` from the environment, falling back to `default` when unset.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse `key`, falling back to `default` when unset.
///
/// A set-but-unparseable value is an error rather than a silent default.
pub fn env_parse<T>(key: &'static str, default: T) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, CoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| CoreError::Config {
        key,
        message: format!("'{raw}': {e}"),
    })
}
