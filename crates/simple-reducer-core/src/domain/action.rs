use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ReducerError;

/// Name of a registered action (the key of the action table).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionName(String);

impl ActionName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ActionName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ActionName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for ActionName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ActionName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Arguments bound to a queued action, everything after the leading state.
///
/// Kept as JSON values so one queue can hold calls to actions with
/// different argument types. Typed actions decode them back (see `typed`).
pub type ActionArgs = Vec<serde_json::Value>;

/// Encode dispatcher arguments.
///
/// Tuples and sequences become the argument list as-is; any other value is
/// treated as a single argument.
pub fn encode_args<A: Serialize>(args: A) -> Result<ActionArgs, ReducerError> {
    match serde_json::to_value(args) {
        Ok(serde_json::Value::Array(values)) => Ok(values),
        Ok(serde_json::Value::Null) => Ok(Vec::new()),
        Ok(value) => Ok(vec![value]),
        Err(e) => Err(ReducerError::ArgsEncode(e.to_string())),
    }
}
