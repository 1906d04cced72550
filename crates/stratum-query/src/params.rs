//! Bound parameter values and their declared binding types.
//!
//! Parameter values travel as [`serde_json::Value`] so the core stays
//! backend-agnostic; each backend coerces values at bind time using the
//! declared [`ParamType`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Declared binding type for a named parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Text,
    Integer,
    Real,
    Boolean,
}

/// Named parameter values bound to a statement.
pub type Parameters = HashMap<String, Value>;

/// Declared binding types, keyed by parameter name.
pub type ParameterTypes = HashMap<String, ParamType>;
