//! Planner configuration.

use serde::{Deserialize, Serialize};

use crate::intent::IntentPolicy;

/// Tunables of a [`crate::session::PlannerSession`].
///
/// Deserializable so the CLI can load it from the `[intent]` section of its
/// config file; every field has a default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub intent: IntentPolicy,
}
