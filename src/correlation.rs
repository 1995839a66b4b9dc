//! Correlation identifiers pairing replies with their requests

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Opaque token attached to a request and echoed on its reply
///
/// Within the lifetime of one outstanding request, the id is assumed to be
/// unique among all messages that can appear on the reply destination.
/// Generated ids are UUIDs, so collisions are not a practical concern; ids
/// received over the wire are carried verbatim and never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a fresh, globally unique identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// String form carried in the transport metadata
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CorrelationId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for CorrelationId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}
