//! Caller identity attached to every request.

use serde::{Deserialize, Serialize};

/// Already-authenticated caller of a read operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub user_id: String,
    /// Tenant the caller belongs to
    pub resource_path: String,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, resource_path: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            resource_path: resource_path.into(),
        }
    }
}
