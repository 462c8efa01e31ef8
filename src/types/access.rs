//! Access types.

use serde::{Deserialize, Serialize};

/// The caller's access to an instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceAccess {
    /// Instance the access applies to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Permitted actions per resource area.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<RoleAccess>,
}

/// Permitted actions, each listing resource areas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleAccess {
    /// Areas the caller can view.
    #[serde(default)]
    pub view: Vec<String>,
    /// Areas the caller can read.
    #[serde(default)]
    pub read: Vec<String>,
    /// Areas the caller can create in.
    #[serde(default)]
    pub create: Vec<String>,
    /// Areas the caller can update.
    #[serde(default)]
    pub update: Vec<String>,
    /// Areas the caller can delete from.
    #[serde(default)]
    pub delete: Vec<String>,
}

impl RoleAccess {
    /// Returns true if the caller may read `area`.
    pub fn can_read(&self, area: &str) -> bool {
        self.read.iter().any(|a| a == area)
    }

    /// Returns true if the caller may update `area`.
    pub fn can_update(&self, area: &str) -> bool {
        self.update.iter().any(|a| a == area)
    }
}
