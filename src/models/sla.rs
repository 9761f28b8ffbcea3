use serde::{Deserialize, Serialize};

/// Input for creating a service level agreement.
///
/// The payload is opaque to the metadata layer; it is stored as JSON and
/// handed back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlaInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Input for creating a security group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSecurityGroupInput {
    pub name: String,
    /// Identifier of the group in the external directory (LDAP, Sentry, ...).
    pub group_id: Option<String>,
    pub description: Option<String>,
}
