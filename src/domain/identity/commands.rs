use serde::Deserialize;

// ============================================================================
// Identity Commands
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateIdentity {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateIdentity {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRole {
    pub role: String,
}
