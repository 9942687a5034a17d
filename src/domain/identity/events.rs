use serde::Serialize;

/// Public projection published with CREATE / UPDATE on the identity topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySnapshot {
    pub first_name: String,
    pub last_name: String,
    /// Role names, alphabetical.
    pub roles: Vec<String>,
}
