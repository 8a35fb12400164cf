use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The signed-in user identity handed to the core by the (external)
/// authentication provider. Auth internals are a black box; only the id
/// and billing email matter here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: Uuid,
    pub email: String,
}

impl UserIdentity {
    #[must_use]
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }
}
