use serde::{Deserialize, Serialize};

use crate::db::models::Role;
use crate::error::{BookingError, BookingResult};

/// Identity of the caller, as established by the host application's auth layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    pub id: String,
    pub role: Role,
}

impl Requester {
    pub fn mentor(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Mentor,
        }
    }

    pub fn mentee(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Mentee,
        }
    }

    pub fn require_role(&self, role: Role, action: &str) -> BookingResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(BookingError::RoleViolation(format!(
                "only {role}s can {action}; requester {} is a {}",
                self.id, self.role
            )))
        }
    }
}
