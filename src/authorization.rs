//! Role gate for fulfillment operations.
//!
//! Authentication happens upstream; the core only consumes the caller's
//! claimed identity and role. One check function, one required role per
//! operation — no per-role dispatch tables.

use serde::{Deserialize, Serialize};

use crate::models::enums::Role;

/// The caller identity presented with each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: i64,
    pub role: Role,
}

impl Caller {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }
}

/// Errors from authorization checks.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Operation requires the {} role", .required.as_str())]
    Forbidden { required: Role },
}

/// Require an exact role for an operation.
pub fn require_role(caller: &Caller, required: Role) -> Result<(), AuthorizationError> {
    if caller.role == required {
        Ok(())
    } else {
        Err(AuthorizationError::Forbidden { required })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_role_passes() {
        let caller = Caller::new(1, Role::Pharmacist);
        assert!(require_role(&caller, Role::Pharmacist).is_ok());
    }

    #[test]
    fn other_roles_are_forbidden() {
        let caller = Caller::new(1, Role::Patient);
        let err = require_role(&caller, Role::Admin).unwrap_err();
        let AuthorizationError::Forbidden { required } = err;
        assert_eq!(required, Role::Admin);
    }

    #[test]
    fn admin_is_not_implicitly_every_role() {
        let caller = Caller::new(1, Role::Admin);
        assert!(require_role(&caller, Role::Pharmacist).is_err());
    }
}
