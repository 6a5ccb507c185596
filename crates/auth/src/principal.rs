use serde::{Deserialize, Serialize};

use stockledger_core::UserId;

use crate::{Permission, Role, permissions_for_roles};

/// A resolved actor for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Build a principal whose permissions come from the role policy.
    pub fn with_roles(user_id: UserId, roles: Vec<Role>) -> Self {
        let permissions = permissions_for_roles(&roles);
        Self {
            user_id,
            roles,
            permissions,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self::with_roles(user_id, vec![Role::ADMIN])
    }

    pub fn staff(user_id: UserId) -> Self {
        Self::with_roles(user_id, vec![Role::STAFF])
    }

    pub fn has(&self, permission: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == permission)
    }

    /// Maker-checker privilege: may approve stock-affecting transactions.
    pub fn is_privileged(&self) -> bool {
        self.has(&Permission::TRANSACTIONS_APPROVE)
    }
}
