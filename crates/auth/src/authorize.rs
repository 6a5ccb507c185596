use std::collections::BTreeSet;

use thiserror::Error;

use stockledger_core::DomainError;

use crate::{Permission, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::unauthorized(value.to_string())
    }
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.has(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Role → permission policy.
///
/// Convention: `admin` grants everything; `staff` is the maker side of the
/// maker-checker workflow. Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut granted: BTreeSet<Permission> = BTreeSet::new();
    for role in roles {
        match role.as_str() {
            "admin" => {
                granted.insert(Permission::WILDCARD);
            }
            "staff" => {
                granted.extend([
                    Permission::PURCHASES_CREATE,
                    Permission::PAYMENTS_RECORD,
                    Permission::TRANSACTIONS_CREATE,
                ]);
            }
            _ => {}
        }
    }
    granted.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::UserId;

    #[test]
    fn admin_has_every_permission_and_is_privileged() {
        let admin = Principal::admin(UserId::new());
        assert!(authorize(&admin, &Permission::LEDGER_RECONCILE).is_ok());
        assert!(admin.is_privileged());
    }

    #[test]
    fn staff_can_make_but_not_check() {
        let staff = Principal::staff(UserId::new());
        assert!(authorize(&staff, &Permission::TRANSACTIONS_CREATE).is_ok());
        assert!(!staff.is_privileged());

        let err = authorize(&staff, &Permission::TRANSACTIONS_APPROVE).unwrap_err();
        assert_eq!(
            err,
            AuthzError::Forbidden("inventory.transactions.approve".to_string())
        );
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        let p = Principal::with_roles(UserId::new(), vec![Role::new("auditor")]);
        assert!(p.permissions.is_empty());
        assert!(authorize(&p, &Permission::PAYMENTS_RECORD).is_err());
    }

    #[test]
    fn authz_errors_surface_as_unauthorized_domain_errors() {
        let err: DomainError = AuthzError::Forbidden("x".into()).into();
        assert_eq!(err.kind(), "unauthorized");
    }
}
