use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings (e.g. `"payments.record"`). The wildcard
/// `"*"` means "allow all" and is what the admin role carries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const VENDORS_MANAGE: Permission = Permission(Cow::Borrowed("vendors.manage"));
    pub const VARIANTS_MANAGE: Permission = Permission(Cow::Borrowed("variants.manage"));
    pub const PURCHASES_CREATE: Permission = Permission(Cow::Borrowed("purchases.create"));
    pub const PURCHASES_CANCEL: Permission = Permission(Cow::Borrowed("purchases.cancel"));
    pub const PAYMENTS_RECORD: Permission = Permission(Cow::Borrowed("payments.record"));
    pub const TRANSACTIONS_CREATE: Permission =
        Permission(Cow::Borrowed("inventory.transactions.create"));
    /// Checker privilege: approve/reject/void, and auto-approval on create.
    pub const TRANSACTIONS_APPROVE: Permission =
        Permission(Cow::Borrowed("inventory.transactions.approve"));
    pub const LEDGER_RECONCILE: Permission = Permission(Cow::Borrowed("ledger.reconcile"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
