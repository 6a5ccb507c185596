//! `stockledger-auth`: the authorization boundary.
//!
//! Authentication is the caller's business: the surrounding application hands
//! us an actor id plus roles. This crate turns that into a [`Principal`] and
//! answers "may this actor do X", including the maker-checker privilege check.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, permissions_for_roles};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
