//! Vendors domain module (supplier identity, event-sourced).
//!
//! The financial snapshot of a vendor (balance, totals, counts) is not part of
//! this aggregate: it is a read model derived from the vendor ledger.

pub mod vendor;

pub use vendor::{
    ContactInfo, DeactivateVendor, RegisterVendor, Vendor, VendorCommand, VendorDeactivated,
    VendorEvent, VendorId, VendorRegistered, VendorStatus,
};
