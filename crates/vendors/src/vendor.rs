use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Aggregate, AggregateRoot, DomainError, aggregate_id};
use stockledger_events::Event;

aggregate_id!(
    /// Vendor identifier. The vendor's ledger stream shares this id.
    VendorId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vendor {
    id: VendorId,
    name: String,
    contact: ContactInfo,
    status: VendorStatus,
    version: u64,
    created: bool,
}

impl Vendor {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: VendorId) -> Self {
        Self {
            id,
            name: String::new(),
            contact: ContactInfo::default(),
            status: VendorStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn status(&self) -> VendorStatus {
        self.status
    }

    /// Purchases, payments and returns may only reference an existing, active vendor.
    pub fn ensure_can_transact(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("vendor {}", self.id)));
        }
        if self.status != VendorStatus::Active {
            return Err(DomainError::validation(format!(
                "vendor {} is inactive",
                self.id
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for Vendor {
    type Id = VendorId;
    const AGGREGATE_TYPE: &'static str = "vendors.vendor";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterVendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterVendor {
    pub vendor_id: VendorId,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateVendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateVendor {
    pub vendor_id: VendorId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorCommand {
    RegisterVendor(RegisterVendor),
    DeactivateVendor(DeactivateVendor),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRegistered {
    pub vendor_id: VendorId,
    pub name: String,
    pub contact: ContactInfo,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorDeactivated {
    pub vendor_id: VendorId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorEvent {
    VendorRegistered(VendorRegistered),
    VendorDeactivated(VendorDeactivated),
}

impl Event for VendorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VendorEvent::VendorRegistered(_) => "vendors.vendor.registered",
            VendorEvent::VendorDeactivated(_) => "vendors.vendor.deactivated",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VendorEvent::VendorRegistered(e) => e.occurred_at,
            VendorEvent::VendorDeactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Vendor {
    type Command = VendorCommand;
    type Event = VendorEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            VendorEvent::VendorRegistered(e) => {
                self.id = e.vendor_id;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.status = VendorStatus::Active;
                self.created = true;
            }
            VendorEvent::VendorDeactivated(_) => {
                self.status = VendorStatus::Inactive;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VendorCommand::RegisterVendor(cmd) => self.handle_register(cmd),
            VendorCommand::DeactivateVendor(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl Vendor {
    fn handle_register(&self, cmd: &RegisterVendor) -> Result<Vec<VendorEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("vendor already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("vendor name cannot be empty"));
        }

        Ok(vec![VendorEvent::VendorRegistered(VendorRegistered {
            vendor_id: cmd.vendor_id,
            name: cmd.name.trim().to_string(),
            contact: cmd.contact.clone().unwrap_or_default(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateVendor) -> Result<Vec<VendorEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("vendor {}", cmd.vendor_id)));
        }
        if self.id != cmd.vendor_id {
            return Err(DomainError::invariant("vendor_id mismatch"));
        }
        if self.status == VendorStatus::Inactive {
            return Err(DomainError::conflict("vendor is already inactive"));
        }

        Ok(vec![VendorEvent::VendorDeactivated(VendorDeactivated {
            vendor_id: cmd.vendor_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(id: VendorId) -> Vendor {
        let mut vendor = Vendor::empty(id);
        let events = vendor
            .handle(&VendorCommand::RegisterVendor(RegisterVendor {
                vendor_id: id,
                name: "  Acme Wholesale ".to_string(),
                contact: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            vendor.apply(e);
        }
        vendor
    }

    #[test]
    fn register_trims_name_and_activates() {
        let vendor = registered(VendorId::generate());
        assert_eq!(vendor.name(), "Acme Wholesale");
        assert_eq!(vendor.status(), VendorStatus::Active);
        assert_eq!(vendor.version(), 1);
        assert!(vendor.ensure_can_transact().is_ok());
    }

    #[test]
    fn register_rejects_blank_name_and_duplicates() {
        let id = VendorId::generate();
        let empty = Vendor::empty(id);
        let err = empty
            .handle(&VendorCommand::RegisterVendor(RegisterVendor {
                vendor_id: id,
                name: "   ".into(),
                contact: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let vendor = registered(id);
        let err = vendor
            .handle(&VendorCommand::RegisterVendor(RegisterVendor {
                vendor_id: id,
                name: "Again".into(),
                contact: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn missing_vendor_cannot_transact() {
        let vendor = Vendor::empty(VendorId::generate());
        assert_eq!(vendor.ensure_can_transact().unwrap_err().kind(), "not_found");
    }

    #[test]
    fn deactivated_vendor_cannot_transact() {
        let id = VendorId::generate();
        let mut vendor = registered(id);
        let events = vendor
            .handle(&VendorCommand::DeactivateVendor(DeactivateVendor {
                vendor_id: id,
                reason: Some("closed".into()),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        vendor.apply(&events[0]);

        assert_eq!(vendor.status(), VendorStatus::Inactive);
        assert_eq!(
            vendor.ensure_can_transact().unwrap_err().kind(),
            "validation_error"
        );
    }
}
