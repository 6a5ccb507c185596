//! Vendor and variant registration.

use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use stockledger_auth::{Permission, Principal, authorize};
use stockledger_core::{DomainError, Money};
use stockledger_inventory::{RegisterVariant, StockCommand, StockItem, VariantId};
use stockledger_vendors::{ContactInfo, DeactivateVendor, RegisterVendor, Vendor, VendorCommand, VendorId};

use super::{ServiceError, StockLedger, id_or_new, now};
use crate::projections::{VariantStock, VendorAccount};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterVendorRequest {
    pub name: String,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
    /// Fixes the vendor id; retries with the same id are conflicts.
    #[serde(default)]
    pub vendor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterVariantRequest {
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub cost_price: Money,
    #[serde(default)]
    pub opening_stock: i64,
    #[serde(default)]
    pub variant_id: Option<Uuid>,
}

impl StockLedger {
    #[instrument(skip(self, request, actor), fields(actor = %actor.user_id), err)]
    pub fn register_vendor(&self, request: RegisterVendorRequest, actor: &Principal) -> Result<VendorAccount, ServiceError> {
        authorize(actor, &Permission::VENDORS_MANAGE)?;
        let vendor_id = VendorId::new(id_or_new(request.vendor_id));

        self.write(|uow| {
            let mut vendor = uow.load(Vendor::empty(vendor_id))?;
            uow.execute(
                &mut vendor,
                VendorCommand::RegisterVendor(RegisterVendor {
                    vendor_id,
                    name: request.name.clone(),
                    contact: request.contact.clone(),
                    occurred_at: now(),
                }),
            )?;
            Ok(())
        })?;

        info!(%vendor_id, "vendor registered");
        self.vendor_summary(vendor_id)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.user_id), err)]
    pub fn deactivate_vendor(
        &self,
        vendor_id: VendorId,
        reason: Option<String>,
        actor: &Principal,
    ) -> Result<VendorAccount, ServiceError> {
        authorize(actor, &Permission::VENDORS_MANAGE)?;

        self.write(|uow| {
            let mut vendor = uow.load(Vendor::empty(vendor_id))?;
            uow.execute(
                &mut vendor,
                VendorCommand::DeactivateVendor(DeactivateVendor {
                    vendor_id,
                    reason: reason.clone(),
                    occurred_at: now(),
                }),
            )?;
            Ok(())
        })?;

        self.vendor_summary(vendor_id)
    }

    #[instrument(skip(self, request, actor), fields(actor = %actor.user_id, sku = %request.sku), err)]
    pub fn register_variant(&self, request: RegisterVariantRequest, actor: &Principal) -> Result<VariantStock, ServiceError> {
        authorize(actor, &Permission::VARIANTS_MANAGE)?;
        let variant_id = VariantId::new(id_or_new(request.variant_id));

        self.write(|uow| {
            let mut item = uow.load(StockItem::empty(variant_id))?;
            uow.execute(
                &mut item,
                StockCommand::RegisterVariant(RegisterVariant {
                    variant_id,
                    product_name: request.product_name.clone(),
                    variant_name: request.variant_name.clone(),
                    sku: request.sku.clone(),
                    cost_price: request.cost_price,
                    opening_stock: request.opening_stock,
                    occurred_at: now(),
                }),
            )?;
            Ok(())
        })?;

        self.read_models
            .stock_levels
            .get(&variant_id)
            .ok_or_else(|| DomainError::not_found(format!("variant {variant_id}")).into())
    }
}
