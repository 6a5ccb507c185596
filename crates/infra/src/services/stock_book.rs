use std::collections::HashMap;
use std::collections::hash_map::Entry;

use stockledger_core::DomainError;
use stockledger_inventory::{ItemStockSnapshot, StockCommand, StockItem, VariantId};

use super::Uow;
use crate::command_dispatcher::DispatchError;

/// Stock items touched by one unit of work, each loaded once.
#[derive(Debug, Default)]
pub(crate) struct StockBook {
    items: HashMap<VariantId, StockItem>,
}

impl StockBook {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The variant's stock item; unknown variants are a not-found error.
    pub(crate) fn get(&mut self, uow: &mut Uow<'_>, variant_id: VariantId) -> Result<&mut StockItem, DispatchError> {
        match self.items.entry(variant_id) {
            Entry::Occupied(slot) => Ok(slot.into_mut()),
            Entry::Vacant(slot) => {
                let item = uow.load(StockItem::empty(variant_id))?;
                item.ensure_exists()?;
                Ok(slot.insert(item))
            }
        }
    }

    /// Execute a stock movement and return the affected pool's levels.
    pub(crate) fn apply(
        &mut self,
        uow: &mut Uow<'_>,
        variant_id: VariantId,
        command: StockCommand,
    ) -> Result<ItemStockSnapshot, DispatchError> {
        let item = self.get(uow, variant_id)?;
        let events = uow.execute(item, command)?;
        events
            .iter()
            .find_map(|e| e.levels())
            .map(|(stock_before, stock_after)| ItemStockSnapshot {
                stock_before,
                stock_after,
            })
            .ok_or_else(|| {
                DomainError::invariant(format!("stock movement on {variant_id} produced no levels")).into()
            })
    }
}
