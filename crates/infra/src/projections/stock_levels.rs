//! Stock levels projection: fresh and damaged quantities per variant.

use serde::Serialize;
use serde_json::Value as JsonValue;

use stockledger_core::{AggregateRoot, Money};
use stockledger_events::{CursorCheck, EventEnvelope, Projection, ProjectionError, StreamCursors, decode};
use stockledger_inventory::{StockEvent, StockItem, StockPool, VariantId};

use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantStock {
    pub variant_id: VariantId,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub current_stock: i64,
    pub damaged_stock: i64,
    pub cost_price: Money,
}

#[derive(Debug)]
pub struct StockLevelsProjection<S = InMemoryReadStore<VariantId, VariantStock>>
where
    S: ReadStore<VariantId, VariantStock>,
{
    store: S,
    cursors: StreamCursors,
}

impl Default for StockLevelsProjection {
    fn default() -> Self {
        Self::new(InMemoryReadStore::new())
    }
}

impl<S> StockLevelsProjection<S>
where
    S: ReadStore<VariantId, VariantStock>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, variant_id: &VariantId) -> Option<VariantStock> {
        self.store.get(variant_id)
    }

    pub fn list(&self) -> Vec<VariantStock> {
        let mut all = self.store.list();
        all.sort_by(|a, b| a.sku.cmp(&b.sku));
        all
    }

    fn set_pool(&self, variant_id: VariantId, pool: StockPool, level: i64) {
        if let Some(mut stock) = self.store.get(&variant_id) {
            match pool {
                StockPool::Fresh => stock.current_stock = level,
                StockPool::Damaged => stock.damaged_stock = level,
            }
            self.store.upsert(variant_id, stock);
        }
    }
}

impl<S> Projection for StockLevelsProjection<S>
where
    S: ReadStore<VariantId, VariantStock>,
{
    fn name(&self) -> &'static str {
        "inventory.stock_levels"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != StockItem::AGGREGATE_TYPE {
            return Ok(());
        }
        if self.cursors.check(envelope)? == CursorCheck::Duplicate {
            return Ok(());
        }

        match decode::<StockEvent>(envelope)? {
            StockEvent::VariantRegistered(e) => {
                self.store.upsert(
                    e.variant_id,
                    VariantStock {
                        variant_id: e.variant_id,
                        product_name: e.product_name,
                        variant_name: e.variant_name,
                        sku: e.sku,
                        current_stock: e.opening_stock,
                        damaged_stock: 0,
                        cost_price: e.cost_price,
                    },
                );
            }
            StockEvent::StockReceived(e) => {
                self.set_pool(e.variant_id, e.pool, e.stock_after);
                if let Some(mut stock) = self.store.get(&e.variant_id) {
                    stock.cost_price = e.cost_price;
                    self.store.upsert(e.variant_id, stock);
                }
            }
            StockEvent::StockWithdrawn(e) => self.set_pool(e.variant_id, e.pool, e.stock_after),
            StockEvent::StockTransferred(e) => {
                if let Some(mut stock) = self.store.get(&e.variant_id) {
                    match e.from {
                        StockPool::Fresh => {
                            stock.current_stock -= e.quantity;
                            stock.damaged_stock += e.quantity;
                        }
                        StockPool::Damaged => {
                            stock.damaged_stock -= e.quantity;
                            stock.current_stock += e.quantity;
                        }
                    }
                    self.store.upsert(e.variant_id, stock);
                }
            }
            StockEvent::StockAdjusted(e) => self.set_pool(e.variant_id, StockPool::Fresh, e.stock_after),
        }

        self.cursors.advance(envelope)
    }

    fn reset(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
