use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::money::{ensure_non_negative, normalize};
use stockledger_core::{Aggregate, AggregateRoot, DomainError, Money, aggregate_id};
use stockledger_events::Event;

aggregate_id!(
    /// Product variant identifier (the unit stock is tracked at).
    VariantId
);

/// Stock pool a quantity is taken from or put into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockPool {
    #[default]
    Fresh,
    Damaged,
}

impl StockPool {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockPool::Fresh => "fresh",
            StockPool::Damaged => "damaged",
        }
    }
}

/// Aggregate root: StockItem (one per variant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    id: VariantId,
    product_name: String,
    variant_name: String,
    sku: String,
    current_stock: i64,
    damaged_stock: i64,
    cost_price: Money,
    version: u64,
    created: bool,
}

impl StockItem {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: VariantId) -> Self {
        Self {
            id,
            product_name: String::new(),
            variant_name: String::new(),
            sku: String::new(),
            current_stock: 0,
            damaged_stock: 0,
            cost_price: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn variant_name(&self) -> &str {
        &self.variant_name
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    /// Fresh (sellable) stock.
    pub fn current_stock(&self) -> i64 {
        self.current_stock
    }

    pub fn damaged_stock(&self) -> i64 {
        self.damaged_stock
    }

    pub fn cost_price(&self) -> Money {
        self.cost_price
    }

    pub fn available(&self, pool: StockPool) -> i64 {
        match pool {
            StockPool::Fresh => self.current_stock,
            StockPool::Damaged => self.damaged_stock,
        }
    }

    pub fn ensure_exists(&self) -> Result<(), DomainError> {
        if self.created {
            Ok(())
        } else {
            Err(DomainError::not_found(format!("variant {}", self.id)))
        }
    }

    fn insufficient(&self, pool: StockPool, requested: i64) -> DomainError {
        DomainError::invariant(format!(
            "insufficient {} stock for variant {} ({}): {} available, {} requested",
            pool.as_str(),
            self.id,
            self.sku,
            self.available(pool),
            requested
        ))
    }
}

impl AggregateRoot for StockItem {
    type Id = VariantId;
    const AGGREGATE_TYPE: &'static str = "inventory.variant";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterVariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterVariant {
    pub variant_id: VariantId,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub cost_price: Money,
    pub opening_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveStock (optionally records the latest cost).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub variant_id: VariantId,
    pub pool: StockPool,
    pub quantity: i64,
    pub unit_cost: Option<Money>,
    pub reference_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WithdrawStock (out of the business, e.g. back to the vendor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawStock {
    pub variant_id: VariantId,
    pub pool: StockPool,
    pub quantity: i64,
    pub reference_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransferStock between pools (damage write-down and its undo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStock {
    pub variant_id: VariantId,
    pub from: StockPool,
    pub to: StockPool,
    pub quantity: i64,
    pub reference_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (signed correction of the fresh pool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub variant_id: VariantId,
    pub delta: i64,
    pub reference_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    RegisterVariant(RegisterVariant),
    ReceiveStock(ReceiveStock),
    WithdrawStock(WithdrawStock),
    TransferStock(TransferStock),
    AdjustStock(AdjustStock),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRegistered {
    pub variant_id: VariantId,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub cost_price: Money,
    pub opening_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub variant_id: VariantId,
    pub pool: StockPool,
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub cost_price: Money,
    pub reference_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockWithdrawn {
    pub variant_id: VariantId,
    pub pool: StockPool,
    pub quantity: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub reference_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransferred {
    pub variant_id: VariantId,
    pub from: StockPool,
    pub to: StockPool,
    pub quantity: i64,
    /// Level of the `from` pool.
    pub stock_before: i64,
    pub stock_after: i64,
    pub reference_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub variant_id: VariantId,
    pub delta: i64,
    pub stock_before: i64,
    pub stock_after: i64,
    pub reference_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    VariantRegistered(VariantRegistered),
    StockReceived(StockReceived),
    StockWithdrawn(StockWithdrawn),
    StockTransferred(StockTransferred),
    StockAdjusted(StockAdjusted),
}

impl StockEvent {
    /// `(stock_before, stock_after)` of the pool this event primarily changed.
    pub fn levels(&self) -> Option<(i64, i64)> {
        match self {
            StockEvent::VariantRegistered(_) => None,
            StockEvent::StockReceived(e) => Some((e.stock_before, e.stock_after)),
            StockEvent::StockWithdrawn(e) => Some((e.stock_before, e.stock_after)),
            StockEvent::StockTransferred(e) => Some((e.stock_before, e.stock_after)),
            StockEvent::StockAdjusted(e) => Some((e.stock_before, e.stock_after)),
        }
    }
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::VariantRegistered(_) => "inventory.variant.registered",
            StockEvent::StockReceived(_) => "inventory.variant.stock_received",
            StockEvent::StockWithdrawn(_) => "inventory.variant.stock_withdrawn",
            StockEvent::StockTransferred(_) => "inventory.variant.stock_transferred",
            StockEvent::StockAdjusted(_) => "inventory.variant.stock_adjusted",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::VariantRegistered(e) => e.occurred_at,
            StockEvent::StockReceived(e) => e.occurred_at,
            StockEvent::StockWithdrawn(e) => e.occurred_at,
            StockEvent::StockTransferred(e) => e.occurred_at,
            StockEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockItem {
    type Command = StockCommand;
    type Event = StockEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockEvent::VariantRegistered(e) => {
                self.id = e.variant_id;
                self.product_name = e.product_name.clone();
                self.variant_name = e.variant_name.clone();
                self.sku = e.sku.clone();
                self.cost_price = e.cost_price;
                self.current_stock = e.opening_stock;
                self.damaged_stock = 0;
                self.created = true;
            }
            StockEvent::StockReceived(e) => {
                match e.pool {
                    StockPool::Fresh => self.current_stock = e.stock_after,
                    StockPool::Damaged => self.damaged_stock = e.stock_after,
                }
                self.cost_price = e.cost_price;
            }
            StockEvent::StockWithdrawn(e) => match e.pool {
                StockPool::Fresh => self.current_stock = e.stock_after,
                StockPool::Damaged => self.damaged_stock = e.stock_after,
            },
            StockEvent::StockTransferred(e) => match e.from {
                StockPool::Fresh => {
                    self.current_stock -= e.quantity;
                    self.damaged_stock += e.quantity;
                }
                StockPool::Damaged => {
                    self.damaged_stock -= e.quantity;
                    self.current_stock += e.quantity;
                }
            },
            StockEvent::StockAdjusted(e) => {
                self.current_stock = e.stock_after;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::RegisterVariant(cmd) => self.handle_register(cmd),
            StockCommand::ReceiveStock(cmd) => self.handle_receive(cmd),
            StockCommand::WithdrawStock(cmd) => self.handle_withdraw(cmd),
            StockCommand::TransferStock(cmd) => self.handle_transfer(cmd),
            StockCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
        }
    }
}

impl StockItem {
    fn ensure_variant_id(&self, variant_id: VariantId) -> Result<(), DomainError> {
        self.ensure_exists()?;
        if self.id != variant_id {
            return Err(DomainError::invariant("variant_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterVariant) -> Result<Vec<StockEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("variant already exists"));
        }
        if cmd.product_name.trim().is_empty() {
            return Err(DomainError::validation("product_name cannot be empty"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if cmd.opening_stock < 0 {
            return Err(DomainError::validation("opening_stock cannot be negative"));
        }
        ensure_non_negative("cost_price", cmd.cost_price)?;

        Ok(vec![StockEvent::VariantRegistered(VariantRegistered {
            variant_id: cmd.variant_id,
            product_name: cmd.product_name.trim().to_string(),
            variant_name: cmd.variant_name.trim().to_string(),
            sku: cmd.sku.trim().to_string(),
            cost_price: normalize(cmd.cost_price),
            opening_stock: cmd.opening_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_variant_id(cmd.variant_id)?;
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        let cost_price = match cmd.unit_cost {
            Some(cost) => {
                ensure_non_negative("unit_cost", cost)?;
                normalize(cost)
            }
            None => self.cost_price,
        };

        let before = self.available(cmd.pool);
        Ok(vec![StockEvent::StockReceived(StockReceived {
            variant_id: cmd.variant_id,
            pool: cmd.pool,
            quantity: cmd.quantity,
            stock_before: before,
            stock_after: before + cmd.quantity,
            cost_price,
            reference_id: cmd.reference_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &WithdrawStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_variant_id(cmd.variant_id)?;
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        let before = self.available(cmd.pool);
        if cmd.quantity > before {
            return Err(self.insufficient(cmd.pool, cmd.quantity));
        }

        Ok(vec![StockEvent::StockWithdrawn(StockWithdrawn {
            variant_id: cmd.variant_id,
            pool: cmd.pool,
            quantity: cmd.quantity,
            stock_before: before,
            stock_after: before - cmd.quantity,
            reference_id: cmd.reference_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transfer(&self, cmd: &TransferStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_variant_id(cmd.variant_id)?;
        if cmd.from == cmd.to {
            return Err(DomainError::validation("cannot transfer stock into the same pool"));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        let before = self.available(cmd.from);
        if cmd.quantity > before {
            return Err(self.insufficient(cmd.from, cmd.quantity));
        }

        Ok(vec![StockEvent::StockTransferred(StockTransferred {
            variant_id: cmd.variant_id,
            from: cmd.from,
            to: cmd.to,
            quantity: cmd.quantity,
            stock_before: before,
            stock_after: before - cmd.quantity,
            reference_id: cmd.reference_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<StockEvent>, DomainError> {
        self.ensure_variant_id(cmd.variant_id)?;
        if cmd.delta == 0 {
            return Err(DomainError::validation("adjustment quantity cannot be zero"));
        }

        let after = self.current_stock + cmd.delta;
        if after < 0 {
            return Err(self.insufficient(StockPool::Fresh, -cmd.delta));
        }

        Ok(vec![StockEvent::StockAdjusted(StockAdjusted {
            variant_id: cmd.variant_id,
            delta: cmd.delta,
            stock_before: self.current_stock,
            stock_after: after,
            reference_id: cmd.reference_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
