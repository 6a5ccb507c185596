//! Inventory domain module (event-sourced).
//!
//! - [`stock`]: per-variant stock with a fresh and a damaged pool.
//! - [`transaction`]: maker-checker inventory transactions that gate every
//!   stock mutation behind approval.
//!
//! Business rules only (no IO, no HTTP, no storage).

pub mod stock;
pub mod transaction;

pub use stock::{
    AdjustStock, ReceiveStock, RegisterVariant, StockAdjusted, StockCommand, StockEvent, StockItem,
    StockPool, StockReceived, StockTransferred, StockWithdrawn, TransferStock, VariantId,
    VariantRegistered, WithdrawStock,
};
pub use transaction::{
    ApproveTransaction, CreateTransaction, InventoryTransaction, InventoryTransactionId,
    ItemStockSnapshot, RejectTransaction, TransactionAction, TransactionApproved,
    TransactionCommand, TransactionCreated, TransactionEvent, TransactionItem,
    TransactionItemInput, TransactionRejected, TransactionStatus, TransactionType,
    TransactionVoided, VoidTransaction,
};
