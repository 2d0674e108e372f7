//! Stock ledger: the authoritative inventory counters.
//!
//! Counters are only ever changed through the operations below, each of which
//! runs under the ledger lock, so a check-then-decrement can never interleave
//! with another reservation for the same product.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OrderError;
use crate::ids::ProductId;

/// Inventory level for a product.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StockLevel {
    /// Units physically in stock.
    pub on_hand: i64,
    /// Units held for unpaid gateway orders.
    pub reserved: i64,
}

impl StockLevel {
    pub fn new(on_hand: i64) -> Self {
        Self {
            on_hand,
            reserved: 0,
        }
    }

    /// Units that can still be promised to a new order.
    pub fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }
}

/// Reason for a stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdjustmentReason {
    /// Sold to a customer.
    Sale,
    /// Held for a pending payment.
    Reserved,
    /// Hold dropped without a sale.
    Released,
    /// Counter set by the catalog side.
    Restock,
    /// Returned item received back by the seller.
    Return,
    /// Sold units put back after a cancellation.
    Cancellation,
}

impl AdjustmentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentReason::Sale => "sale",
            AdjustmentReason::Reserved => "reserved",
            AdjustmentReason::Released => "released",
            AdjustmentReason::Restock => "restock",
            AdjustmentReason::Return => "return",
            AdjustmentReason::Cancellation => "cancellation",
        }
    }
}

/// An inventory adjustment record (for audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    /// Change to `on_hand` (sales, returns) or `reserved` (holds).
    pub quantity_change: i64,
    pub reason: AdjustmentReason,
    /// Order or return the adjustment belongs to.
    pub reference: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct LedgerState {
    levels: HashMap<ProductId, StockLevel>,
    adjustments: Vec<StockAdjustment>,
}

impl LedgerState {
    fn record(
        &mut self,
        product_id: &ProductId,
        quantity_change: i64,
        reason: AdjustmentReason,
        reference: Option<&str>,
    ) {
        debug!(
            product_id = %product_id,
            quantity_change,
            reason = reason.as_str(),
            "stock adjusted"
        );
        self.adjustments.push(StockAdjustment {
            product_id: product_id.clone(),
            quantity_change,
            reason,
            reference: reference.map(str::to_string),
            timestamp: Utc::now(),
        });
    }

    fn level(&self, product_id: &ProductId) -> StockLevel {
        self.levels.get(product_id).copied().unwrap_or_default()
    }
}

/// Thread-safe stock ledger.
#[derive(Debug, Default)]
pub struct StockLedger {
    state: Mutex<LedgerState>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the on-hand count for a product, keeping existing reservations.
    pub fn set_stock(&self, product_id: &ProductId, on_hand: i64) -> Result<(), OrderError> {
        if on_hand < 0 {
            return Err(OrderError::InvalidQuantity(on_hand));
        }
        let mut state = self.lock();
        let level = state.levels.entry(product_id.clone()).or_default();
        let delta = on_hand - level.on_hand;
        level.on_hand = on_hand;
        state.record(product_id, delta, AdjustmentReason::Restock, None);
        Ok(())
    }

    /// Current level for a product (zero if unknown).
    pub fn level(&self, product_id: &ProductId) -> StockLevel {
        self.lock().level(product_id)
    }

    /// Units available for a new order.
    pub fn available(&self, product_id: &ProductId) -> i64 {
        self.level(product_id).available()
    }

    /// Hold units for a pending payment.
    pub fn reserve(&self, product_id: &ProductId, quantity: i64) -> Result<(), OrderError> {
        self.reserve_all(&[(product_id.clone(), quantity)], None)
    }

    /// Hold units for every line, or none of them.
    pub fn reserve_all(
        &self,
        lines: &[(ProductId, i64)],
        reference: Option<&str>,
    ) -> Result<(), OrderError> {
        let wanted = aggregate(lines)?;
        let mut state = self.lock();

        for (product_id, quantity) in &wanted {
            let available = state.level(product_id).available();
            if available < *quantity {
                return Err(OrderError::InsufficientStock {
                    product_id: product_id.clone(),
                    requested: *quantity,
                    available,
                });
            }
        }

        for (product_id, quantity) in wanted {
            state.levels.entry(product_id.clone()).or_default().reserved += quantity;
            state.record(&product_id, quantity, AdjustmentReason::Reserved, reference);
        }
        Ok(())
    }

    /// Drop a hold without selling.
    pub fn release(&self, product_id: &ProductId, quantity: i64) -> Result<(), OrderError> {
        self.release_all(&[(product_id.clone(), quantity)], None)
    }

    /// Drop holds for every line.
    pub fn release_all(
        &self,
        lines: &[(ProductId, i64)],
        reference: Option<&str>,
    ) -> Result<(), OrderError> {
        let wanted = aggregate(lines)?;
        let mut state = self.lock();
        for (product_id, quantity) in wanted {
            let level = state.levels.entry(product_id.clone()).or_default();
            let released = quantity.min(level.reserved);
            level.reserved -= released;
            state.record(&product_id, -released, AdjustmentReason::Released, reference);
        }
        Ok(())
    }

    /// Remove sold units from stock.
    pub fn decrement(
        &self,
        product_id: &ProductId,
        quantity: i64,
        from_reservation: bool,
    ) -> Result<(), OrderError> {
        self.decrement_all(&[(product_id.clone(), quantity)], from_reservation, None)
    }

    /// Remove sold units for every line, or none of them.
    ///
    /// This is the authoritative gate: it checks live counts at commit time
    /// even when an earlier reservation succeeded. With `from_reservation`
    /// the units held for this order are consumed; otherwise only units not
    /// held for anyone else can be sold.
    pub fn decrement_all(
        &self,
        lines: &[(ProductId, i64)],
        from_reservation: bool,
        reference: Option<&str>,
    ) -> Result<(), OrderError> {
        let wanted = aggregate(lines)?;
        let mut state = self.lock();

        for (product_id, quantity) in &wanted {
            let level = state.level(product_id);
            let held = if from_reservation {
                (*quantity).min(level.reserved)
            } else {
                0
            };
            let sellable = level.on_hand - (level.reserved - held);
            if sellable < *quantity {
                return Err(OrderError::InsufficientStock {
                    product_id: product_id.clone(),
                    requested: *quantity,
                    available: sellable.max(0),
                });
            }
        }

        for (product_id, quantity) in wanted {
            let level = state.levels.entry(product_id.clone()).or_default();
            if from_reservation {
                level.reserved -= quantity.min(level.reserved);
            }
            level.on_hand -= quantity;
            state.record(&product_id, -quantity, AdjustmentReason::Sale, reference);
        }
        Ok(())
    }

    /// Put units back into stock.
    pub fn increment(&self, product_id: &ProductId, quantity: i64) -> Result<(), OrderError> {
        self.increment_all(
            &[(product_id.clone(), quantity)],
            AdjustmentReason::Return,
            None,
        )
    }

    /// Put units back for every line.
    pub fn increment_all(
        &self,
        lines: &[(ProductId, i64)],
        reason: AdjustmentReason,
        reference: Option<&str>,
    ) -> Result<(), OrderError> {
        let wanted = aggregate(lines)?;
        let mut state = self.lock();
        for (product_id, quantity) in wanted {
            let level = state.levels.entry(product_id.clone()).or_default();
            level.on_hand = level
                .on_hand
                .checked_add(quantity)
                .ok_or(OrderError::Overflow)?;
            state.record(&product_id, quantity, reason, reference);
        }
        Ok(())
    }

    /// Audit trail for a product, oldest first.
    pub fn adjustments(&self, product_id: &ProductId) -> Vec<StockAdjustment> {
        self.lock()
            .adjustments
            .iter()
            .filter(|a| &a.product_id == product_id)
            .cloned()
            .collect()
    }
}

/// Merge duplicate products and reject non-positive quantities.
fn aggregate(lines: &[(ProductId, i64)]) -> Result<BTreeMap<ProductId, i64>, OrderError> {
    let mut merged = BTreeMap::new();
    for (product_id, quantity) in lines {
        if *quantity <= 0 {
            return Err(OrderError::InvalidQuantity(*quantity));
        }
        let entry = merged.entry(product_id.clone()).or_insert(0_i64);
        *entry = entry.checked_add(*quantity).ok_or(OrderError::Overflow)?;
    }
    Ok(merged)
}
