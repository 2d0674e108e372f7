//! Customer wallet.
//!
//! The wallet is an append-only ledger of signed transactions. A balance is
//! always the sum of a user's entries and is never stored.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::OrderError;
use crate::ids::{OrderId, UserId, WalletTxId};
use crate::money::{Currency, Money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// One ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletTransaction {
    pub id: WalletTxId,
    pub user_id: UserId,
    /// Positive for credits, negative for debits.
    pub amount: Money,
    pub kind: TransactionKind,
    pub reason: String,
    pub related_order_id: Option<OrderId>,
    /// Idempotency key.
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct WalletState {
    entries: Vec<WalletTransaction>,
    by_reference: HashMap<String, usize>,
}

impl WalletState {
    fn balance(&self, user_id: &UserId, currency: Currency) -> Result<Money, OrderError> {
        Money::try_sum(
            self.entries
                .iter()
                .filter(|t| &t.user_id == user_id)
                .map(|t| &t.amount),
            currency,
        )
        .ok_or(OrderError::Overflow)
    }
}

/// Append-only wallet ledger for every user.
#[derive(Debug)]
pub struct Wallet {
    currency: Currency,
    state: Mutex<WalletState>,
}

impl Wallet {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            state: Mutex::new(WalletState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_amount(&self, amount: Money) -> Result<(), OrderError> {
        if amount.currency != self.currency {
            return Err(OrderError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                got: amount.currency.code().to_string(),
            });
        }
        if !amount.is_positive() {
            return Err(OrderError::InvalidAmount(amount.minor));
        }
        Ok(())
    }

    /// Add funds.
    ///
    /// A repeated `reference` returns the transaction already recorded under
    /// it instead of crediting twice.
    pub fn credit(
        &self,
        user_id: &UserId,
        amount: Money,
        reason: &str,
        related_order_id: Option<OrderId>,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<WalletTransaction, OrderError> {
        self.check_amount(amount)?;
        let mut state = self.lock();
        if let Some(&idx) = state.by_reference.get(reference) {
            return Ok(state.entries[idx].clone());
        }
        let tx = WalletTransaction {
            id: WalletTxId::generate(),
            user_id: user_id.clone(),
            amount,
            kind: TransactionKind::Credit,
            reason: reason.to_string(),
            related_order_id,
            reference: reference.to_string(),
            created_at: now,
        };
        Self::append(&mut state, tx.clone());
        info!(user_id = %user_id, amount = %amount, reference, "wallet credited");
        Ok(tx)
    }

    /// Spend funds.
    pub fn debit(
        &self,
        user_id: &UserId,
        amount: Money,
        reason: &str,
        related_order_id: Option<OrderId>,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<WalletTransaction, OrderError> {
        self.check_amount(amount)?;
        let mut state = self.lock();
        if let Some(&idx) = state.by_reference.get(reference) {
            return Ok(state.entries[idx].clone());
        }
        let available = state.balance(user_id, self.currency)?;
        if available < amount {
            return Err(OrderError::InsufficientBalance {
                user_id: user_id.clone(),
                requested: amount,
                available,
            });
        }
        let tx = WalletTransaction {
            id: WalletTxId::generate(),
            user_id: user_id.clone(),
            amount: amount.negate(),
            kind: TransactionKind::Debit,
            reason: reason.to_string(),
            related_order_id,
            reference: reference.to_string(),
            created_at: now,
        };
        Self::append(&mut state, tx.clone());
        info!(user_id = %user_id, amount = %amount, reference, "wallet debited");
        Ok(tx)
    }

    fn append(state: &mut WalletState, tx: WalletTransaction) {
        state
            .by_reference
            .insert(tx.reference.clone(), state.entries.len());
        state.entries.push(tx);
    }

    pub fn balance(&self, user_id: &UserId) -> Result<Money, OrderError> {
        self.lock().balance(user_id, self.currency)
    }

    /// A user's transactions, oldest first.
    pub fn transactions(&self, user_id: &UserId) -> Vec<WalletTransaction> {
        self.lock()
            .entries
            .iter()
            .filter(|t| &t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Look up a transaction by idempotency key.
    pub fn by_reference(&self, reference: &str) -> Option<WalletTransaction> {
        let state = self.lock();
        state
            .by_reference
            .get(reference)
            .map(|&idx| state.entries[idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rupees(units: i64) -> Money {
        Money::major(units, Currency::INR)
    }

    #[test]
    fn test_balance_is_sum_of_entries() {
        let wallet = Wallet::new(Currency::INR);
        let user = UserId::new("u");
        wallet
            .credit(&user, rupees(100), "refund", None, "r1", Utc::now())
            .unwrap();
        wallet
            .debit(&user, rupees(30), "purchase", None, "d1", Utc::now())
            .unwrap();

        assert_eq!(wallet.balance(&user).unwrap(), rupees(70));
        let txs = wallet.transactions(&user);
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[1].amount, rupees(-30));
        assert_eq!(txs[1].kind, TransactionKind::Debit);
    }

    #[test]
    fn test_credit_is_idempotent_per_reference() {
        let wallet = Wallet::new(Currency::INR);
        let user = UserId::new("u");
        let first = wallet
            .credit(&user, rupees(50), "refund", None, "refund:ret_1", Utc::now())
            .unwrap();
        let second = wallet
            .credit(&user, rupees(50), "refund", None, "refund:ret_1", Utc::now())
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(wallet.balance(&user).unwrap(), rupees(50));
    }

    #[test]
    fn test_insufficient_balance() {
        let wallet = Wallet::new(Currency::INR);
        let user = UserId::new("u");
        assert!(matches!(
            wallet.debit(&user, rupees(1), "purchase", None, "d1", Utc::now()),
            Err(OrderError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let wallet = Wallet::new(Currency::INR);
        let user = UserId::new("u");
        assert!(matches!(
            wallet.credit(&user, rupees(0), "x", None, "c", Utc::now()),
            Err(OrderError::InvalidAmount(0))
        ));
        assert!(wallet.balance(&user).unwrap().is_zero());
    }

    #[test]
    fn test_concurrent_credits_do_not_lose_updates() {
        let wallet = Wallet::new(Currency::INR);
        let user = UserId::new("u");
        std::thread::scope(|s| {
            for i in 0..8 {
                let wallet = &wallet;
                let user = &user;
                s.spawn(move || {
                    wallet
                        .credit(user, rupees(10), "refund", None, &format!("r{i}"), Utc::now())
                        .unwrap();
                });
            }
        });
        assert_eq!(wallet.balance(&user).unwrap(), rupees(80));
    }
}
