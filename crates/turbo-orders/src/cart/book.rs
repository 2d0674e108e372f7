//! Per-user cart storage.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cart::Cart;
use crate::ids::UserId;
use crate::money::Currency;

/// Every user's cart, keyed by user.
#[derive(Debug)]
pub struct CartBook {
    currency: Currency,
    carts: Mutex<HashMap<UserId, Cart>>,
}

impl CartBook {
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            carts: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, Cart>> {
        self.carts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the user's cart (empty if they never added anything).
    pub fn snapshot(&self, user_id: &UserId) -> Cart {
        self.lock()
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| Cart::new(user_id.clone(), self.currency))
    }

    /// Fingerprint of the user's live cart.
    pub fn fingerprint(&self, user_id: &UserId) -> String {
        self.snapshot(user_id).fingerprint()
    }

    /// Mutate the user's cart under the lock.
    ///
    /// The change is discarded if `f` returns an error.
    pub fn update<T, E>(
        &self,
        user_id: &UserId,
        f: impl FnOnce(&mut Cart) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut carts = self.lock();
        let mut cart = carts
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| Cart::new(user_id.clone(), self.currency));
        let out = f(&mut cart)?;
        if cart.is_empty() {
            carts.remove(user_id);
        } else {
            carts.insert(user_id.clone(), cart);
        }
        Ok(out)
    }

    /// Empty the user's cart.
    pub fn clear(&self, user_id: &UserId) {
        self.lock().remove(user_id);
    }

    /// Empty the user's cart only if it still has the given fingerprint.
    ///
    /// Returns whether the cart was cleared.
    pub fn clear_if_matches(&self, user_id: &UserId, fingerprint: &str) -> bool {
        let mut carts = self.lock();
        let matches = carts
            .get(user_id)
            .is_some_and(|cart| cart.fingerprint() == fingerprint);
        if matches {
            carts.remove(user_id);
        }
        matches
    }
}
