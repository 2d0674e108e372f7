//! Shipping addresses.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::ids::{AddressId, UserId};

/// A postal address owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    /// Recipient name.
    pub name: String,
    pub line1: String,
    /// Apartment, suite, landmark.
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

impl Address {
    /// Create a new address.
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        line1: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            id: AddressId::generate(),
            user_id,
            name: name.into(),
            line1: line1.into(),
            line2: None,
            city: city.into(),
            state: state.into(),
            postal_code: postal_code.into(),
            country: country.into(),
            phone: None,
        }
    }

    /// Format as single line.
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.clone()];
        if let Some(ref line2) = self.line2 {
            parts.push(line2.clone());
        }
        parts.push(self.city.clone());
        parts.push(format!("{} {}", self.state, self.postal_code));
        parts.push(self.country.clone());
        parts.join(", ")
    }

    /// Check if address is complete.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty()
            && !self.line1.is_empty()
            && !self.city.is_empty()
            && !self.postal_code.is_empty()
            && !self.country.is_empty()
    }
}

/// Saved addresses, keyed by id.
#[derive(Debug, Default)]
pub struct AddressBook {
    addresses: Mutex<HashMap<AddressId, Address>>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AddressId, Address>> {
        self.addresses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Save an address.
    pub fn add(&self, address: Address) -> Result<AddressId, OrderError> {
        if !address.is_complete() {
            return Err(OrderError::InvalidAddress(format!(
                "address {} is missing required fields",
                address.id
            )));
        }
        let id = address.id.clone();
        self.lock().insert(id.clone(), address);
        Ok(id)
    }

    /// Fetch an address only if it belongs to `user_id`.
    pub fn owned_by(&self, id: &AddressId, user_id: &UserId) -> Result<Address, OrderError> {
        self.lock()
            .get(id)
            .filter(|a| &a.user_id == user_id)
            .cloned()
            .ok_or_else(|| OrderError::AddressNotFound(id.clone()))
    }
}
