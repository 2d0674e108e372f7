//! Checkout session storage.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::checkout::CheckoutSession;
use crate::error::OrderError;
use crate::ids::{CheckoutId, UserId};

/// Sessions plus the active session per user.
#[derive(Debug, Default)]
pub struct CheckoutState {
    sessions: HashMap<CheckoutId, CheckoutSession>,
    active: HashMap<UserId, CheckoutId>,
}

impl CheckoutState {
    /// Store a session and make it the user's active one.
    ///
    /// Returns the id of the session it superseded.
    pub fn activate(&mut self, session: CheckoutSession) -> Option<CheckoutId> {
        let previous = self
            .active
            .insert(session.user_id.clone(), session.id.clone());
        self.sessions.insert(session.id.clone(), session);
        previous
    }

    /// The user's active session.
    pub fn active(&self, user_id: &UserId) -> Result<&CheckoutSession, OrderError> {
        self.active
            .get(user_id)
            .and_then(|id| self.sessions.get(id))
            .ok_or_else(|| OrderError::NoActiveCheckout(user_id.clone()))
    }

    pub fn active_mut(&mut self, user_id: &UserId) -> Result<&mut CheckoutSession, OrderError> {
        let id = self
            .active
            .get(user_id)
            .ok_or_else(|| OrderError::NoActiveCheckout(user_id.clone()))?;
        self.sessions
            .get_mut(id)
            .ok_or_else(|| OrderError::NoActiveCheckout(user_id.clone()))
    }

    /// Any session, active or superseded.
    pub fn get(&self, id: &CheckoutId) -> Option<&CheckoutSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &CheckoutId) -> Option<&mut CheckoutSession> {
        self.sessions.get_mut(id)
    }
}

/// Checkout sessions behind one lock.
///
/// Placement holds the guard for its whole synchronous commit.
#[derive(Debug, Default)]
pub struct CheckoutBook {
    state: Mutex<CheckoutState>,
}

impl CheckoutBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, CheckoutState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the user's active session.
    pub fn active(&self, user_id: &UserId) -> Result<CheckoutSession, OrderError> {
        self.lock().active(user_id).cloned()
    }
}
