use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::money::Currency;
use crate::payment::{GatewayError, PaymentGateway, PaymentIntent};

/// In-process gateway for local runs and tests.
///
/// Succeeds unless a failure has been queued with [`MockGateway::fail_next`].
#[derive(Debug)]
pub struct MockGateway {
    key_id: String,
    next_failure: Mutex<Option<GatewayError>>,
    intents_created: AtomicUsize,
}

impl MockGateway {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            next_failure: Mutex::new(None),
            intents_created: AtomicUsize::new(0),
        }
    }

    /// Make the next `create_intent` call fail with `error`.
    pub fn fail_next(&self, error: GatewayError) {
        *self
            .next_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn intents_created(&self) -> usize {
        self.intents_created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    #[instrument(skip(self), fields(key_id = %self.key_id))]
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: Currency,
        receipt: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let failure = self
            .next_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(error) = failure {
            info!(%error, "mock gateway failing intent");
            return Err(error);
        }
        if amount_minor <= 0 {
            return Err(GatewayError::Rejected(
                "amount must be greater than zero".to_string(),
            ));
        }

        self.intents_created.fetch_add(1, Ordering::SeqCst);
        let gateway_order_id = format!("order_{}", Uuid::new_v4().simple());
        info!(%gateway_order_id, "mock gateway created intent");
        Ok(PaymentIntent {
            gateway_order_id,
            amount_minor,
            currency,
        })
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}
