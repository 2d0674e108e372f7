//! Callback signature checks.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::OrderError;
use crate::payment::PaymentVerification;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> Result<HmacSha256, OrderError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| OrderError::InvalidSignature(gateway_order_id.to_string()))?;
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_id.as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 the gateway attaches to a successful payment.
pub fn sign(
    secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
) -> Result<String, OrderError> {
    let mac = mac(secret, gateway_order_id, gateway_payment_id)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a callback signature in constant time.
pub fn verify_signature(secret: &str, callback: &PaymentVerification) -> Result<(), OrderError> {
    let invalid = || OrderError::InvalidSignature(callback.gateway_order_id.clone());
    let expected = hex::decode(callback.signature.trim()).map_err(|_| invalid())?;
    mac(
        secret,
        &callback.gateway_order_id,
        &callback.gateway_payment_id,
    )?
    .verify_slice(&expected)
    .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn callback(signature: String) -> PaymentVerification {
        PaymentVerification {
            gateway_order_id: "order_abc".into(),
            gateway_payment_id: "pay_xyz".into(),
            signature,
        }
    }

    #[test]
    fn test_valid_signature() {
        let sig = sign(SECRET, "order_abc", "pay_xyz").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify_signature(SECRET, &callback(sig)).is_ok());
    }

    #[test]
    fn test_wrong_secret() {
        let sig = sign("other", "order_abc", "pay_xyz").unwrap();
        assert!(matches!(
            verify_signature(SECRET, &callback(sig)),
            Err(OrderError::InvalidSignature(id)) if id == "order_abc"
        ));
    }

    #[test]
    fn test_tampered_payment_id() {
        let sig = sign(SECRET, "order_abc", "pay_other").unwrap();
        assert!(verify_signature(SECRET, &callback(sig)).is_err());
    }

    #[test]
    fn test_garbage_signature() {
        assert!(verify_signature(SECRET, &callback("not-hex".into())).is_err());
        assert!(verify_signature(SECRET, &callback(String::new())).is_err());
    }
}
