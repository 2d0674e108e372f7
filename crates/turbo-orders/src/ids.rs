//! Typed identifiers for every record the engine stores.
//!
//! Generated ids carry a short prefix naming the record (`ord_`, `ret_`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate newtype ID structs.
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[doc = concat!("Identifier generated with the `", $prefix, "_` prefix.")]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// A fresh random id.
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, uuid::Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(UserId, "usr");
define_id!(ProductId, "prod");
define_id!(AddressId, "addr");
define_id!(CheckoutId, "chk");
define_id!(OrderId, "ord");
define_id!(CouponId, "cpn");
define_id!(PaymentId, "pay");
define_id!(CancellationId, "cxl");
define_id!(ReturnId, "ret");
define_id!(WalletTxId, "wtx");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_carry_prefix() {
        let order = OrderId::generate();
        assert_ne!(order, OrderId::generate());
        assert!(order.as_str().starts_with("ord_"));
        assert!(ReturnId::generate().as_str().starts_with("ret_"));
        assert!(WalletTxId::generate().to_string().starts_with("wtx_"));
    }

    #[test]
    fn test_user_id_from_str() {
        let user: UserId = "usr_asha".into();
        assert_eq!(user, UserId::new("usr_asha"));
    }
}
