//! Gateway callback signatures
//!
//! `hex(HMAC-SHA256(key_secret, "<orderId>|<paymentId>"))`

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Signature the gateway attaches to a successful checkout.
pub fn payment_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap_or_else(|_| unreachable!());
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Whether `signature` authenticates the order/payment pair. The supplied
/// value must equal the lowercase hex digest byte for byte.
pub fn verify_payment_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let expected = payment_signature(secret, order_id, payment_id);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // echo -n "order_1|pay_1" | openssl dgst -sha256 -hmac secret
        let sig = payment_signature("secret", "order_1", "pay_1");
        assert_eq!(sig, "52115a0d3400de9e86aade1f1b6eba9e8974604f4e267a9e9a16633a4c8dd2cb");
        assert!(verify_payment_signature("secret", "order_1", "pay_1", &sig));
    }

    #[test]
    fn test_signature_must_match_exactly() {
        let sig = payment_signature("secret", "order_1", "pay_1");
        assert!(!verify_payment_signature("secret", "order_1", "pay_1", &sig.to_uppercase()));
        assert!(!verify_payment_signature("secret", "order_1", "pay_1", &format!("  {}  ", sig)));
        assert!(!verify_payment_signature("secret", "order_1", "pay_1", &format!("{}\n", sig)));
    }

    #[test]
    fn test_altered_payment_id_is_rejected() {
        let sig = payment_signature("secret", "order_1", "pay_1");
        assert!(!verify_payment_signature("secret", "order_1", "pay_2", &sig));
        assert!(!verify_payment_signature("secret", "order_2", "pay_1", &sig));
        assert!(!verify_payment_signature("other", "order_1", "pay_1", &sig));
    }

    #[test]
    fn test_separator_is_part_of_message() {
        let sig = payment_signature("secret", "order_1", "pay_1");
        assert_ne!(sig, payment_signature("secret", "order_1|", "pay_1"));
        assert!(!verify_payment_signature("secret", "order_1", "pay_1", ""));
        assert!(!verify_payment_signature("secret", "order_1", "pay_1", "deadbeef"));
    }
}
