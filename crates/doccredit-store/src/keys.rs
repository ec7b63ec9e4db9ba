//! Key encoding utilities.
//!
//! User-scoped keys start with the 16 UUID bytes so a prefix scan returns
//! all of a user's rows. ULID suffixes keep those rows in creation order.

use doccredit_core::{PurchaseId, SubscriptionId, TransactionId, UserId};

use crate::error::{Result, StoreError};

/// Create a balance key from a user ID.
#[must_use]
pub fn balance_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a subscription key from a subscription ID.
#[must_use]
pub fn subscription_key(subscription_id: &SubscriptionId) -> Vec<u8> {
    subscription_id.to_bytes().to_vec()
}

/// Create a transaction key from a transaction ID.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a provider id key (session, invoice or subscription id).
#[must_use]
pub fn provider_key(provider_id: &str) -> Vec<u8> {
    provider_id.as_bytes().to_vec()
}

/// Prefix for iterating all of a user's rows in a user-scoped family.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a user-scoped key.
///
/// Format: `user_id (16 bytes) || suffix`
#[must_use]
pub fn user_scoped_key(user_id: &UserId, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + suffix.len());
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(suffix);
    key
}

/// Create a user-subscription index key.
#[must_use]
pub fn user_subscription_key(user_id: &UserId, subscription_id: &SubscriptionId) -> Vec<u8> {
    user_scoped_key(user_id, &subscription_id.to_bytes())
}

/// Create a user-transaction index key.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    user_scoped_key(user_id, &transaction_id.to_bytes())
}

/// Create a purchased-document key.
#[must_use]
pub fn purchased_document_key(user_id: &UserId, purchase_id: &PurchaseId) -> Vec<u8> {
    user_scoped_key(user_id, &purchase_id.to_bytes())
}

/// Create a consumption key. Idempotency keys are scoped per user.
#[must_use]
pub fn consumption_key(user_id: &UserId, idempotency_key: &str) -> Vec<u8> {
    user_scoped_key(user_id, idempotency_key.as_bytes())
}

/// Read a 16-byte id from `bytes[offset..offset + 16]`.
///
/// # Errors
///
/// Returns `StoreError::Database` if the slice is too short.
pub fn read_id_bytes(bytes: &[u8], offset: usize) -> Result<[u8; 16]> {
    bytes
        .get(offset..offset + 16)
        .and_then(|slice| <[u8; 16]>::try_from(slice).ok())
        .ok_or_else(|| StoreError::Database(format!("malformed key of {} bytes", bytes.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_transaction_key_format() {
        let user_id = UserId::generate();
        let tx_id = TransactionId::generate();
        let key = user_transaction_key(&user_id, &tx_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], tx_id.to_bytes());
    }

    #[test]
    fn extract_subscription_id_from_index_key() {
        let user_id = UserId::generate();
        let sub_id = SubscriptionId::generate();
        let key = user_subscription_key(&user_id, &sub_id);

        let extracted = SubscriptionId::from_bytes(read_id_bytes(&key, 16).unwrap());
        assert_eq!(extracted, sub_id);
    }

    #[test]
    fn short_key_is_an_error() {
        assert!(read_id_bytes(&[0u8; 20], 16).is_err());
    }

    #[test]
    fn consumption_keys_are_user_scoped() {
        let a = UserId::generate();
        let b = UserId::generate();
        assert_ne!(consumption_key(&a, "draft-1"), consumption_key(&b, "draft-1"));
        assert!(consumption_key(&a, "draft-1").starts_with(&user_prefix(&a)));
    }
}
