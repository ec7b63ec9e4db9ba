//! Database schema definitions and column families.

/// Column family names.
pub mod cf {
    /// Credit balances, keyed by `user_id`.
    pub const BALANCES: &str = "balances";

    /// Subscription rows, keyed by `subscription_id` (ULID).
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Index: subscriptions by user, keyed by `user_id || subscription_id`.
    /// Value is empty (index only).
    pub const SUBSCRIPTIONS_BY_USER: &str = "subscriptions_by_user";

    /// Index: provider subscription id to local `subscription_id`.
    pub const SUBSCRIPTIONS_BY_PROVIDER: &str = "subscriptions_by_provider";

    /// Audit transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by user, keyed by `user_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Uniqueness index: provider session id to `transaction_id`.
    pub const PROVIDER_SESSIONS: &str = "provider_sessions";

    /// Consumption records, keyed by `user_id || idempotency_key`.
    pub const CONSUMPTIONS: &str = "consumptions";

    /// Single-document purchases, keyed by `user_id || purchase_id`.
    pub const PURCHASED_DOCUMENTS: &str = "purchased_documents";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::BALANCES,
        cf::SUBSCRIPTIONS,
        cf::SUBSCRIPTIONS_BY_USER,
        cf::SUBSCRIPTIONS_BY_PROVIDER,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::PROVIDER_SESSIONS,
        cf::CONSUMPTIONS,
        cf::PURCHASED_DOCUMENTS,
    ]
}
