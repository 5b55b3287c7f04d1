use uuid::Uuid;

/// Build the KV key for an identity.
/// Format: `idn:{uuid}`
pub fn identity_key(id: &Uuid) -> String {
    format!("idn:{id}")
}

/// Return the KV prefix for listing all identities.
pub fn identity_prefix() -> &'static str {
    "idn:"
}

/// Build the KV key for a committed transaction.
/// Format: `txn:{uuid}`
pub fn transaction_key(id: &Uuid) -> String {
    format!("txn:{id}")
}

/// Return the KV prefix for listing all transactions.
pub fn transaction_prefix() -> &'static str {
    "txn:"
}

/// Build the KV key for one line of a committed transaction.
/// Format: `txi:{txn_uuid}:{seq_4d}`
///
/// The sequence number is zero-padded so a prefix scan returns line items
/// in request order.
pub fn transaction_item_key(transaction_id: &Uuid, seq: usize) -> String {
    format!("txi:{transaction_id}:{seq:04}")
}

/// Return the KV prefix for listing one transaction's line items.
pub fn transaction_item_prefix(transaction_id: &Uuid) -> String {
    format!("txi:{transaction_id}:")
}

/// Build the KV key for an inventory entry.
/// Format: `inv:{item_id_10d}`
///
/// Item ids are zero-padded to 10 decimal digits for stable numeric
/// ordering in KV scans.
pub fn inventory_key(item_id: u32) -> String {
    format!("inv:{item_id:010}")
}

/// Return the KV prefix for listing the whole inventory.
pub fn inventory_prefix() -> &'static str {
    "inv:"
}
