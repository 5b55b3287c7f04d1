use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity is an enrolled customer: display name, face embedding, and
/// account balance. Created at enrollment, never deleted; the balance is
/// mutated only by the payment path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub name: String,

    /// Fixed-dimensionality face embedding. The persisted encoding must
    /// round-trip exactly: matching correctness depends on reloading the
    /// same floats that were enrolled.
    pub embedding: Vec<f32>,

    pub balance: f64,
    pub created_at: DateTime<Utc>,
}

/// One line of a purchase request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: u32,
    pub quantity: u32,
    pub price: f64,
}

/// PurchaseRequest describes what the customer is buying. Transient;
/// never persisted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub description: String,
    pub total_amount: f64,
    pub items: Vec<LineItem>,
}

impl PurchaseRequest {
    /// Sum of line-item quantities.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Sum of price × quantity across line items.
    pub fn items_total(&self) -> f64 {
        self.items
            .iter()
            .map(|i| i.price * i.quantity as f64)
            .sum()
    }
}

/// Transaction is a committed payment. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub amount: f64,
    pub total_quantity: u32,
    pub description: String,

    /// The identity's balance after this transaction committed.
    pub balance: f64,

    pub created_at: DateTime<Utc>,
}

/// TransactionItem is one line of a committed transaction. Exists only
/// under a committed parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionItem {
    pub transaction_id: Uuid,
    pub item_id: u32,
    pub quantity: u32,
    pub price: f64,
}

/// InventoryEntry tracks how many units of an item remain sellable.
/// Seeded externally; decremented only inside the payment transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub item_id: u32,
    pub quantity_remaining: u32,
}

/// Receipt is the response to a successful charge.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub transaction: Transaction,
    pub items: Vec<TransactionItem>,
    pub identity_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PurchaseRequest {
        PurchaseRequest {
            description: "groceries".into(),
            total_amount: 70.0,
            items: vec![
                LineItem {
                    item_id: 1,
                    quantity: 2,
                    price: 20.0,
                },
                LineItem {
                    item_id: 2,
                    quantity: 3,
                    price: 10.0,
                },
            ],
        }
    }

    #[test]
    fn request_totals() {
        let req = request();
        assert_eq!(req.total_quantity(), 5);
        assert!((req.items_total() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn identity_embedding_round_trips_exactly() {
        let identity = Identity {
            id: Uuid::new_v4(),
            name: "alice".into(),
            embedding: (0..128).map(|i| (i as f32) * 0.017 - 1.0).collect(),
            balance: 100.0,
            created_at: Utc::now(),
        };

        let data = rmp_serde::to_vec_named(&identity).unwrap();
        let back: Identity = rmp_serde::from_slice(&data).unwrap();

        assert_eq!(back.id, identity.id);
        assert_eq!(back.embedding, identity.embedding);
        assert_eq!(back.balance, identity.balance);
    }
}
