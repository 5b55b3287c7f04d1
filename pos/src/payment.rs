use chrono::Utc;
use paylens_kv::KVTxn;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::PosError;
use crate::inventory::reserve;
use crate::keys::{
    identity_key, transaction_item_key, transaction_item_prefix, transaction_key,
    transaction_prefix,
};
use crate::pos::Pos;
use crate::types::{Identity, PurchaseRequest, Receipt, Transaction, TransactionItem};

/// Tolerance when checking the declared total against line items.
const TOTAL_TOLERANCE: f64 = 1e-6;

impl Pos {
    /// Authenticate by face match and execute a purchase.
    ///
    /// The request moves through identify → resolve → validate → commit;
    /// any failure aborts with zero observable side effects. Balance
    /// debit, transaction record, line items, and inventory decrements
    /// commit as one unit inside a single serializable write transaction,
    /// so concurrent charges can neither double-spend a balance nor sell
    /// the same unit twice.
    pub fn charge(&self, query: &[f32], request: &PurchaseRequest) -> Result<Receipt, PosError> {
        let result = self.charge_inner(query, request);

        match &result {
            Ok(receipt) => info!(
                "{} bought {} items for {:.2}, balance {:.2}",
                receipt.identity_name,
                receipt.transaction.total_quantity,
                receipt.transaction.amount,
                receipt.transaction.balance,
            ),
            Err(e @ (PosError::Storage(_) | PosError::Internal(_) | PosError::IdentityNotFound(_))) => {
                error!("charge aborted: {e}");
            }
            Err(_) => {}
        }

        result
    }

    fn charge_inner(&self, query: &[f32], request: &PurchaseRequest) -> Result<Receipt, PosError> {
        validate_request(request)?;

        let hit = self
            .matcher
            .resolve(&self.embeddings, query)?
            .ok_or(PosError::Unauthorized)?;

        let mut txn = self.store.begin()?;
        let receipt = stage_purchase(&mut *txn, hit.identity_id, request)?;
        txn.commit()?;

        Ok(receipt)
    }

    /// Read back a committed transaction and its line items.
    pub fn get_transaction(
        &self,
        id: Uuid,
    ) -> Result<Option<(Transaction, Vec<TransactionItem>)>, PosError> {
        let data = match self.store.get(&transaction_key(&id))? {
            Some(data) => data,
            None => return Ok(None),
        };
        let transaction: Transaction = rmp_serde::from_slice(&data)
            .map_err(|e| PosError::Storage(format!("decoding transaction {id}: {e}")))?;

        let mut items = Vec::new();
        // Scan returns line items in request order (zero-padded seq).
        for (key, value) in self.store.scan(&transaction_item_prefix(&id))? {
            let item: TransactionItem = rmp_serde::from_slice(&value)
                .map_err(|e| PosError::Storage(format!("decoding transaction item {key}: {e}")))?;
            items.push(item);
        }

        Ok(Some((transaction, items)))
    }

    /// All committed transactions for one identity, oldest first.
    pub fn transactions_for(&self, identity_id: Uuid) -> Result<Vec<Transaction>, PosError> {
        let mut transactions = Vec::new();
        for (key, value) in self.store.scan(transaction_prefix())? {
            let transaction: Transaction = rmp_serde::from_slice(&value)
                .map_err(|e| PosError::Storage(format!("decoding transaction row {key}: {e}")))?;
            if transaction.identity_id == identity_id {
                transactions.push(transaction);
            }
        }
        transactions.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(transactions)
    }
}

/// Stage the whole purchase inside an open write transaction: debit,
/// transaction record, line items, inventory decrements. Nothing is
/// visible until the caller commits; any error here means the dropped
/// transaction rolls every staged write back.
fn stage_purchase(
    txn: &mut dyn KVTxn,
    identity_id: Uuid,
    request: &PurchaseRequest,
) -> Result<Receipt, PosError> {
    // Resolve the balance inside the transaction. A read taken before the
    // write slot was held must never authorize the debit.
    let data = txn
        .get(&identity_key(&identity_id))?
        .ok_or(PosError::IdentityNotFound(identity_id))?;
    let mut identity: Identity = rmp_serde::from_slice(&data)
        .map_err(|e| PosError::Storage(format!("decoding identity {identity_id}: {e}")))?;

    if identity.balance < request.total_amount {
        return Err(PosError::InsufficientFunds {
            balance: identity.balance,
            requested: request.total_amount,
        });
    }

    let transaction_id = Uuid::new_v4();
    let mut items = Vec::with_capacity(request.items.len());
    for (seq, line) in request.items.iter().enumerate() {
        // Conditional decrement; the first short item aborts the whole
        // request before anything becomes visible.
        reserve(txn, line.item_id, line.quantity)?;

        let item = TransactionItem {
            transaction_id,
            item_id: line.item_id,
            quantity: line.quantity,
            price: line.price,
        };
        let data = rmp_serde::to_vec_named(&item)
            .map_err(|e| PosError::Storage(format!("encoding transaction item: {e}")))?;
        txn.set(&transaction_item_key(&transaction_id, seq), &data)?;
        items.push(item);
    }

    identity.balance -= request.total_amount;

    let transaction = Transaction {
        id: transaction_id,
        identity_id,
        amount: request.total_amount,
        total_quantity: request.total_quantity(),
        description: request.description.clone(),
        balance: identity.balance,
        created_at: Utc::now(),
    };

    let identity_data = rmp_serde::to_vec_named(&identity)
        .map_err(|e| PosError::Storage(format!("encoding identity: {e}")))?;
    txn.set(&identity_key(&identity_id), &identity_data)?;

    let transaction_data = rmp_serde::to_vec_named(&transaction)
        .map_err(|e| PosError::Storage(format!("encoding transaction: {e}")))?;
    txn.set(&transaction_key(&transaction_id), &transaction_data)?;

    Ok(Receipt {
        transaction,
        items,
        identity_name: identity.name,
    })
}

/// Reject malformed requests before any matching or storage work.
///
/// The declared total must equal the sum of price × quantity: the caller
/// assembles both, and a disagreement means the request is corrupt, not
/// that either number should silently win.
fn validate_request(request: &PurchaseRequest) -> Result<(), PosError> {
    if request.items.is_empty() {
        return Err(PosError::InvalidInput("purchase has no line items".into()));
    }
    if !request.total_amount.is_finite() || request.total_amount < 0.0 {
        return Err(PosError::InvalidInput(
            "total amount must be a non-negative number".into(),
        ));
    }

    for line in &request.items {
        if line.quantity == 0 {
            return Err(PosError::InvalidInput(format!(
                "item {}: quantity must be positive",
                line.item_id
            )));
        }
        if !line.price.is_finite() || line.price < 0.0 {
            return Err(PosError::InvalidInput(format!(
                "item {}: price must be a non-negative number",
                line.item_id
            )));
        }
    }

    let items_total = request.items_total();
    if (items_total - request.total_amount).abs() > TOTAL_TOLERANCE {
        return Err(PosError::InvalidInput(format!(
            "declared total {:.2} does not match line items {items_total:.2}",
            request.total_amount
        )));
    }

    Ok(())
}
