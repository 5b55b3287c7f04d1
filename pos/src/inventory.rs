use paylens_kv::KVTxn;

use crate::error::PosError;
use crate::keys::{inventory_key, inventory_prefix};
use crate::pos::Pos;
use crate::types::InventoryEntry;

impl Pos {
    /// Set an item's sellable quantity (seed or restock). Upserts the
    /// entry; the payment path only ever decrements it.
    pub fn stock_item(&self, item_id: u32, quantity_remaining: u32) -> Result<InventoryEntry, PosError> {
        let entry = InventoryEntry {
            item_id,
            quantity_remaining,
        };
        let data = rmp_serde::to_vec_named(&entry)
            .map_err(|e| PosError::Storage(format!("encoding inventory entry: {e}")))?;
        self.store.set(&inventory_key(item_id), &data)?;
        Ok(entry)
    }

    /// List the whole inventory, ascending by item id.
    pub fn inventory(&self) -> Result<Vec<InventoryEntry>, PosError> {
        let rows = self.store.scan(inventory_prefix())?;

        let mut entries = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            let entry: InventoryEntry = rmp_serde::from_slice(&value)
                .map_err(|e| PosError::Storage(format!("decoding inventory row {key}: {e}")))?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Remaining quantity for one item; `None` if it was never stocked.
    pub fn remaining(&self, item_id: u32) -> Result<Option<u32>, PosError> {
        let data = match self.store.get(&inventory_key(item_id))? {
            Some(data) => data,
            None => return Ok(None),
        };
        let entry: InventoryEntry = rmp_serde::from_slice(&data)
            .map_err(|e| PosError::Storage(format!("decoding inventory entry: {e}")))?;
        Ok(Some(entry.quantity_remaining))
    }
}

/// Conditionally take `quantity` units of an item inside an open write
/// transaction. Succeeds only if the quantity remaining at the moment of
/// the staged write covers the request; a missing entry counts as zero
/// stock. Returns the new remaining quantity.
///
/// This must only run inside the payment transaction: the read and the
/// staged decrement share its serializable scope, which is what rules out
/// selling the same unit twice under concurrency.
pub(crate) fn reserve(
    txn: &mut dyn KVTxn,
    item_id: u32,
    quantity: u32,
) -> Result<u32, PosError> {
    let key = inventory_key(item_id);

    let entry: InventoryEntry = match txn.get(&key)? {
        Some(data) => rmp_serde::from_slice(&data)
            .map_err(|e| PosError::Storage(format!("decoding inventory entry: {e}")))?,
        None => return Err(PosError::OutOfStock { item_id }),
    };

    if entry.quantity_remaining < quantity {
        return Err(PosError::OutOfStock { item_id });
    }

    let updated = InventoryEntry {
        item_id,
        quantity_remaining: entry.quantity_remaining - quantity,
    };
    let data = rmp_serde::to_vec_named(&updated)
        .map_err(|e| PosError::Storage(format!("encoding inventory entry: {e}")))?;
    txn.set(&key, &data)?;

    Ok(updated.quantity_remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use paylens_kv::{KVStore, MemoryStore};

    fn stocked(store: &MemoryStore, item_id: u32, quantity: u32) {
        let entry = InventoryEntry {
            item_id,
            quantity_remaining: quantity,
        };
        store
            .set(
                &inventory_key(item_id),
                &rmp_serde::to_vec_named(&entry).unwrap(),
            )
            .unwrap();
    }

    #[test]
    fn reserve_decrements_within_txn() {
        let store = MemoryStore::new();
        stocked(&store, 7, 5);

        let mut txn = store.begin().unwrap();
        assert_eq!(reserve(&mut *txn, 7, 2).unwrap(), 3);
        // Re-reads inside the same transaction see the staged decrement.
        assert_eq!(reserve(&mut *txn, 7, 3).unwrap(), 0);
        txn.commit().unwrap();
    }

    #[test]
    fn reserve_fails_on_insufficient_stock() {
        let store = MemoryStore::new();
        stocked(&store, 7, 1);

        let mut txn = store.begin().unwrap();
        assert!(matches!(
            reserve(&mut *txn, 7, 2),
            Err(PosError::OutOfStock { item_id: 7 })
        ));
    }

    #[test]
    fn reserve_fails_on_unknown_item() {
        let store = MemoryStore::new();
        let mut txn = store.begin().unwrap();
        assert!(matches!(
            reserve(&mut *txn, 42, 1),
            Err(PosError::OutOfStock { item_id: 42 })
        ));
    }
}
