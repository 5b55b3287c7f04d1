use std::sync::{Arc, Barrier};
use std::thread;

use paylens_kv::{MemoryStore, RedbStore};

use crate::error::PosError;
use crate::pos::{Pos, PosConfig};
use crate::types::{LineItem, PurchaseRequest};

const DIM: usize = 4;

fn new_pos() -> Pos {
    Pos::open(
        Box::new(MemoryStore::new()),
        PosConfig::default().with_dimension(DIM),
    )
    .unwrap()
}

fn face_a() -> Vec<f32> {
    vec![1.0, 0.0, 0.0, 0.0]
}

fn face_b() -> Vec<f32> {
    vec![0.0, 1.0, 0.0, 0.0]
}

fn line(item_id: u32, quantity: u32, price: f64) -> LineItem {
    LineItem {
        item_id,
        quantity,
        price,
    }
}

fn request(total: f64, items: Vec<LineItem>) -> PurchaseRequest {
    PurchaseRequest {
        description: "checkout".into(),
        total_amount: total,
        items,
    }
}

// ---------------------------------------------------------------------------
// Enrollment + matching
// ---------------------------------------------------------------------------

#[test]
fn enroll_then_self_match() {
    let pos = new_pos();
    let alice = pos.enroll("alice", &face_a()).unwrap();
    assert_eq!(alice.balance, crate::STARTING_BALANCE);

    let (matched, distance) = pos.identify(&face_a()).unwrap().expect("should match");
    assert_eq!(matched.id, alice.id);
    assert_eq!(matched.name, "alice");
    assert!(distance < 1e-6, "self-match distance should be ~0, got {distance}");
}

#[test]
fn identify_unknown_face_returns_none() {
    let pos = new_pos();
    pos.enroll("alice", &face_a()).unwrap();
    assert!(pos.identify(&face_b()).unwrap().is_none());
}

#[test]
fn enroll_rejects_wrong_dimension() {
    let pos = new_pos();
    assert!(matches!(
        pos.enroll("alice", &[1.0, 0.0]),
        Err(PosError::InvalidInput(_))
    ));
    assert!(pos.identities().unwrap().is_empty());
}

#[test]
fn enroll_rejects_empty_name() {
    let pos = new_pos();
    assert!(matches!(
        pos.enroll("   ", &face_a()),
        Err(PosError::InvalidInput(_))
    ));
}

#[test]
fn identities_lists_everyone_in_enrollment_order() {
    let pos = new_pos();
    let alice = pos.enroll("alice", &face_a()).unwrap();
    let bob = pos.enroll("bob", &face_b()).unwrap();

    let all = pos.identities().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, alice.id);
    assert_eq!(all[1].id, bob.id);
    assert_eq!(all[0].embedding, face_a());
}

// ---------------------------------------------------------------------------
// Charging
// ---------------------------------------------------------------------------

#[test]
fn charge_commits_all_four_mutations() {
    let pos = new_pos();
    let alice = pos.enroll("alice", &face_a()).unwrap();
    pos.stock_item(7, 10).unwrap();

    let receipt = pos
        .charge(&face_a(), &request(60.0, vec![line(7, 2, 30.0)]))
        .unwrap();

    assert_eq!(receipt.identity_name, "alice");
    assert_eq!(receipt.transaction.amount, 60.0);
    assert_eq!(receipt.transaction.total_quantity, 2);
    assert_eq!(receipt.transaction.balance, 40.0);
    assert_eq!(receipt.items.len(), 1);
    assert_eq!(receipt.items[0].item_id, 7);

    // Balance debited.
    let (matched, _) = pos.identify(&face_a()).unwrap().unwrap();
    assert_eq!(matched.balance, 40.0);

    // Inventory decremented.
    assert_eq!(pos.remaining(7).unwrap(), Some(8));

    // Transaction and line items persisted.
    let (txn, items) = pos
        .get_transaction(receipt.transaction.id)
        .unwrap()
        .expect("transaction should be stored");
    assert_eq!(txn.identity_id, alice.id);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].price, 30.0);

    assert_eq!(pos.transactions_for(alice.id).unwrap().len(), 1);
}

#[test]
fn charge_preserves_line_item_order() {
    let pos = new_pos();
    pos.enroll("alice", &face_a()).unwrap();
    for item_id in 1..=3 {
        pos.stock_item(item_id, 5).unwrap();
    }

    let receipt = pos
        .charge(
            &face_a(),
            &request(
                30.0,
                vec![line(3, 1, 10.0), line(1, 1, 10.0), line(2, 1, 10.0)],
            ),
        )
        .unwrap();

    let (_, items) = pos.get_transaction(receipt.transaction.id).unwrap().unwrap();
    let ids: Vec<u32> = items.iter().map(|i| i.item_id).collect();
    assert_eq!(ids, vec![3, 1, 2]);
}

#[test]
fn insufficient_funds_aborts_without_side_effects() {
    let pos = new_pos();
    let alice = pos.enroll("alice", &face_a()).unwrap();
    pos.stock_item(7, 10).unwrap();

    let err = pos
        .charge(&face_a(), &request(150.0, vec![line(7, 5, 30.0)]))
        .unwrap_err();
    assert!(matches!(
        err,
        PosError::InsufficientFunds {
            balance,
            requested,
        } if balance == 100.0 && requested == 150.0
    ));

    let (matched, _) = pos.identify(&face_a()).unwrap().unwrap();
    assert_eq!(matched.balance, 100.0);
    assert_eq!(pos.remaining(7).unwrap(), Some(10));
    assert!(pos.transactions_for(alice.id).unwrap().is_empty());
}

#[test]
fn out_of_stock_rolls_back_items_reserved_earlier_in_the_request() {
    let pos = new_pos();
    let alice = pos.enroll("alice", &face_a()).unwrap();
    pos.stock_item(1, 5).unwrap();
    pos.stock_item(2, 1).unwrap();

    // Item 1 reserves fine; item 2 is short; the whole request aborts.
    let err = pos
        .charge(
            &face_a(),
            &request(30.0, vec![line(1, 2, 10.0), line(2, 2, 5.0)]),
        )
        .unwrap_err();
    assert!(matches!(err, PosError::OutOfStock { item_id: 2 }));

    assert_eq!(pos.remaining(1).unwrap(), Some(5));
    assert_eq!(pos.remaining(2).unwrap(), Some(1));
    let (matched, _) = pos.identify(&face_a()).unwrap().unwrap();
    assert_eq!(matched.balance, 100.0);
    assert!(pos.transactions_for(alice.id).unwrap().is_empty());
}

#[test]
fn last_unit_scenario() {
    let pos = new_pos();
    pos.enroll("alice", &face_a()).unwrap();
    pos.stock_item(7, 1).unwrap();

    // Wants two, one remains: abort, nothing changes.
    let err = pos
        .charge(&face_a(), &request(60.0, vec![line(7, 2, 30.0)]))
        .unwrap_err();
    assert!(matches!(err, PosError::OutOfStock { item_id: 7 }));
    assert_eq!(pos.remaining(7).unwrap(), Some(1));
    let (matched, _) = pos.identify(&face_a()).unwrap().unwrap();
    assert_eq!(matched.balance, 100.0);

    // The single remaining unit still sells.
    pos.charge(&face_a(), &request(30.0, vec![line(7, 1, 30.0)]))
        .unwrap();
    assert_eq!(pos.remaining(7).unwrap(), Some(0));
}

#[test]
fn never_stocked_item_is_out_of_stock() {
    let pos = new_pos();
    pos.enroll("alice", &face_a()).unwrap();

    let err = pos
        .charge(&face_a(), &request(10.0, vec![line(42, 1, 10.0)]))
        .unwrap_err();
    assert!(matches!(err, PosError::OutOfStock { item_id: 42 }));
}

#[test]
fn charge_without_enrollments_is_unauthorized() {
    let pos = new_pos();
    pos.stock_item(7, 10).unwrap();

    let err = pos
        .charge(&face_a(), &request(30.0, vec![line(7, 1, 30.0)]))
        .unwrap_err();
    assert!(matches!(err, PosError::Unauthorized));
}

#[test]
fn charge_outside_threshold_is_unauthorized() {
    let pos = new_pos();
    pos.enroll("alice", &face_a()).unwrap();
    pos.stock_item(7, 10).unwrap();

    // Orthogonal unit vectors are sqrt(2) apart, beyond the threshold.
    let err = pos
        .charge(&face_b(), &request(30.0, vec![line(7, 1, 30.0)]))
        .unwrap_err();
    assert!(matches!(err, PosError::Unauthorized));
}

#[test]
fn charge_with_wrong_dimension_query_is_invalid_input() {
    let pos = new_pos();
    pos.enroll("alice", &face_a()).unwrap();
    pos.stock_item(7, 10).unwrap();

    let err = pos
        .charge(&[1.0, 0.0], &request(30.0, vec![line(7, 1, 30.0)]))
        .unwrap_err();
    assert!(matches!(err, PosError::InvalidInput(_)));
}

#[test]
fn declared_total_mismatch_is_rejected_before_matching() {
    let pos = new_pos();

    // Even with nobody enrolled the request shape fails first.
    let err = pos
        .charge(&face_a(), &request(59.0, vec![line(7, 2, 30.0)]))
        .unwrap_err();
    assert!(matches!(err, PosError::InvalidInput(_)));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_charges_cannot_double_spend() {
    let pos = Arc::new(new_pos());
    pos.enroll("alice", &face_a()).unwrap();
    pos.stock_item(1, 100).unwrap();

    // Two charges of 60 against a balance of 100: only one may commit.
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let pos = Arc::clone(&pos);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pos.charge(&face_a(), &request(60.0, vec![line(1, 2, 30.0)]))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1, "exactly one of two charges may commit");

    let failure = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        failure.as_ref().unwrap_err(),
        PosError::InsufficientFunds { .. }
    ));

    // Exactly one debit and one decrement happened.
    let (matched, _) = pos.identify(&face_a()).unwrap().unwrap();
    assert_eq!(matched.balance, 40.0);
    assert_eq!(pos.remaining(1).unwrap(), Some(98));
}

#[test]
fn concurrent_charges_cannot_oversell() {
    let pos = Arc::new(new_pos());
    pos.enroll("alice", &face_a()).unwrap();
    pos.stock_item(5, 3).unwrap();

    // Each wants 2 of the 3 remaining units; both can afford it.
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let pos = Arc::clone(&pos);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pos.charge(&face_a(), &request(30.0, vec![line(5, 2, 15.0)]))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1, "exactly one of two charges may commit");

    let failure = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        failure.as_ref().unwrap_err(),
        PosError::OutOfStock { item_id: 5 }
    ));

    assert_eq!(pos.remaining(5).unwrap(), Some(1));
    let (matched, _) = pos.identify(&face_a()).unwrap().unwrap();
    assert_eq!(matched.balance, 70.0);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn embeddings_survive_restart_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pos.redb");
    let embedding: Vec<f32> = vec![0.11, -0.42, 0.93, 0.04];

    let alice_id = {
        let store = RedbStore::open(&path).unwrap();
        let pos = Pos::open(Box::new(store), PosConfig::default().with_dimension(DIM)).unwrap();
        pos.enroll("alice", &embedding).unwrap().id
    };

    let store = RedbStore::open(&path).unwrap();
    let pos = Pos::open(Box::new(store), PosConfig::default().with_dimension(DIM)).unwrap();

    // Reload is numerically exact, and the same query matches.
    let all = pos.identities().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].embedding, embedding);

    let (matched, distance) = pos.identify(&embedding).unwrap().expect("should match");
    assert_eq!(matched.id, alice_id);
    assert!(distance < 1e-6);
}

#[test]
fn charges_work_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pos.redb");

    {
        let store = RedbStore::open(&path).unwrap();
        let pos = Pos::open(Box::new(store), PosConfig::default().with_dimension(DIM)).unwrap();
        pos.enroll("alice", &face_a()).unwrap();
        pos.stock_item(7, 10).unwrap();
        pos.charge(&face_a(), &request(30.0, vec![line(7, 1, 30.0)]))
            .unwrap();
    }

    let store = RedbStore::open(&path).unwrap();
    let pos = Pos::open(Box::new(store), PosConfig::default().with_dimension(DIM)).unwrap();

    let receipt = pos
        .charge(&face_a(), &request(30.0, vec![line(7, 1, 30.0)]))
        .unwrap();
    assert_eq!(receipt.transaction.balance, 40.0);
    assert_eq!(pos.remaining(7).unwrap(), Some(8));
}

#[test]
fn tie_break_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pos.redb");

    let first_id = {
        let store = RedbStore::open(&path).unwrap();
        let pos = Pos::open(Box::new(store), PosConfig::default().with_dimension(DIM)).unwrap();
        let first = pos.enroll("first", &face_a()).unwrap();
        pos.enroll("second", &face_a()).unwrap();

        // Before restart: earliest enrollment wins the tie.
        let (matched, _) = pos.identify(&face_a()).unwrap().unwrap();
        assert_eq!(matched.id, first.id);
        first.id
    };

    let store = RedbStore::open(&path).unwrap();
    let pos = Pos::open(Box::new(store), PosConfig::default().with_dimension(DIM)).unwrap();

    let (matched, _) = pos.identify(&face_a()).unwrap().unwrap();
    assert_eq!(matched.id, first_id, "tie-break must not change across reload");
}
