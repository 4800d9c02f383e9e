use cloak_primitives::{AccountPublicKey, AliasHash, EthAddress, NoteValue, TxHash};

use super::common::{note, ts, user};
use crate::storage::{Alias, TxAction, UserData, UserSigningKey, UserTx, WalletDb};

/// Runs each check against RocksDB and the in-memory store.
macro_rules! store_tests {
    ($($name:ident),* $(,)?) => {
        mod rocks {
            $(
                #[test]
                fn $name() {
                    crate::tests::common::init_logging();
                    let (_dir, db) = crate::tests::common::temp_rocks();
                    super::$name(&db);
                }
            )*
        }

        mod memory {
            $(
                #[test]
                fn $name() {
                    crate::tests::common::init_logging();
                    let db = crate::storage::MemoryStore::new();
                    super::$name(&db);
                }
            )*
        }
    };
}

store_tests!(
    user_notes_are_unspent_and_ordered,
    nullify_note_is_idempotent,
    note_found_by_nullifier,
    re_adding_note_replaces_nullifier,
    users_round_trip,
    update_missing_user_is_noop,
    user_txs_newest_first,
    user_tx_last_write_wins,
    settle_user_tx,
    signing_keys_by_account,
    alias_generations,
    alias_hash_by_address_respects_max_nonce,
    alias_nonce_ties_pick_greatest_key,
    key_values,
    remove_user_only_touches_that_user,
    reset_users_keeps_users_and_blobs,
    clear_wipes_everything,
);

fn user_tx(owner: &UserData, hash_byte: u8, created_secs: i64) -> UserTx {
    UserTx {
        tx_hash: TxHash([hash_byte; 32]),
        user_id: owner.id,
        action: TxAction::Transfer,
        asset_id: 0,
        value: NoteValue::from(10u64),
        settled: false,
        created: ts(created_secs),
        recipient: None,
    }
}

fn address(seed: u8) -> AccountPublicKey {
    AccountPublicKey::new([seed; 32], [seed.wrapping_add(100); 32])
}

fn user_notes_are_unspent_and_ordered(db: &dyn WalletDb) {
    let alice = user(1);
    let bob = user(2);
    for index in [5, 1, 3] {
        db.add_note(&note(&alice, index, 10 * index)).unwrap();
    }
    db.add_note(&note(&bob, 2, 99)).unwrap();
    db.nullify_note(3).unwrap();

    let notes = db.get_user_notes(&alice.id).unwrap();
    let indices: Vec<u64> = notes.iter().map(|n| n.index).collect();
    assert_eq!(indices, vec![1, 5]);
    assert!(notes.iter().all(|n| !n.nullified && n.owner == alice.id));
    assert_eq!(notes[1].value, NoteValue::from(50u64));
}

fn nullify_note_is_idempotent(db: &dyn WalletDb) {
    let alice = user(1);
    db.add_note(&note(&alice, 7, 40)).unwrap();

    db.nullify_note(7).unwrap();
    let once = db.get_note(7).unwrap().unwrap();
    db.nullify_note(7).unwrap();
    let twice = db.get_note(7).unwrap().unwrap();

    assert!(once.nullified);
    assert_eq!(once, twice);
    // Unknown index is a no-op.
    db.nullify_note(1234).unwrap();
    assert!(db.get_note(1234).unwrap().is_none());
}

fn note_found_by_nullifier(db: &dyn WalletDb) {
    let alice = user(1);
    let stored = note(&alice, 4, 25);
    db.add_note(&stored).unwrap();

    let found = db.get_note_by_nullifier(&stored.nullifier).unwrap();
    assert_eq!(found, Some(stored));
    assert!(
        db.get_note_by_nullifier(&cloak_privacy::Nullifier([9u8; 32]))
            .unwrap()
            .is_none()
    );
}

fn re_adding_note_replaces_nullifier(db: &dyn WalletDb) {
    let alice = user(1);
    let first = note(&alice, 4, 25);
    let second = note(&alice, 4, 30);
    db.add_note(&first).unwrap();
    db.add_note(&second).unwrap();

    assert!(db.get_note_by_nullifier(&first.nullifier).unwrap().is_none());
    assert_eq!(
        db.get_note_by_nullifier(&second.nullifier).unwrap(),
        Some(second)
    );
}

fn users_round_trip(db: &dyn WalletDb) {
    let alice = user(1);
    let bob = user(2);
    db.add_user(&alice).unwrap();
    db.add_user(&bob).unwrap();

    assert_eq!(db.get_user(&alice.id).unwrap(), Some(alice.clone()));
    assert_eq!(db.get_users().unwrap().len(), 2);

    let mut synced = alice.clone();
    synced.synced_to_rollup = 12;
    db.update_user(&synced).unwrap();
    assert_eq!(db.get_user(&alice.id).unwrap().unwrap().synced_to_rollup, 12);
}

fn update_missing_user_is_noop(db: &dyn WalletDb) {
    let ghost = user(9);
    db.update_user(&ghost).unwrap();
    assert!(db.get_user(&ghost.id).unwrap().is_none());
    assert!(db.get_users().unwrap().is_empty());
}

fn user_txs_newest_first(db: &dyn WalletDb) {
    let alice = user(1);
    db.add_user_tx(&user_tx(&alice, 1, 100)).unwrap();
    db.add_user_tx(&user_tx(&alice, 2, 300)).unwrap();
    db.add_user_tx(&user_tx(&alice, 3, 200)).unwrap();
    db.add_user_tx(&user_tx(&user(2), 4, 400)).unwrap();

    let hashes: Vec<u8> = db
        .get_user_txs(&alice.id)
        .unwrap()
        .iter()
        .map(|tx| tx.tx_hash.0[0])
        .collect();
    assert_eq!(hashes, vec![2, 3, 1]);
}

fn user_tx_last_write_wins(db: &dyn WalletDb) {
    let alice = user(1);
    let mut tx = user_tx(&alice, 1, 100);
    db.add_user_tx(&tx).unwrap();
    tx.value = NoteValue::from(77u64);
    tx.recipient = Some(EthAddress([3u8; 20]));
    db.add_user_tx(&tx).unwrap();

    let stored = db.get_user_txs(&alice.id).unwrap();
    assert_eq!(stored, vec![tx]);
}

fn settle_user_tx(db: &dyn WalletDb) {
    let alice = user(1);
    let bob = user(2);
    let tx = user_tx(&alice, 1, 100);
    let shared = UserTx {
        user_id: bob.id,
        ..tx.clone()
    };
    db.add_user_tx(&tx).unwrap();
    db.add_user_tx(&shared).unwrap();

    assert!(db.is_user_tx_present(&alice.id, &tx.tx_hash).unwrap());
    db.settle_user_tx(&alice.id, &tx.tx_hash).unwrap();

    let settled = db.get_user_tx(&alice.id, &tx.tx_hash).unwrap().unwrap();
    assert!(settled.settled);
    assert_eq!(settled.created, tx.created);
    // Same hash, other user: untouched.
    assert!(!db.get_user_tx(&bob.id, &tx.tx_hash).unwrap().unwrap().settled);
    assert_eq!(db.get_user_txs(&bob.id).unwrap(), vec![shared]);
    assert_eq!(db.get_user_txs(&alice.id).unwrap().len(), 1);
    // Missing row: no-op.
    db.settle_user_tx(&alice.id, &TxHash([0xff; 32])).unwrap();
    assert!(!db.is_user_tx_present(&alice.id, &TxHash([0xff; 32])).unwrap());
}

fn signing_keys_by_account(db: &dyn WalletDb) {
    let alice = user(1);
    let bob = user(2);
    for (key, tree_index) in [([1u8; 32], 10), ([2u8; 32], 11)] {
        db.add_user_signing_key(&UserSigningKey {
            account_id: alice.id,
            key,
            tree_index,
        })
        .unwrap();
    }
    db.add_user_signing_key(&UserSigningKey {
        account_id: bob.id,
        key: [1u8; 32],
        tree_index: 20,
    })
    .unwrap();

    assert_eq!(db.get_user_signing_keys(&alice.id).unwrap().len(), 2);
    assert_eq!(
        db.get_user_signing_key_index(&alice.id, &[2u8; 32]).unwrap(),
        Some(11)
    );
    assert_eq!(
        db.get_user_signing_key_index(&bob.id, &[1u8; 32]).unwrap(),
        Some(20)
    );
    assert_eq!(
        db.get_user_signing_key_index(&bob.id, &[2u8; 32]).unwrap(),
        None
    );

    db.remove_user_signing_keys(&alice.id).unwrap();
    assert!(db.get_user_signing_keys(&alice.id).unwrap().is_empty());
    assert_eq!(db.get_user_signing_keys(&bob.id).unwrap().len(), 1);
}

fn alias_generations(db: &dyn WalletDb) {
    let hash = AliasHash::from_alias("alice");
    for nonce in 0..3u8 {
        db.add_alias(&Alias {
            alias_hash: hash,
            address: address(nonce),
            latest_nonce: u32::from(nonce),
        })
        .unwrap();
    }

    assert_eq!(db.get_latest_nonce_by_alias_hash(&hash).unwrap(), Some(2));
    assert_eq!(db.get_aliases(&hash).unwrap().len(), 3);
    assert_eq!(
        db.get_address_by_alias_hash(&hash, None).unwrap(),
        Some(address(2))
    );
    assert_eq!(
        db.get_address_by_alias_hash(&hash, Some(1)).unwrap(),
        Some(address(1))
    );
    assert_eq!(
        db.get_latest_nonce_by_alias_hash(&AliasHash::from_alias("nobody"))
            .unwrap(),
        None
    );

    let mut bumped = db.get_alias(&hash, &address(0)).unwrap().unwrap();
    bumped.latest_nonce = 5;
    db.update_alias(&bumped).unwrap();
    assert_eq!(db.get_aliases(&hash).unwrap().len(), 3);
    assert_eq!(db.get_alias(&hash, &address(0)).unwrap(), Some(bumped));
    assert_eq!(db.get_latest_nonce_by_alias_hash(&hash).unwrap(), Some(5));
    assert_eq!(db.get_latest_nonce_by_address(&address(0)).unwrap(), Some(5));
}

fn alias_hash_by_address_respects_max_nonce(db: &dyn WalletDb) {
    let owner = address(1);
    let names = ["a0", "a1", "a2"];
    for (nonce, name) in names.iter().enumerate() {
        db.add_alias(&Alias {
            alias_hash: AliasHash::from_alias(name),
            address: owner,
            latest_nonce: nonce as u32,
        })
        .unwrap();
    }

    assert_eq!(db.get_latest_nonce_by_address(&owner).unwrap(), Some(2));
    assert_eq!(
        db.get_alias_hash_by_address(&owner, Some(1)).unwrap(),
        Some(AliasHash::from_alias("a1"))
    );
    assert_eq!(
        db.get_alias_hash_by_address(&owner, None).unwrap(),
        Some(AliasHash::from_alias("a2"))
    );
    assert_eq!(db.get_aliases_by_address(&owner).unwrap().len(), 3);
    assert!(db.get_aliases_by_address(&address(2)).unwrap().is_empty());
}

fn alias_nonce_ties_pick_greatest_key(db: &dyn WalletDb) {
    let hash = AliasHash::from_alias("carol");
    // Higher key first, so insertion order cannot explain the winner.
    for seed in [9, 4, 6] {
        db.add_alias(&Alias {
            alias_hash: hash,
            address: address(seed),
            latest_nonce: 3,
        })
        .unwrap();
    }
    db.add_alias(&Alias {
        alias_hash: hash,
        address: address(1),
        latest_nonce: 2,
    })
    .unwrap();

    for _ in 0..2 {
        assert_eq!(
            db.get_address_by_alias_hash(&hash, None).unwrap(),
            Some(address(9))
        );
    }
    assert_eq!(
        db.get_address_by_alias_hash(&hash, Some(2)).unwrap(),
        Some(address(1))
    );

    let owner = address(20);
    let names = ["x", "y", "z"];
    for name in names {
        db.add_alias(&Alias {
            alias_hash: AliasHash::from_alias(name),
            address: owner,
            latest_nonce: 7,
        })
        .unwrap();
    }
    let expected = names
        .iter()
        .map(|n| AliasHash::from_alias(n))
        .max_by_key(|h| *h.as_bytes())
        .unwrap();
    assert_eq!(
        db.get_alias_hash_by_address(&owner, None).unwrap(),
        Some(expected)
    );
    assert_eq!(
        db.get_alias_hash_by_address(&owner, Some(7)).unwrap(),
        Some(expected)
    );
}

fn key_values(db: &dyn WalletDb) {
    db.add_key("sync-cursor", &[1, 2, 3]).unwrap();
    assert_eq!(db.get_key("sync-cursor").unwrap(), Some(vec![1, 2, 3]));
    db.add_key("sync-cursor", &[4]).unwrap();
    assert_eq!(db.get_key("sync-cursor").unwrap(), Some(vec![4]));
    db.delete_key("sync-cursor").unwrap();
    assert_eq!(db.get_key("sync-cursor").unwrap(), None);
    db.delete_key("never-set").unwrap();
}

/// Two users with one row of each kind.
fn seed_two_users(db: &dyn WalletDb) -> (UserData, UserData) {
    let alice = user(1);
    let bob = user(2);
    for (i, u) in [&alice, &bob].into_iter().enumerate() {
        db.add_user(u).unwrap();
        db.add_note(&note(u, i as u64, 100)).unwrap();
        db.add_user_tx(&user_tx(u, i as u8 + 1, 100)).unwrap();
        db.add_user_signing_key(&UserSigningKey {
            account_id: u.id,
            key: [i as u8 + 1; 32],
            tree_index: i as u64,
        })
        .unwrap();
    }
    (alice, bob)
}

fn remove_user_only_touches_that_user(db: &dyn WalletDb) {
    let (alice, bob) = seed_two_users(db);

    db.remove_user(&alice.id).unwrap();

    assert!(db.get_user(&alice.id).unwrap().is_none());
    assert!(db.get_user_notes(&alice.id).unwrap().is_empty());
    assert!(db.get_note(0).unwrap().is_none());
    assert!(db.get_user_txs(&alice.id).unwrap().is_empty());
    assert!(db.get_user_signing_keys(&alice.id).unwrap().is_empty());

    assert!(db.get_user(&bob.id).unwrap().is_some());
    assert_eq!(db.get_user_notes(&bob.id).unwrap().len(), 1);
    assert_eq!(db.get_user_txs(&bob.id).unwrap().len(), 1);
    assert_eq!(db.get_user_signing_keys(&bob.id).unwrap().len(), 1);
}

fn reset_users_keeps_users_and_blobs(db: &dyn WalletDb) {
    let (alice, bob) = seed_two_users(db);
    let mut synced = alice.clone();
    synced.synced_to_rollup = 40;
    db.update_user(&synced).unwrap();
    db.add_alias(&Alias {
        alias_hash: AliasHash::from_alias("alice"),
        address: alice.public_key(),
        latest_nonce: 0,
    })
    .unwrap();
    db.add_key("wallet-meta", b"kept").unwrap();

    db.reset_users().unwrap();

    let users = db.get_users().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.synced_to_rollup == -1));
    assert_eq!(db.get_key("wallet-meta").unwrap(), Some(b"kept".to_vec()));
    for u in [&alice, &bob] {
        assert!(db.get_user_notes(&u.id).unwrap().is_empty());
        assert!(db.get_user_txs(&u.id).unwrap().is_empty());
        assert!(db.get_user_signing_keys(&u.id).unwrap().is_empty());
    }
    assert!(db.get_aliases(&AliasHash::from_alias("alice")).unwrap().is_empty());
}

fn clear_wipes_everything(db: &dyn WalletDb) {
    let (alice, _) = seed_two_users(db);
    db.add_key("wallet-meta", b"gone").unwrap();

    db.clear().unwrap();

    assert!(db.get_users().unwrap().is_empty());
    assert!(db.get_user_notes(&alice.id).unwrap().is_empty());
    assert_eq!(db.get_key("wallet-meta").unwrap(), None);
}
