use crate::{
    foundation::clock::ManualClock,
    storage::kv::{KeyValueStore, MemoryStore},
};

use super::*;

fn ledger(start: i64) -> Arc<CreditLedger> {
    let store: SharedStore = Arc::new(MemoryStore::new());
    Arc::new(CreditLedger::new(store, Arc::new(ManualClock::new(1_000)), start))
}

#[test]
fn missing_slot_reads_starting_balance() {
    let l = ledger(10);
    assert_eq!(l.balance().unwrap(), 10);
    assert!(l.transactions().unwrap().is_empty());
}

#[test]
fn commit_keeps_the_debit() {
    let l = ledger(3);
    let charge = l.spend("generate").unwrap();
    assert_eq!(l.balance().unwrap(), 2);
    charge.commit();
    assert_eq!(l.balance().unwrap(), 2);
}

#[test]
fn refund_restores_exactly_one() {
    let l = ledger(3);
    let charge = l.spend("generate").unwrap();
    assert_eq!(charge.refund().unwrap(), 3);
    assert_eq!(l.balance().unwrap(), 3);

    let kinds: Vec<_> = l.transactions().unwrap().iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TransactionKind::Spend, TransactionKind::Refund]);
}

#[test]
fn dropped_charge_refunds_once() {
    let l = ledger(1);
    {
        let _charge = l.spend("cancelled").unwrap();
        assert_eq!(l.balance().unwrap(), 0);
    }
    assert_eq!(l.balance().unwrap(), 1);
}

#[test]
fn empty_balance_rejects_spend() {
    let l = ledger(0);
    let err = l.spend("generate").unwrap_err();
    assert!(matches!(err, StudioError::InsufficientCredits { balance: 0 }));
    assert_eq!(l.balance().unwrap(), 0);
    assert!(l.transactions().unwrap().is_empty());
}

#[test]
fn grant_adds_and_validates() {
    let l = ledger(0);
    assert_eq!(l.grant(5, "purchase").unwrap(), 5);
    assert!(l.grant(0, "nothing").is_err());
    assert_eq!(l.balance().unwrap(), 5);
}

#[test]
fn transaction_history_is_bounded() {
    let l = ledger(0);
    for _ in 0..(MAX_TRANSACTIONS + 20) {
        l.grant(1, "reward").unwrap();
    }
    let txs = l.transactions().unwrap();
    assert_eq!(txs.len(), MAX_TRANSACTIONS);
    assert!(txs.iter().all(|t| t.at_ms == 1_000 && t.amount == 1));
}

#[test]
fn corrupt_balance_is_a_storage_error() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    store.set_string(BALANCE_KEY, "lots").unwrap();
    let l = Arc::new(CreditLedger::new(store, Arc::new(ManualClock::new(0)), 10));
    assert!(matches!(l.balance(), Err(StudioError::Storage(_))));
    assert!(l.spend("x").is_err());
}

#[test]
fn ledgers_sharing_a_file_never_lose_debits() {
    let dir = std::env::temp_dir().join(format!(
        "mockforge_ledger_shared_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let path = dir.join("store.json");
    let open = || {
        let store: SharedStore = Arc::new(crate::storage::kv::FileStore::open(&path).unwrap());
        Arc::new(CreditLedger::new(store, Arc::new(ManualClock::new(1_000)), 1000))
    };

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let ledger = open();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    ledger.spend("generate").unwrap().commit();
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(open().balance().unwrap(), 800);
    std::fs::remove_dir_all(&dir).ok();
}
