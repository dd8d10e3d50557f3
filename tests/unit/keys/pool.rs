use std::sync::Arc;

use super::*;
use crate::{
    foundation::clock::{Clock, ManualClock},
    storage::kv::{KeyValueStore, MemoryStore},
};

const T0: u64 = 1_700_000_000_000;

fn pool(keys: &[&str]) -> (KeyPool, ManualClock, Arc<MemoryStore>) {
    let clock = ManualClock::new(T0);
    let store = Arc::new(MemoryStore::new());
    let pool = KeyPool::new(
        keys.iter().map(|k| (*k).to_string()).collect(),
        store.clone(),
        Arc::new(clock.clone()),
    );
    (pool, clock, store)
}

fn secret(c: Option<Credential>) -> String {
    c.expect("credential").secret().to_string()
}

#[test]
fn healthy_pool_rotates_least_recently_used() {
    let (pool, clock, _) = pool(&["key-a", "key-b", "key-c"]);
    let picks: Vec<String> = (0..3)
        .map(|_| {
            clock.advance_ms(1);
            secret(pool.select())
        })
        .collect();
    assert_eq!(picks, vec!["key-a", "key-b", "key-c"]);

    clock.advance_ms(1);
    assert_eq!(secret(pool.select()), "key-a");
}

#[test]
fn same_instant_selections_still_spread() {
    let (pool, _, _) = pool(&["key-a", "key-b", "key-c"]);
    let mut picks: Vec<String> = (0..3).map(|_| secret(pool.select())).collect();
    picks.sort();
    picks.dedup();
    assert_eq!(picks.len(), 3);
}

#[test]
fn empty_pool_selects_nothing() {
    let (pool, _, _) = pool(&[]);
    assert!(pool.is_empty());
    assert!(pool.select().is_none());
}

#[test]
fn duplicate_keys_collapse() {
    let (pool, _, _) = pool(&["k1", "k1", " k1 ", "k2"]);
    assert_eq!(pool.len(), 2);
}

#[test]
fn single_quota_failed_key_is_still_returned() {
    let (pool, _, _) = pool(&["only-key"]);
    pool.report_failure("only-key", true);
    assert_eq!(secret(pool.select()), "only-key");
    let rec = pool.record("only-key").unwrap();
    assert_eq!(rec.circuit_state, CircuitState::Open);
    assert!(rec.last_failure_was_quota);
}

#[test]
fn quota_failure_excludes_until_deadline_then_allows_one_trial() {
    let (pool, clock, _) = pool(&["bad-key", "good-key"]);
    pool.report_failure("bad-key", true);

    for _ in 0..4 {
        clock.advance_ms(10_000);
        assert_eq!(secret(pool.select()), "good-key");
    }
    assert!(pool.status()[0].on_cooldown);

    clock.set_ms(T0 + 300_000);
    pool.report_failure("good-key", false);
    // good-key is now inside its short window, bad-key is past its deadline
    assert_eq!(secret(pool.select()), "bad-key");
    let rec = pool.record("bad-key").unwrap();
    assert_eq!(rec.circuit_state, CircuitState::HalfOpen);
    assert!(pool.status()[0].on_cooldown, "trial in flight blocks further use");

    pool.report_success("bad-key");
    let rec = pool.record("bad-key").unwrap();
    assert_eq!(rec.circuit_state, CircuitState::Closed);
    assert_eq!(rec.consecutive_failures, 0);
    assert!(!pool.status()[0].on_cooldown);
}

#[test]
fn half_open_failure_reopens_with_short_deadline() {
    let (pool, clock, _) = pool(&["k"]);
    pool.report_failure("k", true);
    clock.advance_ms(300_000);
    pool.select();
    assert_eq!(pool.record("k").unwrap().circuit_state, CircuitState::HalfOpen);

    pool.report_failure("k", false);
    let rec = pool.record("k").unwrap();
    assert_eq!(rec.circuit_state, CircuitState::Open);
    assert_eq!(
        rec.half_open_retry_at,
        Some(clock.now_ms() + pool.policy().half_open_retry_ms)
    );
}

#[test]
fn five_consecutive_failures_open_the_circuit() {
    let (pool, clock, _) = pool(&["k"]);
    for n in 1..=5u32 {
        assert_eq!(
            pool.record("k").unwrap().circuit_state,
            CircuitState::Closed,
            "closed before failure {n}"
        );
        pool.report_failure("k", false);
        clock.advance_ms(1_000);
    }
    let rec = pool.record("k").unwrap();
    assert_eq!(rec.circuit_state, CircuitState::Open);
    assert_eq!(rec.consecutive_failures, 5);
    assert_eq!(rec.total_requests, 5);
    assert!(rec.half_open_retry_at.is_some());
}

#[test]
fn plain_failure_applies_short_window_without_opening() {
    let (pool, clock, _) = pool(&["k1", "k2"]);
    pool.report_failure("k1", false);
    assert_eq!(pool.record("k1").unwrap().circuit_state, CircuitState::Closed);
    clock.advance_ms(1);
    assert_eq!(secret(pool.select()), "k2");
    clock.advance_ms(60_000);
    pool.report_failure("k2", false);
    assert_eq!(secret(pool.select()), "k1");
}

#[test]
fn desperation_picks_least_recently_failed() {
    let (pool, clock, _) = pool(&["k1", "k2"]);
    pool.report_failure("k2", true);
    clock.advance_ms(5);
    pool.report_failure("k1", true);
    clock.advance_ms(5);
    assert_eq!(secret(pool.select()), "k2");
}

#[test]
fn success_resets_failure_state_and_counts() {
    let (pool, _, _) = pool(&["k"]);
    pool.report_failure("k", false);
    pool.report_success("k");
    let rec = pool.record("k").unwrap();
    assert_eq!(rec.consecutive_failures, 0);
    assert_eq!(rec.success_count, 1);
    assert_eq!(rec.total_requests, 2);
    assert!(!rec.last_failure_was_quota);
}

#[test]
fn state_is_shared_through_the_store() {
    let clock = ManualClock::new(T0);
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let keys = vec!["k1".to_string(), "k2".to_string()];
    let tab_a = KeyPool::new(keys.clone(), store.clone(), Arc::new(clock.clone()));
    let tab_b = KeyPool::new(keys, store.clone(), Arc::new(clock.clone()));

    tab_a.report_failure("k1", true);
    clock.advance_ms(1);
    assert_eq!(secret(tab_b.select()), "k2");
    assert!(tab_b.status()[0].on_cooldown);
    assert!(store.get_string(STATE_KEY).unwrap().is_some());
}

#[test]
fn corrupt_state_is_ignored() {
    let (pool, _, store) = pool(&["k"]);
    store.set_string(STATE_KEY, "garbage").unwrap();
    assert_eq!(secret(pool.select()), "k");
    let raw = store.get_string(STATE_KEY).unwrap().unwrap();
    assert!(raw.contains("\"circuitState\":\"CLOSED\""));
}

#[test]
fn status_masks_secrets() {
    let (pool, _, _) = pool(&["sk-very-secret-1234"]);
    let status = pool.status();
    assert_eq!(status[0].key, "...1234");
    assert!(!format!("{:?}", pool.select().unwrap()).contains("secret"));
}

#[test]
fn fewer_failures_outrank_older_use() {
    let (pool, clock, _) = pool(&["k1", "k2"]);
    clock.advance_ms(1);
    assert_eq!(secret(pool.select()), "k1");
    clock.advance_ms(1);
    assert_eq!(secret(pool.select()), "k2");
    pool.report_failure("k1", false);

    // k1 is idle longest but still carries a failure once its window lapses
    clock.advance_ms(60_001);
    assert_eq!(secret(pool.select()), "k2");
}
