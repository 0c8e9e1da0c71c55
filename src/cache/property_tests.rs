//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check TTL, overwrite and statistics behaviour of the
//! cache store against a simulated clock.

use proptest::prelude::*;

use crate::cache::{KeyValueStore, Lookup};
use crate::test_support::{create_store, FAILED_TTL_MS, STORAGE_PREFIX, SUCCESS_TTL_MS};

// == Strategies ==
/// Generates item slugs
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9-]{1,32}".prop_map(|s| s)
}

/// Generates lookup outcomes: a URL or a failure
fn outcome_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("https://cdn\\.example\\.com/[a-z0-9]{1,16}\\.jpg".prop_map(|s| s))
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: Option<String> },
    Get { key: String },
    Advance { ms: u64 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), outcome_strategy()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        (0u64..20_000).prop_map(|ms| CacheOp::Advance { ms }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // A value put and read back before its TTL elapses is returned unchanged.
    #[test]
    fn prop_roundtrip_before_ttl(
        key in key_strategy(),
        value in outcome_strategy(),
        elapsed in 0u64..FAILED_TTL_MS,
    ) {
        let (store, _, clock) = create_store();

        store.put(&key, value.clone());
        clock.advance_ms(elapsed);

        prop_assert_eq!(store.get(&key), Lookup::Hit(value));
    }

    // Validity depends only on the entry's class: failures age out at the
    // failed TTL, values at the success TTL.
    #[test]
    fn prop_ttl_asymmetry(
        key in key_strategy(),
        value in outcome_strategy(),
        elapsed in 0u64..(2 * SUCCESS_TTL_MS),
    ) {
        let (store, _, clock) = create_store();

        store.put(&key, value.clone());
        clock.advance_ms(elapsed);

        let ttl = if value.is_none() { FAILED_TTL_MS } else { SUCCESS_TTL_MS };
        if elapsed < ttl {
            prop_assert_eq!(store.get(&key), Lookup::Hit(value));
        } else {
            prop_assert_eq!(store.get(&key), Lookup::Miss);
        }
    }

    // The last write wins regardless of the previous entry's class.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        first in outcome_strategy(),
        second in outcome_strategy(),
    ) {
        let (store, storage, _) = create_store();

        store.put(&key, first);
        store.put(&key, second.clone());

        prop_assert_eq!(store.get(&key), Lookup::Hit(second));
        prop_assert_eq!(storage.len(), 1);
    }

    // Arbitrary garbage in storage never surfaces as a hit.
    #[test]
    fn prop_garbage_is_miss(key in key_strategy(), garbage in "[a-z ]{0,64}") {
        let (store, storage, _) = create_store();
        storage.set(&format!("{STORAGE_PREFIX}{key}"), &garbage).unwrap();

        prop_assert_eq!(store.get(&key), Lookup::Miss);
    }

    // Every read is counted exactly once as a hit, negative hit or miss.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let (store, _, clock) = create_store();
        let mut expected_hits: u64 = 0;
        let mut expected_negative: u64 = 0;
        let mut expected_misses: u64 = 0;
        let mut expected_writes: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    store.put(&key, value);
                    expected_writes += 1;
                }
                CacheOp::Get { key } => match store.get(&key) {
                    Lookup::Hit(Some(_)) => expected_hits += 1,
                    Lookup::Hit(None) => expected_negative += 1,
                    Lookup::Miss => expected_misses += 1,
                },
                CacheOp::Advance { ms } => clock.advance_ms(ms),
            }
        }

        let stats = store.snapshot_stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.negative_hits, expected_negative, "Negative hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.writes, expected_writes, "Writes mismatch");
        prop_assert_eq!(stats.write_failures, 0);
    }
}
