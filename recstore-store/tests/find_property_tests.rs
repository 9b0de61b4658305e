//! Property-Based Tests for Find Coordination
//!
//! **Property 1: Single flight**
//!
//! For any valid id, any number of finds issued in the same scheduler turn
//! SHALL reach the adapter exactly once and resolve to the same record.
//!
//! **Property 2: Id spelling**
//!
//! For any integer id, the integer and its decimal text SHALL name the same
//! record and SHALL NOT produce an id-mismatch warning.
//!
//! **Property 3: Coalesced batch size**
//!
//! For any batch of distinct ids and any coalescing limit, no `find_many`
//! call SHALL carry more ids than the limit, and every id SHALL be fetched
//! exactly once.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use recstore_store::{FindOptions, RawId, Store, StoreConfig};
use recstore_test_utils::generators::{arb_int_id_spellings, arb_valid_id};
use recstore_test_utils::{
    person_payload, person_schema, person_store, person_store_with_warnings, CoalescingAdapter,
    CollectingWarnings, CountingAdapter,
};
use tokio::runtime::{Builder, Runtime};

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("current-thread runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: concurrent finds share one adapter call.
    #[test]
    fn prop_concurrent_finds_single_flight(id in arb_valid_id(), callers in 2usize..8) {
        let rt = test_runtime();
        rt.block_on(async {
            let adapter = Arc::new(CountingAdapter::people("Tom"));
            let store = person_store(adapter.clone());

            let finds = (0..callers)
                .map(|_| store.find_record("person", id.clone(), FindOptions::default()))
                .collect::<Result<Vec<_>, _>>()
                .expect("finds accepted");
            let records = futures_util::future::try_join_all(finds)
                .await
                .expect("finds resolve");

            prop_assert_eq!(adapter.find_record_calls(), 1);
            prop_assert!(records.windows(2).all(|pair| pair[0].lid == pair[1].lid));
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Property 2: integer and text spellings of an id agree.
    #[test]
    fn prop_int_and_text_ids_agree((int_id, text_id) in arb_int_id_spellings()) {
        let rt = test_runtime();
        rt.block_on(async {
            let RawId::Int(n) = int_id else {
                unreachable!("generator yields integers first");
            };
            let adapter = Arc::new(CountingAdapter::returning(person_payload(n, "Tom")));
            let warnings = Arc::new(CollectingWarnings::new());
            let store = person_store_with_warnings(adapter.clone(), warnings.clone());

            let first = store
                .find_record("person", int_id, FindOptions::default())
                .expect("find accepted")
                .await
                .expect("find resolves");
            let second = store
                .find_record("person", text_id, FindOptions::default())
                .expect("find accepted")
                .await
                .expect("find resolves");

            prop_assert_eq!(first.lid, second.lid);
            prop_assert_eq!(adapter.find_record_calls(), 1);
            prop_assert!(warnings.is_empty());
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Property 3: coalesced batches respect the configured limit.
    #[test]
    fn prop_coalesced_batches_respect_limit(
        ids in proptest::collection::btree_set(1u32..10_000, 2..40),
        limit in 1usize..12,
    ) {
        let rt = test_runtime();
        rt.block_on(async {
            let adapter = Arc::new(CoalescingAdapter::echoing());
            let store = Store::builder()
                .model(person_schema())
                .adapter(adapter.clone())
                .config(StoreConfig::default().with_max_coalesced_ids(limit))
                .build()
                .expect("store builds");

            let records = store
                .find_by_ids("person", ids.iter().copied(), FindOptions::default())
                .expect("finds accepted")
                .await
                .expect("finds resolve");
            prop_assert_eq!(records.len(), ids.len());

            let calls = adapter.find_many_calls();
            prop_assert!(calls.iter().all(|batch| batch.len() <= limit && batch.len() > 1));

            let fetched: usize =
                calls.iter().map(Vec::len).sum::<usize>() + adapter.find_record_calls();
            prop_assert_eq!(fetched, ids.len());

            let distinct: BTreeSet<&String> = calls.iter().flatten().collect();
            prop_assert_eq!(distinct.len(), calls.iter().map(Vec::len).sum::<usize>());
            Ok::<(), TestCaseError>(())
        })?;
    }
}
