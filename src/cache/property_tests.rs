//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the key scheme, the purge policy, the association
//! closure, and stats accounting through the interception layer.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::json;

use crate::cache::{
    derive_key, hash_key, Arg, AssociationGraph, EntryStore, ManualClock, MapKey, Ttl,
};
use crate::config::{CacheConfiguration, CacheOptions, ModelConfig};
use crate::intercept::ModelCache;
use crate::memory::MemoryModel;

// == Strategies ==
/// Arbitrary nested call arguments
fn arg_strategy() -> impl Strategy<Value = Arg> {
    let leaf = prop_oneof![
        Just(Arg::Null),
        any::<bool>().prop_map(Arg::Bool),
        any::<i64>().prop_map(Arg::Int),
        (-1.0e9f64..1.0e9).prop_map(Arg::Float),
        "[a-zA-Z0-9 _\"\\\\]{0,16}".prop_map(Arg::Str),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Arg::Bytes),
        "[a-z]{1,8}".prop_map(Arg::Symbol),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Arg::List),
            prop::collection::btree_map(map_key_strategy(), inner, 0..6).prop_map(Arg::Map),
        ]
    })
}

fn map_key_strategy() -> impl Strategy<Value = MapKey> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(MapKey::Str),
        "[a-z]{1,6}".prop_map(MapKey::Symbol),
    ]
}

fn model_name_strategy() -> impl Strategy<Value = String> {
    "[A-E]".prop_map(|s| s)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Rendering the same call twice, or a clone of it, yields the same hash.
    #[test]
    fn prop_key_is_stable(args in prop::collection::vec(arg_strategy(), 0..5)) {
        let first = hash_key(&derive_key("User", "find_all", &args).unwrap());
        let again = hash_key(&derive_key("User", "find_all", &args.clone()).unwrap());

        prop_assert_eq!(first.len(), 64);
        prop_assert_eq!(first, again);
    }

    // Swapping two different arguments changes the hash.
    #[test]
    fn prop_key_is_order_sensitive(a in arg_strategy(), b in arg_strategy()) {
        let forward = derive_key("User", "find_all", &[a.clone(), b.clone()]).unwrap();
        let backward = derive_key("User", "find_all", &[b.clone(), a.clone()]).unwrap();

        if forward != backward {
            prop_assert_ne!(hash_key(&forward), hash_key(&backward));
        } else {
            // Only identical renderings commute.
            prop_assert_eq!(
                derive_key("User", "find_all", &[a]).unwrap(),
                derive_key("User", "find_all", &[b]).unwrap()
            );
        }
    }

    // Model and operation names are part of the key.
    #[test]
    fn prop_key_separates_models_and_operations(args in prop::collection::vec(arg_strategy(), 0..3)) {
        let user = derive_key("User", "find_all", &args).unwrap();
        let post = derive_key("Post", "find_all", &args).unwrap();
        let count = derive_key("User", "count", &args).unwrap();

        prop_assert_ne!(&user, &post);
        prop_assert_ne!(&user, &count);
    }

    // Inserting and purging whenever over the limit never leaves more than
    // `limit` entries, whatever mix of TTLs is used.
    #[test]
    fn prop_size_limit_enforced(
        limit in 1usize..10,
        inserts in prop::collection::vec((0u8..20, 0i64..30, 0u64..3), 1..100)
    ) {
        let mut store = EntryStore::new();
        let mut now = 0u64;

        for (key, ttl_secs, step_secs) in inserts {
            now += step_secs * 1000;
            store.set(format!("h{}", key), json!(key), Ttl::from_secs(ttl_secs), now);
            if store.len() > limit {
                let purged = store.purge(limit, now);
                prop_assert!(!purged.is_empty());
            }
            prop_assert!(store.len() <= limit, "size {} exceeds limit {}", store.len(), limit);
        }
    }

    // With N+1 fresh entries and limit N, one purge removes exactly the entry
    // that expires soonest.
    #[test]
    fn prop_purge_evicts_soonest_expiring(ttls in prop::collection::hash_set(1u64..10_000, 2..20)) {
        let ttls: Vec<u64> = ttls.into_iter().collect();
        let mut store = EntryStore::new();
        for (i, ttl) in ttls.iter().enumerate() {
            store.set(format!("h{}", i), json!(i), Ttl::seconds(*ttl), 0);
        }
        let limit = ttls.len() - 1;
        let (soonest, _) = ttls
            .iter()
            .enumerate()
            .min_by_key(|(_, ttl)| **ttl)
            .unwrap();

        let purged = store.purge(limit, 0);

        prop_assert_eq!(purged.len(), 1);
        prop_assert_eq!(&purged[0].hash, &format!("h{}", soonest));
        prop_assert_eq!(store.len(), limit);
    }

    // Closures contain their root, are closed under neighbours, and list each
    // node once, cycles included.
    #[test]
    fn prop_closure_is_closed_and_unique(
        edges in prop::collection::vec((model_name_strategy(), model_name_strategy()), 0..15),
        root in model_name_strategy()
    ) {
        let mut graph = AssociationGraph::new();
        for (a, b) in &edges {
            graph.add_edge(a.as_str(), b.as_str());
        }

        let reached = graph.closure([root.as_str()]);
        let unique: HashSet<&str> = reached.iter().map(|n| n.as_str()).collect();

        prop_assert_eq!(unique.len(), reached.len());
        prop_assert!(unique.contains(root.as_str()));
        for node in &reached {
            for next in graph.neighbours(node.as_str()) {
                prop_assert!(unique.contains(next.as_str()));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    // Hits, misses and loads through the wrapper match what a fresh-TTL cache
    // should see: one miss and one load per distinct call, hits otherwise.
    #[test]
    fn prop_statistics_accuracy(ids in prop::collection::vec(1i64..=5, 1..40)) {
        let model = Arc::new(MemoryModel::new("User").with_rows(
            (1..=5).map(|id| json!({"id": id})).collect(),
        ));
        let cache = ModelCache::new(
            CacheConfiguration::new().with_model("User", ModelConfig::new()),
            CacheOptions::new().with_clock(Arc::new(ManualClock::new(0))),
        );
        let users = cache.wrap(model.clone());

        let mut distinct: BTreeMap<i64, usize> = BTreeMap::new();
        for id in &ids {
            let row = tokio_test::block_on(users.call("find_by_pk", &[Arg::Int(*id)])).unwrap();
            prop_assert_eq!(&row["id"], &json!(id));
            *distinct.entry(*id).or_default() += 1;
        }

        let stats = cache.stats().stats;
        prop_assert_eq!(stats.misses as usize, distinct.len());
        prop_assert_eq!(stats.loads as usize, distinct.len());
        prop_assert_eq!(stats.hits as usize, ids.len() - distinct.len());
        prop_assert_eq!(model.calls("find_by_pk"), distinct.len());
        prop_assert_eq!(cache.size(["User"]), distinct.len());
    }
}
