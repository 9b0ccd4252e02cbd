//! Property-based tests over the encoder state containers.

use ndarray::{arr1, Array1};
use proptest::prelude::*;

use lantern_core::{NodeId, SamplingKind};

use crate::memory::{GruUpdater, MemoryStore, MemoryUpdater};
use crate::neighbor_index::NeighborIndex;
use crate::time_encoding::{TimeEncoder, TimeShiftStats};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The linear lead component keeps elapsed time ordered.
    #[test]
    fn prop_time_encoding_preserves_order(
        a in 0.0f32..1.0e6,
        gap in 0.001f32..1.0e5,
    ) {
        let enc = TimeEncoder::with_dim(8);
        let stats = TimeShiftStats::new();
        let ea = enc.encode(a, &stats);
        let eb = enc.encode(a + gap, &stats);
        prop_assert!(ea[0] < eb[0]);
        prop_assert!(ea.iter().all(|v| v.is_finite()));
        prop_assert!(eb.iter().all(|v| v.is_finite()));
    }

    /// A stale write is always rejected and leaves state untouched.
    #[test]
    fn prop_stale_update_rejected(
        t1 in 1_000i64..1_000_000_000,
        delta in 1i64..999,
    ) {
        let mut store = MemoryStore::new(4);
        store.update(NodeId(1), arr1(&[0.1, 0.2, 0.3, 0.4]), t1).unwrap();
        let digest = store.state_digest();
        let res = store.update(NodeId(1), Array1::ones(4), t1 - delta);
        prop_assert!(res.is_err());
        prop_assert_eq!(store.state_digest(), digest);
    }

    /// In-order writes always succeed and the recorded timestamp is
    /// non-decreasing.
    #[test]
    fn prop_memory_timestamps_monotone(
        steps in proptest::collection::vec(0i64..10_000, 1..40),
    ) {
        let mut store = MemoryStore::new(2);
        let mut t = 0i64;
        let mut last_seen = None;
        for step in steps {
            t += step;
            store.update(NodeId(7), arr1(&[0.0, 0.0]), t).unwrap();
            let last = store.last_update(NodeId(7));
            if let (Some(prev), Some(now)) = (last_seen, last) {
                prop_assert!(now >= prev);
            }
            last_seen = last;
        }
    }

    /// Neighbor queries never return records at or past the query time and
    /// never exceed k.
    #[test]
    fn prop_neighbors_strictly_before(
        ts in proptest::collection::vec(0i64..100_000, 1..50),
        query in 0i64..100_000,
        k in 1usize..10,
    ) {
        let mut idx = NeighborIndex::new(64, SamplingKind::Recency, 0);
        let mut sorted = ts.clone();
        sorted.sort_unstable();
        for (i, t) in sorted.iter().enumerate() {
            idx.record(
                NodeId(1),
                NodeId(100 + i as u64),
                *t,
                arr1(&[0.0; 4]),
                i as u64,
                i as u64,
            );
        }
        let hits = idx.neighbors_before(NodeId(1), query, k);
        prop_assert!(hits.len() <= k);
        for r in hits {
            prop_assert!(r.ts_us < query);
        }
    }

    /// The gated updater keeps memory bounded for arbitrary messages.
    #[test]
    fn prop_gru_state_bounded(
        msg in proptest::collection::vec(-10.0f32..10.0, 8),
    ) {
        let updater = GruUpdater::seeded(4, 8, 42);
        let mut mem = Array1::zeros(4);
        let message = Array1::from_vec(msg);
        for _ in 0..20 {
            mem = updater.apply(mem.view(), message.view());
        }
        for &v in mem.iter() {
            prop_assert!(v.is_finite());
            prop_assert!((-1.0..=1.0).contains(&v));
        }
    }
}
