//! Property-based tests over batching, loss, and negative sampling.

use ndarray::Array1;
use proptest::prelude::*;

use lantern_core::{AdmittedEvent, Event, NodeId};

use crate::batch::{check_chronological, chunk_stream};
use crate::loss::{bce, bce_dlogit};
use crate::sampler::NegativeEdgeSampler;

fn admitted(ts_us: i64, seq: u64) -> AdmittedEvent {
    AdmittedEvent {
        event: Event::new(seq, NodeId(1), NodeId(2), ts_us, Array1::zeros(4)),
        seq,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Chunking partitions the stream: every event lands in exactly one
    /// batch and order is preserved.
    #[test]
    fn prop_chunking_partitions_the_stream(
        len in 0usize..50,
        batch_size in 1usize..12,
    ) {
        let events: Vec<AdmittedEvent> =
            (0..len).map(|i| admitted(i as i64, i as u64)).collect();
        let chunks = chunk_stream(&events, batch_size);
        let flattened: Vec<u64> = chunks
            .iter()
            .flat_map(|c| c.iter().map(|a| a.seq))
            .collect();
        let expected: Vec<u64> = (0..len as u64).collect();
        prop_assert_eq!(flattened, expected);
        for chunk in &chunks[..chunks.len().saturating_sub(1)] {
            prop_assert_eq!(chunk.len(), batch_size);
        }
    }

    /// Any sorted timestamp vector passes the chronology check.
    #[test]
    fn prop_sorted_batches_are_chronological(
        mut ts in proptest::collection::vec(0i64..1_000_000, 0..30),
    ) {
        ts.sort_unstable();
        let batch: Vec<AdmittedEvent> = ts
            .iter()
            .enumerate()
            .map(|(i, t)| admitted(*t, i as u64))
            .collect();
        prop_assert!(check_chronological(&batch).is_ok());
    }

    /// Loss and its gradient stay finite across the whole probability range,
    /// including the saturated ends.
    #[test]
    fn prop_bce_finite(p in 0.0f32..=1.0, label in prop_oneof![Just(0.0f32), Just(1.0f32)]) {
        let loss = bce(p, label);
        prop_assert!(loss.is_finite());
        prop_assert!(loss >= 0.0);
        prop_assert!(bce_dlogit(p, label).is_finite());
    }

    /// The sampler never hands back the excluded destination.
    #[test]
    fn prop_sampler_respects_exclusion(
        universe in proptest::collection::hash_set(0u64..200, 2..40),
        exclude in 0u64..200,
        seed in 0u64..1000,
    ) {
        let mut sampler = NegativeEdgeSampler::new(seed);
        for id in &universe {
            sampler.observe(NodeId(*id));
        }
        for _ in 0..50 {
            if let Some(pick) = sampler.sample_destination(NodeId(exclude)) {
                prop_assert_ne!(pick, NodeId(exclude));
                prop_assert!(universe.contains(&pick.0));
            }
        }
    }

    /// With at least one alternative available, a draw always succeeds.
    #[test]
    fn prop_sampler_total_when_alternative_exists(
        ids in proptest::collection::hash_set(0u64..100, 2..20),
    ) {
        let mut sampler = NegativeEdgeSampler::new(1);
        for id in &ids {
            sampler.observe(NodeId(*id));
        }
        let exclude = *ids.iter().next().unwrap();
        prop_assert!(sampler.sample_destination(NodeId(exclude)).is_some());
    }
}
