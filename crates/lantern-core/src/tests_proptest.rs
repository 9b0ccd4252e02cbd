//! Property-based tests over the admission gate and time helpers.

use ndarray::Array1;
use proptest::prelude::*;

use crate::domain::{dt_sec, dt_us, Event, EventValidator, NodeId};

fn event(id: u64, ts_us: i64) -> Event {
    Event::new(id, NodeId(1), NodeId(2), ts_us, Array1::zeros(4))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Saturating delta is never negative and round-trips through seconds.
    #[test]
    fn prop_dt_saturates(
        now in 0i64..4_000_000_000_000_000,
        last in 0i64..4_000_000_000_000_000,
    ) {
        let d = dt_us(now, last);
        if now >= last {
            prop_assert_eq!(d, (now - last) as u64);
        } else {
            prop_assert_eq!(d, 0);
        }
        prop_assert!(dt_sec(now, last) >= 0.0);
    }

    /// The watermark never moves backwards, whatever the gate sees.
    #[test]
    fn prop_watermark_monotone(
        ts in proptest::collection::vec(0i64..1_000_000, 1..50),
        tolerance in 0i64..10_000,
    ) {
        let mut gate = EventValidator::new(4, tolerance);
        let mut high = None;
        for (i, t) in ts.iter().enumerate() {
            let _ = gate.admit(event(i as u64, *t));
            if let Some(w) = gate.watermark_us() {
                if let Some(h) = high {
                    prop_assert!(w >= h);
                }
                high = Some(w);
            }
        }
    }

    /// Admitted events carry strictly increasing sequence numbers.
    #[test]
    fn prop_sequence_strictly_increasing(
        ts in proptest::collection::vec(0i64..1_000_000, 1..50),
    ) {
        let mut gate = EventValidator::new(4, 0);
        let mut last_seq = None;
        for (i, t) in ts.iter().enumerate() {
            if let Ok(admitted) = gate.admit(event(i as u64, *t)) {
                if let Some(prev) = last_seq {
                    prop_assert!(admitted.seq > prev);
                }
                last_seq = Some(admitted.seq);
            }
        }
    }

    /// Every event is either admitted or counted as quarantined.
    #[test]
    fn prop_admission_accounts_for_every_event(
        ts in proptest::collection::vec(0i64..1_000_000, 1..50),
    ) {
        let mut gate = EventValidator::new(4, 0);
        let mut admitted = 0u64;
        for (i, t) in ts.iter().enumerate() {
            if gate.admit(event(i as u64, *t)).is_ok() {
                admitted += 1;
            }
        }
        prop_assert_eq!(admitted + gate.quarantined(), ts.len() as u64);
        prop_assert_eq!(gate.next_seq(), admitted);
    }
}
