//! Property-based invariant tests for the timer queue.
//!
//! 1. Entries pop in non-decreasing deadline order
//! 2. Cancelled entries never pop
//! 3. Every live entry pops exactly once

use std::collections::BTreeSet;
use std::time::Duration;

use proptest::prelude::*;
use vitrine_core::clock::TimerQueue;

proptest! {
    #[test]
    fn pops_sorted_and_skips_cancelled(
        deadlines in proptest::collection::vec(0u64..1_000, 1..64),
        cancel_mask in proptest::collection::vec(any::<bool>(), 64),
    ) {
        let mut queue = TimerQueue::new();
        let mut live = BTreeSet::new();
        for (i, &deadline) in deadlines.iter().enumerate() {
            let id = queue.schedule(Duration::from_millis(deadline), i);
            if cancel_mask[i] {
                prop_assert_eq!(queue.cancel(id), Some(i));
                prop_assert!(!queue.is_pending(id));
            } else {
                live.insert(i);
            }
        }
        prop_assert_eq!(queue.len(), live.len());

        let mut last = Duration::ZERO;
        let mut popped = BTreeSet::new();
        while let Some((_, deadline, payload)) = queue.pop_due(Duration::from_secs(5)) {
            prop_assert!(deadline >= last);
            prop_assert!(popped.insert(payload), "payload {} popped twice", payload);
            last = deadline;
        }
        prop_assert_eq!(popped, live);
        prop_assert!(queue.is_empty());
    }
}
