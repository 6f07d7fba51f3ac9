// tests/properties.rs

use std::time::Duration;

use jobrunner::config::parse_duration;
use jobrunner::exec::ChunkQueue;
use proptest::prelude::*;

proptest! {
    #[test]
    fn queue_is_fifo(items in proptest::collection::vec(any::<Vec<u8>>(), 0..64)) {
        let queue = ChunkQueue::new();
        for item in &items {
            queue.push(item.clone());
        }
        prop_assert_eq!(queue.len(), items.len());

        let mut popped = Vec::new();
        while let Some(item) = queue.try_pop() {
            popped.push(item);
        }
        prop_assert_eq!(popped, items);
        prop_assert!(queue.is_empty());
    }

    #[test]
    fn whole_durations_are_exact(n in 0u64..1_000_000) {
        prop_assert_eq!(parse_duration(&format!("{n}ms")), Ok(Duration::from_millis(n)));
        prop_assert_eq!(parse_duration(&format!("{n}s")), Ok(Duration::from_secs(n)));
        prop_assert_eq!(parse_duration(&format!("{n}m")), Ok(Duration::from_secs(n * 60)));
        prop_assert_eq!(parse_duration(&format!("{n}h")), Ok(Duration::from_secs(n * 3600)));
    }

    #[test]
    fn unknown_units_are_rejected(n in 0u64..1000, unit in "[a-z]{1,3}") {
        prop_assume!(!matches!(unit.as_str(), "ms" | "s" | "m" | "h"));
        let input = format!("{n}{unit}");
        prop_assert!(parse_duration(&input).is_err());
    }
}

#[tokio::test]
async fn drained_queue_wakes_waiters() {
    let queue = std::sync::Arc::new(ChunkQueue::new());
    queue.push(1u32);
    queue.push(2u32);

    let waiter = {
        let queue = std::sync::Arc::clone(&queue);
        tokio::spawn(async move { queue.wait_drained().await })
    };

    assert_eq!(queue.pop().await, Some(1));
    assert_eq!(queue.pop().await, Some(2));
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter woke up")
        .expect("waiter task finished");
}
