use proptest::prelude::*;
use record_batcher::{
    BatchEvent, BatchLimits,
    batch::Batcher,
    observer::EventRecorder,
};
use std::sync::Arc;

/// Limits with `max_record_size <= max_batch_size`, all positive
fn limits_strategy() -> impl Strategy<Value = BatchLimits> {
    (1u64..=64, 1usize..=16).prop_flat_map(|(max_batch_size, max_batch_count)| {
        (1u64..=max_batch_size).prop_map(move |max_record_size| {
            BatchLimits::new(max_record_size, max_batch_size, max_batch_count)
        })
    })
}

/// Records are `(id, size)` pairs so ordering can be checked by id
fn records_strategy() -> impl Strategy<Value = Vec<(usize, u64)>> {
    prop::collection::vec(0u64..=80, 0..200).prop_map(|sizes| sizes.into_iter().enumerate().collect())
}

fn size_of(record: &(usize, u64)) -> u64 {
    record.1
}

proptest! {
    /// Property: Every batch respects the count, size and per-record ceilings
    #[test]
    fn batches_respect_all_limits(limits in limits_strategy(), records in records_strategy()) {
        let batches = Batcher::new(limits).unwrap().split(records, size_of).unwrap();

        for batch in &batches {
            prop_assert!(!batch.is_empty(), "empty batch emitted");
            prop_assert!(batch.len() <= limits.max_batch_count);
            let total: u64 = batch.iter().map(size_of).sum();
            prop_assert!(total <= limits.max_batch_size);
            for record in batch {
                prop_assert!(record.1 <= limits.max_record_size);
            }
        }
    }

    /// Property: Concatenated batches are exactly the eligible records, in order
    #[test]
    fn batches_preserve_eligible_records_in_order(limits in limits_strategy(), records in records_strategy()) {
        let expected: Vec<(usize, u64)> = records
            .iter()
            .copied()
            .filter(|record| record.1 <= limits.max_record_size)
            .collect();

        let batches = Batcher::new(limits).unwrap().split(records, size_of).unwrap();
        let flattened: Vec<(usize, u64)> = batches.into_iter().flatten().collect();

        prop_assert_eq!(flattened, expected);
    }

    /// Property: A batch is only closed when the next record would not fit
    #[test]
    fn batches_are_closed_greedily(limits in limits_strategy(), records in records_strategy()) {
        let batches = Batcher::new(limits).unwrap().split(records, size_of).unwrap();

        for pair in batches.windows(2) {
            let total: u64 = pair[0].iter().map(size_of).sum();
            let next = pair[1][0].1;
            prop_assert!(
                total + next > limits.max_batch_size || pair[0].len() == limits.max_batch_count,
                "batch closed early: {:?} then {:?}", pair[0], pair[1][0]
            );
        }
    }

    /// Property: Discard events name exactly the oversized records
    #[test]
    fn discard_events_match_oversized_records(limits in limits_strategy(), records in records_strategy()) {
        let oversized: Vec<(usize, u64)> = records
            .iter()
            .copied()
            .filter(|record| record.1 > limits.max_record_size)
            .collect();

        let recorder = EventRecorder::new();
        let batches = Batcher::new(limits)
            .unwrap()
            .with_observer(Arc::new(recorder.clone()))
            .split(records, size_of)
            .unwrap();

        prop_assert_eq!(recorder.discarded(), oversized);

        let closed = recorder
            .events()
            .iter()
            .filter(|event| !matches!(event, BatchEvent::Discarded { .. }))
            .count();
        prop_assert_eq!(closed, batches.len());
    }

    /// Property: The lazy iterator yields the same batches as the eager split
    #[test]
    fn lazy_and_eager_batching_agree(limits in limits_strategy(), records in records_strategy()) {
        let batcher = Batcher::new(limits).unwrap();

        let eager = batcher.split(records.clone(), size_of).unwrap();
        let lazy: Vec<Vec<(usize, u64)>> = batcher
            .batches(records, size_of)
            .collect::<Result<_, _>>()
            .unwrap();

        prop_assert_eq!(eager, lazy);
    }
}

#[test]
fn empty_input_yields_empty_output() {
    let batches = Batcher::new(BatchLimits::default())
        .unwrap()
        .split(Vec::<(usize, u64)>::new(), size_of)
        .unwrap();

    assert!(batches.is_empty());
}
