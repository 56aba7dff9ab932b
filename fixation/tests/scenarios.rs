use fixation::{EpochClock, FixationError, FixationStore, LogicalIndex, RetentionConfig};

fn setup() -> (FixationStore, EpochClock, LogicalIndex) {
    let store = FixationStore::new(RetentionConfig {
        blocks_per_epoch: 10,
        epochs_to_save: 2,
    })
    .unwrap();
    (store, EpochClock::new(10), LogicalIndex::scoped("pairing", "ServicersToPairCount"))
}

#[test]
fn value_change_inside_window() {
    let (store, mut clock, idx) = setup();
    let count = store.typed::<u64>(idx.clone());

    count.set(0, &5).unwrap();
    clock.advance_to(10, &store).unwrap();
    assert_eq!(store.list_versions(&idx).len(), 1);

    clock.advance_to(15, &store).unwrap();
    count.set(15, &10).unwrap();
    assert_eq!(store.list_versions(&idx).len(), 2);
    assert_eq!(count.at(12).unwrap(), 5);
    assert_eq!(count.at(16).unwrap(), 10);
}

#[test]
fn superseded_version_pruned_after_window() {
    let (store, mut clock, idx) = setup();
    let count = store.typed::<u64>(idx.clone());
    count.set(0, &5).unwrap();
    clock.advance_to(15, &store).unwrap();
    count.set(15, &10).unwrap();

    clock.advance_to(31, &store).unwrap();
    let versions = store.list_versions(&idx);
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].effective_block, 15);
    assert!(matches!(
        count.at(5),
        Err(FixationError::ValueNotRetained { block: 5, .. })
    ));
    assert_eq!(count.at(31).unwrap(), 10);
    assert_eq!(store.earliest_retained_block(), 15);
    assert!(store.get_value_at(&idx, 14).is_err());
}

#[test]
fn backdated_write_fails() {
    let (store, _clock, idx) = setup();
    store.set_value(&idx, 10, vec![1]).unwrap();
    assert_eq!(
        store.set_value(&idx, 5, vec![2]).unwrap_err(),
        FixationError::OutOfOrderWrite {
            index: idx.clone(),
            block: 5,
            last: 10
        }
    );
    assert_eq!(store.list_versions(&idx).len(), 1);
}

#[test]
fn unchanged_value_adds_no_version() {
    let (store, mut clock, idx) = setup();
    store.set_value(&idx, 0, vec![7]).unwrap();
    clock.advance_to(8, &store).unwrap();
    let v = store.set_value(&idx, 8, vec![7]).unwrap();
    assert_eq!(v.effective_block, 0);
    assert_eq!(store.list_versions(&idx).len(), 1);
}

#[test]
fn blocks_older_than_earliest_retained_are_not_answerable() {
    let (store, mut clock, idx) = setup();
    let other = LogicalIndex::scoped("epochstorage", "EpochsToSave");
    store.set_value(&idx, 0, vec![1]).unwrap();
    store.set_value(&other, 0, vec![2]).unwrap();
    clock.advance_to(3, &store).unwrap();
    store.set_value(&idx, 3, vec![3]).unwrap();
    clock.advance_to(44, &store).unwrap();
    store.set_value(&other, 44, vec![4]).unwrap();
    clock.advance_to(60, &store).unwrap();

    let earliest = store.earliest_retained_block();
    assert_eq!(store.watermark(), 50);
    assert_eq!(earliest, 3);
    for index in store.list_indexes() {
        assert!(matches!(
            store.get_value_at(&index, earliest - 1),
            Err(FixationError::ValueNotRetained { .. })
        ));
    }
    assert_eq!(store.get_value_at(&idx, earliest).unwrap(), vec![3]);
    assert_eq!(store.get_value_at(&other, 50).unwrap(), vec![4]);
}

#[test]
fn unknown_index_is_distinct_from_expired_value() {
    let (store, _clock, _idx) = setup();
    let missing = LogicalIndex::new("never/written");
    assert_eq!(
        store.get_value_at(&missing, 0).unwrap_err(),
        FixationError::UnknownIndex(missing.clone())
    );
    assert!(matches!(
        store.get_current_value(&missing),
        Err(FixationError::UnknownIndex(_))
    ));
    assert!(store.list_versions(&missing).is_empty());
}

#[test]
fn zero_epochs_to_save_refuses_to_start() {
    let err = FixationStore::new(RetentionConfig {
        blocks_per_epoch: 10,
        epochs_to_save: 0,
    })
    .err()
    .unwrap();
    assert!(matches!(err, FixationError::InvalidRetentionConfig(_)));
}

#[test]
fn widening_window_never_recovers_pruned_data() {
    let (store, mut clock, idx) = setup();
    store.set_value(&idx, 0, vec![1]).unwrap();
    clock.advance_to(5, &store).unwrap();
    store.set_value(&idx, 5, vec![2]).unwrap();
    clock.advance_to(30, &store).unwrap();
    assert!(store.get_value_at(&idx, 2).is_err());

    store
        .set_retention_config(RetentionConfig {
            blocks_per_epoch: 10,
            epochs_to_save: 6,
        })
        .unwrap();
    clock.advance_to(40, &store).unwrap();
    // boundary history before block 20 was already discarded
    assert_eq!(store.watermark(), 20);
    assert!(store.get_value_at(&idx, 2).is_err());
    assert_eq!(store.get_value_at(&idx, 5).unwrap(), vec![2]);
}
