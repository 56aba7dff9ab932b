use fixation::{
    EpochClock, FixationBackend, FixationConfig, FixationError, FixationStore, LogicalIndex,
    RetentionConfig, SledBackend,
};
use tempfile::tempdir;

fn config() -> RetentionConfig {
    RetentionConfig {
        blocks_per_epoch: 10,
        epochs_to_save: 2,
    }
}

#[test]
fn reopened_store_answers_like_before() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fixation.db");
    let idx = LogicalIndex::scoped("pairing", "ServicersToPairCount");
    let other = LogicalIndex::scoped("epochstorage", "EpochBlocks");

    {
        let store = FixationStore::open(&path, config()).unwrap();
        let mut clock = EpochClock::new(10);
        store.set_value(&idx, 0, vec![5]).unwrap();
        store.set_value(&other, 0, vec![20]).unwrap();
        clock.advance_to(15, &store).unwrap();
        store.set_value(&idx, 15, vec![10]).unwrap();
        clock.advance_to(22, &store).unwrap();
        store.set_value(&idx, 22, vec![11]).unwrap();
        let _pin = store.pin(&idx, 16).unwrap();
        clock.advance_to(41, &store).unwrap();
        store.flush().unwrap();
    }

    let reopened = FixationStore::open(&path, config()).unwrap();
    assert_eq!(reopened.list_indexes(), vec![other.clone(), idx.clone()]);
    let blocks: Vec<u64> = reopened
        .list_versions(&idx)
        .iter()
        .map(|v| v.effective_block)
        .collect();
    assert_eq!(blocks, vec![15, 22]);
    assert_eq!(reopened.version_at(&idx, 16).unwrap().ref_count, 1);
    assert_eq!(reopened.get_value_at(&idx, 16).unwrap(), vec![10]);
    assert_eq!(reopened.get_current_value(&idx).unwrap(), vec![11]);
    assert_eq!(reopened.get_current_value(&other).unwrap(), vec![20]);
    assert!(matches!(
        reopened.get_value_at(&idx, 3),
        Err(FixationError::ValueNotRetained { .. })
    ));
    // the last write was at block 22
    assert!(reopened.set_value(&other, 21, vec![1]).is_err());
    assert_eq!(reopened.outstanding_pins(), 1);
}

#[test]
fn evictions_reach_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fixation.db");
    let idx = LogicalIndex::new("pairing/ServicersToPairCount");
    {
        let store = FixationStore::open(&path, config()).unwrap();
        let mut clock = EpochClock::new(10);
        store.set_value(&idx, 0, vec![1]).unwrap();
        clock.advance_to(5, &store).unwrap();
        store.set_value(&idx, 5, vec![2]).unwrap();
        clock.advance_to(30, &store).unwrap();
        store.flush().unwrap();
    }
    let backend = SledBackend::open(&path).unwrap();
    assert!(backend.version_at(&idx, 4).unwrap().is_none());
    let at_30 = backend.version_at(&idx, 30).unwrap().unwrap();
    assert_eq!(at_30.effective_block, 5);
    assert_eq!(at_30.value, vec![2]);
    assert_eq!(backend.load().unwrap()[&idx].len(), 1);
}

#[test]
fn config_file_selects_on_disk_store() {
    let dir = tempdir().unwrap();
    let cfg = FixationConfig {
        db_path: Some(dir.path().join("ledger")),
        retention: config(),
    };
    cfg.save(dir.path()).unwrap();

    let loaded = FixationConfig::load(dir.path()).unwrap();
    let idx = LogicalIndex::new("a");
    {
        let store = FixationStore::from_config(&loaded).unwrap();
        store.set_value(&idx, 3, vec![9]).unwrap();
        store.flush().unwrap();
    }
    let store = FixationStore::from_config(&loaded).unwrap();
    assert_eq!(store.get_value_at(&idx, 4).unwrap(), vec![9]);
    assert_eq!(store.retention_config(), config());
}

#[test]
fn watermark_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fixation.db");
    let idx = LogicalIndex::new("pairing/ServicersToPairCount");
    {
        let store = FixationStore::open(&path, config()).unwrap();
        let mut clock = EpochClock::new(10);
        store.set_value(&idx, 0, vec![1]).unwrap();
        clock.advance_to(15, &store).unwrap();
        store.set_value(&idx, 15, vec![2]).unwrap();
        clock.advance_to(41, &store).unwrap();
        assert_eq!(store.watermark(), 30);
        assert_eq!(store.earliest_retained_block(), 15);
        store.flush().unwrap();
    }

    let reopened = FixationStore::open(&path, config()).unwrap();
    assert_eq!(reopened.watermark(), 30);
    assert_eq!(reopened.earliest_retained_block(), 15);
    assert_eq!(reopened.list_indexes(), vec![idx]);
}
