//! Межпроцессный протокол блокировки: ожидание, брошенные блокировки и
//! конкурентные писатели.

use std::{
    fs,
    sync::{mpsc, Arc, Barrier},
    thread,
    time::Duration,
};

use aclstore::{
    engine::{lock_path, LockManager, ManualClock, WAIT_TIME},
    AclStore, AclStoreError, SharedAclStore, StoreConfig,
};
use tempfile::tempdir;

fn fast_config() -> StoreConfig {
    StoreConfig::builder()
        .local_realm("EXAMPLE.ORG")
        .poll_interval(Duration::from_millis(10))
        .build()
}

#[test]
fn test_second_lock_blocks_until_abort() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("blk.acl");
    fs::write(&acl, "").unwrap();

    let manager = LockManager::default().with_poll_interval(Duration::from_millis(10));
    let first = manager.lock(&acl).unwrap();

    let (tx, rx) = mpsc::channel();
    let waiter = {
        let manager = manager.clone();
        let acl = acl.clone();
        thread::spawn(move || {
            let handle = manager.lock(&acl).unwrap();
            tx.send(()).unwrap();
            handle.commit().unwrap();
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
    first.abort().unwrap();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    waiter.join().unwrap();
}

#[test]
fn test_add_waits_for_foreign_writer() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("wait.acl");
    fs::write(&acl, "alice.@EXAMPLE.ORG\n").unwrap();

    // Чужой процесс держит блокировку.
    let foreign = LockManager::default().lock(&acl).unwrap();

    let worker = {
        let acl = acl.clone();
        thread::spawn(move || {
            let mut s = AclStore::new(&fast_config());
            s.add(&acl, "bob").unwrap();
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!worker.is_finished());
    foreign.abort().unwrap();
    worker.join().unwrap();

    let mut s = AclStore::new(&fast_config());
    assert_eq!(
        s.entries(&acl).unwrap(),
        vec!["alice.@EXAMPLE.ORG", "bob.@EXAMPLE.ORG"]
    );
}

#[test]
fn test_stale_lock_from_crashed_writer_is_reclaimed() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("stale.acl");
    fs::write(&acl, "alice.@EXAMPLE.ORG\n").unwrap();
    fs::write(lock_path(&acl), "half-written garbage").unwrap();

    let clock = Arc::new(ManualClock::starting_now());
    clock.advance(WAIT_TIME + Duration::from_secs(5));

    let mut s = AclStore::with_clock(&fast_config(), clock.clone());
    s.add(&acl, "bob").unwrap();

    assert_eq!(clock.sleep_count(), 0);
    assert!(!lock_path(&acl).exists());
    assert!(s.check(&acl, "alice"));
    assert!(s.check(&acl, "bob"));
}

#[test]
fn test_fresh_foreign_lock_times_out() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("busy.acl");
    fs::write(&acl, "").unwrap();
    fs::write(lock_path(&acl), "").unwrap();

    let cfg = StoreConfig::builder()
        .local_realm("EXAMPLE.ORG")
        .lock_timeout(Duration::from_secs(10))
        .build();
    let clock = Arc::new(ManualClock::starting_now());
    let mut s = AclStore::with_clock(&cfg, clock.clone());

    let err = s.add(&acl, "bob").unwrap_err();
    assert!(matches!(err, AclStoreError::LockTimeout { .. }));
    assert_eq!(clock.sleep_count(), 10);
    assert_eq!(fs::read_to_string(&acl).unwrap(), "");
    assert!(lock_path(&acl).exists());
}

/// Независимые хранилища (как отдельные процессы) не теряют записи.
#[test]
fn test_independent_writers_do_not_lose_updates() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("race.acl");
    AclStore::new(&fast_config()).initialize(&acl, 0o600).unwrap();

    let writers = 6;
    let barrier = Arc::new(Barrier::new(writers));
    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let acl = acl.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut s = AclStore::new(&fast_config());
                barrier.wait();
                s.add(&acl, &format!("writer{i}")).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut s = AclStore::new(&fast_config());
    let entries = s.entries(&acl).unwrap();
    assert_eq!(entries.len(), writers);
    for i in 0..writers {
        assert!(s.check(&acl, &format!("writer{i}")));
    }
    assert!(!lock_path(&acl).exists());
}

#[test]
fn test_shared_store_serialises_threads() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("shared.acl");
    let store = SharedAclStore::new(&fast_config());
    store.initialize(&acl, 0o600).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            let acl = acl.clone();
            thread::spawn(move || {
                for j in 0..5 {
                    store.add(&acl, &format!("t{t}.n{j}")).unwrap();
                    assert!(store.check(&acl, &format!("t{t}.n{j}")));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.entries(&acl).unwrap().len(), 20);
}
