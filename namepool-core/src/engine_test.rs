#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use proptest::prelude::*;
    use tempfile::TempDir;

    use crate::clock::{Clock, MockClock};
    use crate::engine::Engine;
    use crate::error::Error;
    use crate::manager::NameManager;
    use crate::store_file::FileStore;
    use crate::store_memory::MemoryStore;
    use crate::types::Name;

    fn memory_engine(clock: &MockClock, auto_release: Option<Duration>) -> Engine<MemoryStore> {
        Engine::new(MemoryStore::new(), Arc::new(clock.clone()), auto_release)
    }

    fn file_engine(
        dir: &TempDir,
        clock: &MockClock,
        auto_release: Option<Duration>,
    ) -> Engine<FileStore> {
        Engine::new(
            FileStore::new(dir.path().join("names.db")),
            Arc::new(clock.clone()),
            auto_release,
        )
    }

    /// Runs a contract check against both storage styles.
    fn for_each_driver(check: fn(&dyn NameManager)) {
        let clock = MockClock::new();
        check(&memory_engine(&clock, None));

        let dir = TempDir::new().expect("temp dir");
        check(&file_engine(&dir, &clock, None));
    }

    fn sorted(mut names: Vec<Name>) -> Vec<Name> {
        names.sort_by(|a, b| (&a.family, &a.name).cmp(&(&b.family, &b.name)));
        names
    }

    #[test]
    fn test_list_after_create() {
        for_each_driver(|manager| {
            assert!(manager.list().unwrap().is_empty());
        });
    }

    #[test]
    fn test_release_after_create() {
        for_each_driver(|manager| {
            manager.release("foo", "bar").unwrap();
        });
    }

    #[test]
    fn test_keep_alive_after_create() {
        for_each_driver(|manager| {
            manager.keep_alive("foo", "bar").unwrap();
        });
    }

    #[test]
    fn test_acquire_twice_for_same_family() {
        for_each_driver(|manager| {
            assert_eq!(manager.acquire("foo").unwrap(), "0");
            assert_eq!(manager.acquire("foo").unwrap(), "1");
        });
    }

    #[test]
    fn test_acquire_for_different_families() {
        for_each_driver(|manager| {
            assert_eq!(manager.acquire("foo").unwrap(), "0");
            assert_eq!(manager.acquire("bar").unwrap(), "0");
        });
    }

    #[test]
    fn test_acquire_release_then_acquire_for_another_family() {
        for_each_driver(|manager| {
            assert_eq!(manager.acquire("foo").unwrap(), "0");
            manager.release("foo", "0").unwrap();
            assert_eq!(manager.acquire("bar").unwrap(), "0");
        });
    }

    #[test]
    fn test_released_names_are_recycled_before_minting() {
        for_each_driver(|manager| {
            assert_eq!(manager.acquire("foo").unwrap(), "0");
            assert_eq!(manager.acquire("foo").unwrap(), "1");
            manager.release("foo", "0").unwrap();
            assert_eq!(manager.acquire("foo").unwrap(), "0");
            assert_eq!(manager.acquire("foo").unwrap(), "2");
        });
    }

    #[test]
    fn test_release_is_idempotent() {
        for_each_driver(|manager| {
            assert_eq!(manager.acquire("foo").unwrap(), "0");
            manager.release("foo", "0").unwrap();
            manager.release("foo", "0").unwrap();
            assert_eq!(manager.acquire("foo").unwrap(), "0");
            assert_eq!(manager.acquire("foo").unwrap(), "1");
        });
    }

    #[test]
    fn test_keep_alive_on_free_name_is_a_noop() {
        for_each_driver(|manager| {
            assert_eq!(manager.acquire("foo").unwrap(), "0");
            manager.release("foo", "0").unwrap();
            manager.keep_alive("foo", "0").unwrap();

            let names = manager.list().unwrap();
            assert_eq!(names.len(), 1);
            assert!(names[0].free, "keep-alive must not revive a free name");
            assert_eq!(manager.acquire("foo").unwrap(), "0");
        });
    }

    #[test]
    fn test_try_acquire_cycle() {
        for_each_driver(|manager| {
            assert_eq!(manager.acquire("foo").unwrap(), "0");
            assert!(manager.try_acquire("foo", "0").is_err());
            manager.release("foo", "0").unwrap();
            manager.try_acquire("foo", "0").unwrap();
            assert!(manager.try_acquire("foo", "0").is_err());
        });
    }

    #[test]
    fn test_try_acquire_error_kinds() {
        for_each_driver(|manager| {
            assert!(matches!(
                manager.try_acquire("foo", "0"),
                Err(Error::NotExist)
            ));
            assert_eq!(manager.acquire("foo").unwrap(), "0");
            assert!(matches!(manager.try_acquire("foo", "0"), Err(Error::InUse)));
        });
    }

    #[test]
    fn test_reset_is_idempotent_and_clears_names() {
        for_each_driver(|manager| {
            manager.reset().unwrap();
            manager.acquire("foo").unwrap();
            manager.reset().unwrap();
            assert!(manager.list().unwrap().is_empty());
            manager.reset().unwrap();
            // A reset backend starts minting from scratch.
            assert_eq!(manager.acquire("foo").unwrap(), "0");
        });
    }

    fn check_list_snapshot(manager: &dyn NameManager, clock: &MockClock) {
        let tick = Duration::from_secs(2 * 60 * 60);
        let start = clock.now();

        manager.acquire("foo").unwrap();
        clock.advance(tick);
        manager.acquire("bar").unwrap();
        clock.advance(tick);
        manager.acquire("foo").unwrap();
        clock.advance(tick);
        manager.release("foo", "1").unwrap();
        manager.release("bar", "0").unwrap();
        manager.acquire("bar").unwrap();

        let names = sorted(manager.list().unwrap());
        let expected = vec![
            Name {
                name: "0".to_string(),
                family: "bar".to_string(),
                created_at: start + chrono::Duration::hours(2),
                updated_at: start + chrono::Duration::hours(6),
                free: false,
            },
            Name {
                name: "0".to_string(),
                family: "foo".to_string(),
                created_at: start,
                updated_at: start,
                free: false,
            },
            Name {
                name: "1".to_string(),
                family: "foo".to_string(),
                created_at: start + chrono::Duration::hours(4),
                updated_at: DateTime::<Utc>::UNIX_EPOCH,
                free: true,
            },
        ];
        assert_eq!(names, expected);
    }

    #[test]
    fn test_memory_list_snapshot_with_mock_clock() {
        let clock = MockClock::new();
        check_list_snapshot(&memory_engine(&clock, None), &clock);
    }

    #[test]
    fn test_file_list_snapshot_with_mock_clock() {
        let clock = MockClock::new();
        let dir = TempDir::new().unwrap();
        check_list_snapshot(&file_engine(&dir, &clock, None), &clock);
    }

    fn check_auto_release(manager: &dyn NameManager, clock: &MockClock) {
        assert_eq!(manager.acquire("foo").unwrap(), "0");
        clock.advance(Duration::from_secs(5));

        // Inside the auto-release window, a fresh name is minted.
        assert_eq!(manager.acquire("foo").unwrap(), "1");
        clock.advance(Duration::from_secs(12));

        // "0" has not heartbeated for 17s and is reaped; "1" is only 12s
        // old and survives.
        assert_eq!(manager.acquire("foo").unwrap(), "0");
    }

    #[test]
    fn test_memory_zombies_are_auto_released() {
        let clock = MockClock::new();
        let manager = memory_engine(&clock, Some(Duration::from_secs(15)));
        check_auto_release(&manager, &clock);
    }

    #[test]
    fn test_file_zombies_are_auto_released() {
        let clock = MockClock::new();
        let dir = TempDir::new().unwrap();
        let manager = file_engine(&dir, &clock, Some(Duration::from_secs(15)));
        check_auto_release(&manager, &clock);
    }

    #[test]
    fn test_keep_alive_defers_auto_release() {
        let clock = MockClock::new();
        let manager = memory_engine(&clock, Some(Duration::from_secs(15)));

        assert_eq!(manager.acquire("foo").unwrap(), "0");
        clock.advance(Duration::from_secs(10));
        manager.keep_alive("foo", "0").unwrap();
        clock.advance(Duration::from_secs(10));

        // The heartbeat at t=10s keeps "0" within the window at t=20s.
        assert_eq!(manager.acquire("foo").unwrap(), "1");
    }

    #[test]
    fn test_file_store_persists_across_engines() {
        let clock = MockClock::new();
        let dir = TempDir::new().unwrap();

        let first = file_engine(&dir, &clock, None);
        assert_eq!(first.acquire("foo").unwrap(), "0");
        drop(first);

        let second = file_engine(&dir, &clock, None);
        assert_eq!(second.acquire("foo").unwrap(), "1");
        let names = second.list().unwrap();
        assert_eq!(names.len(), 2);
    }

    fn hammer(manager: Arc<dyn NameManager>, workers: usize, rounds: usize) {
        let held: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));
        let mut handles = Vec::new();
        for _ in 0..workers {
            let manager = Arc::clone(&manager);
            let held = Arc::clone(&held);
            handles.push(thread::spawn(move || {
                for _ in 0..rounds {
                    let name = manager.acquire("foo").unwrap();
                    {
                        let mut held = held.lock().unwrap();
                        assert!(held.insert(name.clone()), "{name} acquired twice");
                    }
                    thread::yield_now();
                    {
                        let mut held = held.lock().unwrap();
                        held.remove(&name);
                    }
                    manager.release("foo", &name).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let names = manager.list().unwrap();
        assert!(names.iter().all(|n| n.free));
        assert!(names.len() <= workers, "minted more names than workers");
    }

    #[test]
    fn test_memory_concurrent_mutual_exclusion() {
        let clock = MockClock::new();
        hammer(Arc::new(memory_engine(&clock, None)), 8, 50);
    }

    #[test]
    fn test_file_concurrent_mutual_exclusion() {
        let clock = MockClock::new();
        let dir = TempDir::new().unwrap();
        hammer(Arc::new(file_engine(&dir, &clock, None)), 4, 10);
    }

    // Model-based check of the allocation rules: free names are reused in
    // key order, minted names follow the monotone counter, release and
    // keep-alive are no-ops on free names.
    #[derive(Debug, Clone)]
    enum Op {
        Acquire,
        Release(u64),
        KeepAlive(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Acquire),
            2 => (0u64..8).prop_map(Op::Release),
            1 => (0u64..8).prop_map(Op::KeepAlive),
        ]
    }

    proptest! {
        #[test]
        fn prop_engine_matches_allocation_model(
            ops in proptest::collection::vec(op_strategy(), 1..40)
        ) {
            let clock = MockClock::new();
            let engine = memory_engine(&clock, None);

            let mut minted = 0u64;
            let mut held: std::collections::BTreeSet<String> = Default::default();
            let mut free: std::collections::BTreeSet<String> = Default::default();

            for op in ops {
                match op {
                    Op::Acquire => {
                        let name = engine.acquire("foo").unwrap();
                        if let Some(first_free) = free.iter().next().cloned() {
                            prop_assert_eq!(&name, &first_free);
                            free.remove(&name);
                        } else {
                            prop_assert_eq!(name.clone(), minted.to_string());
                            minted += 1;
                        }
                        prop_assert!(held.insert(name));
                    }
                    Op::Release(n) => {
                        let name = n.to_string();
                        engine.release("foo", &name).unwrap();
                        if held.remove(&name) {
                            free.insert(name);
                        }
                    }
                    Op::KeepAlive(n) => {
                        engine.keep_alive("foo", &n.to_string()).unwrap();
                    }
                }
            }

            let names = engine.list().unwrap();
            prop_assert_eq!(names.len() as u64, minted);
            for name in names {
                prop_assert_eq!(name.free, free.contains(&name.name));
            }
        }
    }
}
