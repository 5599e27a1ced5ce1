pub mod cache;
pub mod classloader;
pub mod config;
pub mod definition;
pub mod error;
pub mod hierarchy;
pub mod inspector;
pub mod source;

pub use config::HierarchyConfig;
pub use definition::{Definition, LoaderId};
pub use error::{HierarchyError, LoadError};
pub use hierarchy::{HierarchyBuilder, LoaderHierarchy};
pub use inspector::{Inspector, LoaderDescriptor};

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc, Barrier,
        },
        thread,
        time::{Duration, Instant},
    };

    use anyhow::anyhow;
    use bytes::Bytes;
    use parking_lot::RwLock;
    use parse::builder::ClassFileBuilder;
    use support::names::ClassName;

    use crate::{
        cache::DefinitionCache,
        hierarchy::{APPLICATION, BOOTSTRAP, PLATFORM},
        source::{BuiltinSource, DefinitionSource, SourceDescriptor, TimeoutSource},
        Definition, HierarchyConfig, HierarchyError, Inspector, LoadError, LoaderHierarchy,
        LoaderId,
    };

    fn class(name: &str, marker: &str) -> Bytes {
        ClassFileBuilder::new(name)
            .super_class("java/lang/Object")
            .source_file(marker)
            .build()
            .expect("class to be written")
    }

    fn builtin(id: &str, entries: &[(&str, Bytes)]) -> BuiltinSource {
        BuiltinSource::new(
            id,
            entries
                .iter()
                .map(|(name, bytes)| (ClassName::parse(name).unwrap(), bytes.clone())),
        )
    }

    /// Serves a fixed table, counting lookups and optionally stalling on each one.
    struct CountingSource {
        inner: BuiltinSource,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl DefinitionSource for CountingSource {
        fn id(&self) -> &str {
            "counting"
        }

        fn locate(&self, name: &ClassName) -> Result<Option<Bytes>, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.inner.locate(name)
        }

        fn describe(&self) -> SourceDescriptor {
            self.inner.describe()
        }
    }

    /// A source whose single entry can be swapped out by the test.
    struct MutableSource {
        name: ClassName,
        bytes: Arc<RwLock<Bytes>>,
    }

    impl DefinitionSource for MutableSource {
        fn id(&self) -> &str {
            "mutable"
        }

        fn locate(&self, name: &ClassName) -> Result<Option<Bytes>, LoadError> {
            Ok((name == &self.name).then(|| self.bytes.read().clone()))
        }

        fn describe(&self) -> SourceDescriptor {
            SourceDescriptor::Custom("mutable".to_string())
        }
    }

    /// Blocks every lookup until released.
    struct HangingSource {
        released: Arc<AtomicBool>,
        calls: Arc<AtomicUsize>,
    }

    impl DefinitionSource for HangingSource {
        fn id(&self) -> &str {
            "hanging"
        }

        fn locate(&self, name: &ClassName) -> Result<Option<Bytes>, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            while !self.released.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }

            Ok(Some(class(name.internal(), "late")))
        }

        fn describe(&self) -> SourceDescriptor {
            SourceDescriptor::Custom("hanging".to_string())
        }
    }

    struct UnavailableSource;

    impl DefinitionSource for UnavailableSource {
        fn id(&self) -> &str {
            "unavailable"
        }

        fn locate(&self, _: &ClassName) -> Result<Option<Bytes>, LoadError> {
            Err(LoadError::SourceUnavailable {
                source_id: self.id().to_string(),
                cause: anyhow!("disk on fire"),
            })
        }

        fn describe(&self) -> SourceDescriptor {
            SourceDescriptor::Custom("unavailable".to_string())
        }
    }

    fn standard() -> LoaderHierarchy {
        LoaderHierarchy::builder()
            .root(BOOTSTRAP, builtin("boot", &[("core/Base", class("core/Base", "B"))]))
            .child(PLATFORM, BOOTSTRAP, builtin("platform", &[]))
            .child(
                APPLICATION,
                PLATFORM,
                builtin(
                    "app",
                    &[
                        ("app/Main", class("app/Main", "M")),
                        ("core/Base", class("core/Base", "B2")),
                    ],
                ),
            )
            .build()
            .expect("hierarchy to build")
    }

    #[test]
    fn parent_definitions_win() {
        let hierarchy = standard();

        let base = hierarchy.resolve_from_application("core.Base").unwrap();
        assert_eq!(base.source_file(), Some("B"));
        assert_eq!(base.origin(), hierarchy.bootstrap());
    }

    #[test]
    fn local_definitions_are_stamped() {
        let hierarchy = standard();

        let main = hierarchy.resolve_from_application("app.Main").unwrap();
        assert_eq!(main.source_file(), Some("M"));
        assert_eq!(main.origin(), hierarchy.application());
        assert_eq!(main.name().internal(), "app/Main");
        assert_eq!(main.super_class().map(|s| s.internal()), Some("java/lang/Object"));
    }

    #[test]
    fn missing_names_are_not_found() {
        let hierarchy = standard();

        let err = hierarchy.resolve_from_application("missing.X").unwrap_err();
        assert!(
            matches!(&err, LoadError::ClassNotFound { name } if name == "missing.X"),
            "{:?}",
            err
        );

        for loader in hierarchy.loaders() {
            assert!(loader.cache().is_empty(), "{} gained an entry", loader.name());
        }
    }

    #[test]
    fn invalid_names_are_not_found() {
        let hierarchy = standard();

        let err = hierarchy.resolve_from_application("[Lcore/Base;").unwrap_err();
        assert!(err.is_not_found(), "{:?}", err);
    }

    #[test]
    fn repeated_resolution_is_cached() {
        let hierarchy = standard();

        let first = hierarchy.resolve_from_application("app.Main").unwrap();
        let second = hierarchy.resolve_from_application("app/Main").unwrap();
        assert!(Definition::same(&first, &second));

        let via_boot = hierarchy.resolve_from(hierarchy.bootstrap(), "core.Base").unwrap();
        let via_app = hierarchy.resolve_from_application("core.Base").unwrap();
        assert!(Definition::same(&via_boot, &via_app));
    }

    #[test]
    fn definitions_live_at_their_defining_loader() {
        let hierarchy = standard();
        hierarchy.resolve_from_application("core.Base").unwrap();

        let name = ClassName::parse("core/Base").unwrap();
        let boot = hierarchy.loader(hierarchy.bootstrap()).unwrap();
        let app = hierarchy.loader(hierarchy.application()).unwrap();

        assert!(boot.cache().contains(&name));
        assert!(!app.cache().contains(&name));
    }

    #[test]
    fn concurrent_resolution_defines_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            inner: builtin("app", &[("app/Main", class("app/Main", "M"))]),
            calls: Arc::clone(&calls),
            delay: Duration::from_millis(20),
        };

        let hierarchy = Arc::new(
            LoaderHierarchy::builder()
                .root(BOOTSTRAP, builtin("boot", &[]))
                .child(APPLICATION, BOOTSTRAP, source)
                .build()
                .unwrap(),
        );

        let threads = 16;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let hierarchy = Arc::clone(&hierarchy);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    hierarchy.resolve_from_application("app.Main").unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for result in results.iter() {
            assert!(Definition::same(&results[0], result));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let app = hierarchy.loader(hierarchy.application()).unwrap();
        assert_eq!(app.cache().in_flight(), 0);
    }

    #[test]
    fn unrelated_names_do_not_share_a_lock() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            inner: builtin(
                "app",
                &[("a/One", class("a/One", "1")), ("a/Two", class("a/Two", "2"))],
            ),
            calls: Arc::clone(&calls),
            delay: Duration::from_millis(10),
        };

        let hierarchy = Arc::new(
            LoaderHierarchy::builder()
                .root(BOOTSTRAP, builtin("boot", &[]))
                .child(APPLICATION, BOOTSTRAP, source)
                .build()
                .unwrap(),
        );

        let handles: Vec<_> = ["a.One", "a.Two"]
            .into_iter()
            .map(|name| {
                let hierarchy = Arc::clone(&hierarchy);
                thread::spawn(move || hierarchy.resolve_from_application(name).unwrap())
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(!Definition::same(&results[0], &results[1]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn malformed_definitions_do_not_poison_the_cache() {
        let name = ClassName::parse("app/Main").unwrap();
        let bytes = Arc::new(RwLock::new(Bytes::from_static(b"garbage")));

        let hierarchy = LoaderHierarchy::builder()
            .root(BOOTSTRAP, builtin("boot", &[]))
            .child(
                APPLICATION,
                BOOTSTRAP,
                MutableSource {
                    name: name.clone(),
                    bytes: Arc::clone(&bytes),
                },
            )
            .build()
            .unwrap();

        let err = hierarchy.resolve_from_application("app.Main").unwrap_err();
        assert!(matches!(err, LoadError::MalformedDefinition { .. }), "{:?}", err);

        let app = hierarchy.loader(hierarchy.application()).unwrap();
        assert!(!app.cache().contains(&name));

        *bytes.write() = class("app/Main", "fixed");

        let main = hierarchy.resolve_from_application("app.Main").unwrap();
        assert_eq!(main.source_file(), Some("fixed"));
    }

    #[test]
    fn mismatched_names_are_malformed() {
        let hierarchy = LoaderHierarchy::builder()
            .root(BOOTSTRAP, builtin("boot", &[("app/Main", class("app/Other", "x"))]))
            .build()
            .unwrap();

        let err = hierarchy.resolve_from_application("app.Main").unwrap_err();
        match err {
            LoadError::MalformedDefinition { name, reason } => {
                assert_eq!(name, "app/Main");
                assert!(reason.contains("app/Other"), "{}", reason);
            }
            other => panic!("expected malformed definition, got {:?}", other),
        }
    }

    #[test]
    fn parent_failures_are_not_masked() {
        let hierarchy = LoaderHierarchy::builder()
            .root(BOOTSTRAP, UnavailableSource)
            .child(APPLICATION, BOOTSTRAP, builtin("app", &[("app/Main", class("app/Main", "M"))]))
            .build()
            .unwrap();

        let err = hierarchy.resolve_from_application("app.Main").unwrap_err();
        assert!(
            matches!(&err, LoadError::SourceUnavailable { source_id, .. } if source_id == "unavailable"),
            "{:?}",
            err
        );

        let app = hierarchy.loader(hierarchy.application()).unwrap();
        assert!(app.cache().is_empty());
    }

    #[test]
    fn malformed_parents_are_not_masked() {
        let hierarchy = LoaderHierarchy::builder()
            .root(BOOTSTRAP, builtin("boot", &[("app/Main", Bytes::from_static(b"nope"))]))
            .child(APPLICATION, BOOTSTRAP, builtin("app", &[("app/Main", class("app/Main", "M"))]))
            .build()
            .unwrap();

        let err = hierarchy.resolve_from_application("app.Main").unwrap_err();
        assert!(matches!(err, LoadError::MalformedDefinition { .. }), "{:?}", err);
    }

    #[test]
    fn slow_sources_time_out() {
        let source = CountingSource {
            inner: builtin("app", &[("app/Main", class("app/Main", "M"))]),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::from_millis(500),
        };

        let hierarchy = LoaderHierarchy::builder()
            .root(BOOTSTRAP, builtin("boot", &[]))
            .child(
                APPLICATION,
                BOOTSTRAP,
                TimeoutSource::new(source, Duration::from_millis(20)),
            )
            .build()
            .unwrap();

        let err = hierarchy.resolve_from_application("app.Main").unwrap_err();
        assert!(matches!(err, LoadError::SourceUnavailable { .. }), "{:?}", err);

        let app = hierarchy.loader(hierarchy.application()).unwrap();
        assert!(app.cache().is_empty());
    }

    #[test]
    fn fast_sources_pass_through_timeouts() {
        let hierarchy = LoaderHierarchy::builder()
            .root(
                BOOTSTRAP,
                TimeoutSource::new(
                    builtin("boot", &[("core/Base", class("core/Base", "B"))]),
                    Duration::from_secs(5),
                ),
            )
            .build()
            .unwrap();

        assert!(hierarchy.resolve_from_application("core.Base").is_ok());
        assert!(hierarchy.resolve_from_application("core.Missing").unwrap_err().is_not_found());
    }

    #[test]
    fn cycles_fail_at_construction() {
        let res = LoaderHierarchy::builder()
            .root(BOOTSTRAP, builtin("boot", &[]))
            .child("a", "b", builtin("a", &[]))
            .child("b", "a", builtin("b", &[]))
            .build();

        assert!(matches!(res, Err(HierarchyError::Cycle(_))));

        let res = LoaderHierarchy::builder()
            .root(BOOTSTRAP, builtin("boot", &[]))
            .child("self", "self", builtin("self", &[]))
            .build();

        assert!(matches!(res, Err(HierarchyError::Cycle(name)) if name == "self"));
    }

    #[test]
    fn rootless_hierarchies_fail_at_construction() {
        let res = LoaderHierarchy::builder()
            .child("a", "b", builtin("a", &[]))
            .child("b", "a", builtin("b", &[]))
            .build();

        assert!(matches!(res, Err(HierarchyError::NoRoot)));
    }

    #[test]
    fn bad_declarations_fail_at_construction() {
        let res = LoaderHierarchy::builder().build();
        assert!(matches!(res, Err(HierarchyError::Empty)));

        let res = LoaderHierarchy::builder()
            .root("one", builtin("one", &[]))
            .root("two", builtin("two", &[]))
            .build();
        assert!(matches!(res, Err(HierarchyError::MultipleRoots(_))));

        let res = LoaderHierarchy::builder()
            .root("one", builtin("one", &[]))
            .child("one", "one", builtin("one", &[]))
            .build();
        assert!(matches!(res, Err(HierarchyError::DuplicateLoader(_))));

        let res = LoaderHierarchy::builder()
            .root("one", builtin("one", &[]))
            .child("two", "nobody", builtin("two", &[]))
            .build();
        assert!(matches!(res, Err(HierarchyError::UnknownParent { .. })));

        let res = LoaderHierarchy::builder()
            .root("one", builtin("one", &[]))
            .entry("nobody")
            .build();
        assert!(matches!(res, Err(HierarchyError::UnknownEntry(_))));
    }

    #[test]
    fn ids_follow_the_chain() {
        // Declared leaf first; ids are still handed out root first
        let hierarchy = LoaderHierarchy::builder()
            .child(APPLICATION, PLATFORM, builtin("app", &[]))
            .child(PLATFORM, BOOTSTRAP, builtin("platform", &[]))
            .root(BOOTSTRAP, builtin("boot", &[]))
            .entry(APPLICATION)
            .build()
            .unwrap();

        let names: Vec<_> = hierarchy.loaders().iter().map(|l| l.name()).collect();
        assert_eq!(names, vec![BOOTSTRAP, PLATFORM, APPLICATION]);

        for loader in hierarchy.loaders() {
            if let Some(parent) = loader.parent() {
                assert!(parent < loader.id());
            }
        }
    }

    #[test]
    fn config_builds_three_tiers() {
        let mut config = HierarchyConfig::new();
        config
            .add_bootstrap_entry("core.Base", class("core/Base", "B"))
            .add_platform_path("/nonexistent/platform")
            .add_application_path("/nonexistent/app");

        let hierarchy = LoaderHierarchy::new(&config).unwrap();
        let inspector = Inspector::new(&hierarchy);

        let app = inspector.describe(hierarchy.application()).unwrap();
        assert_eq!(app.chain_names, vec![APPLICATION, PLATFORM, BOOTSTRAP]);
        assert_eq!(
            inspector.chain_names(hierarchy.platform().unwrap()),
            vec![PLATFORM, BOOTSTRAP]
        );
        assert_eq!(
            app.source,
            SourceDescriptor::PathList(vec!["/nonexistent/app".into()])
        );

        let boot = inspector.describe(hierarchy.bootstrap()).unwrap();
        assert_eq!(
            boot.source.as_builtin().unwrap(),
            &vec![ClassName::parse("core/Base").unwrap()]
        );

        assert!(hierarchy.resolve_from_application("core.Base").is_ok());
    }

    #[test]
    fn config_rejects_bad_entries() {
        let mut config = HierarchyConfig::new();
        config.add_bootstrap_entry("bad..name", class("core/Base", "B"));

        let res = LoaderHierarchy::new(&config);
        assert!(matches!(res, Err(HierarchyError::InvalidEntry { .. })));
    }

    #[test]
    fn inspector_walks_without_resolving() {
        let hierarchy = standard();
        let inspector = Inspector::new(&hierarchy);

        let app = hierarchy.application();
        assert_eq!(inspector.defining_loader(app, "core.Base"), None);
        assert!(!inspector.is_cached(hierarchy.bootstrap(), "core.Base"));

        hierarchy.resolve_from_application("core.Base").unwrap();
        hierarchy.resolve_from_application("app.Main").unwrap();

        assert_eq!(inspector.defining_loader(app, "core.Base"), Some(hierarchy.bootstrap()));
        assert_eq!(inspector.defining_loader(app, "app.Main"), Some(app));
        assert_eq!(inspector.defining_loader(hierarchy.bootstrap(), "app.Main"), None);
        assert!(inspector.is_cached(hierarchy.bootstrap(), "core.Base"));
        assert!(!inspector.is_cached(app, "core.Base"));

        let described = inspector.describe(app).unwrap();
        assert_eq!(described.defined, 1);
        assert_eq!(described.parent_chain.len(), 3);
        assert_eq!(described.parent_chain.last(), Some(&hierarchy.bootstrap()));
        assert_eq!(
            described.to_string(),
            "app [1 defined] app (#2) -> platform (#1) -> bootstrap (#0)"
        );

        assert_eq!(inspector.describe_all().len(), 3);
    }

    #[test]
    fn define_keeps_the_first_definition() {
        let hierarchy = standard();
        let app = hierarchy.loader(hierarchy.application()).unwrap();
        let name = ClassName::parse("app/Extra").unwrap();

        let first = app.define(&name, class("app/Extra", "first")).unwrap();
        let second = app.define(&name, class("app/Extra", "second")).unwrap();

        assert!(Definition::same(&first, &second));
        assert_eq!(second.source_file(), Some("first"));
    }

    #[test]
    fn hung_sources_do_not_pile_up_workers() {
        let released = Arc::new(AtomicBool::new(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let source = TimeoutSource::new(
            HangingSource {
                released: Arc::clone(&released),
                calls: Arc::clone(&calls),
            },
            Duration::from_millis(20),
        );
        let name = ClassName::parse("app/Main").unwrap();

        for _ in 0..5 {
            let err = source.locate(&name).unwrap_err();
            assert!(
                matches!(&err, LoadError::SourceUnavailable { source_id, .. } if source_id == "hanging"),
                "{:?}",
                err
            );
        }

        // Only the first lookup started a worker, the rest were refused up front
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.stalled_workers(), 1);

        released.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + Duration::from_secs(5);
        while source.stalled_workers() > 0 {
            assert!(Instant::now() < deadline, "stalled worker never returned");
            thread::sleep(Duration::from_millis(5));
        }

        let found = source.locate(&name).unwrap();
        assert_eq!(found, Some(class("app/Main", "late")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn put_if_absent_keeps_the_existing_entry() {
        let cache = DefinitionCache::new();
        let name = ClassName::parse("app/Main").unwrap();

        let first = Definition::parse(&name, LoaderId(0), class("app/Main", "first")).unwrap();
        let stored = cache.put_if_absent(&name, first);

        let second = Definition::parse(&name, LoaderId(0), class("app/Main", "second")).unwrap();
        let kept = cache.put_if_absent(&name, second);

        assert!(Definition::same(&stored, &kept));
        assert_eq!(kept.source_file(), Some("first"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.names(), vec![name.clone()]);
        assert!(Definition::same(&cache.get(&name).unwrap(), &stored));
    }

    #[test]
    fn name_locks_are_released_after_contention() {
        let cache = DefinitionCache::new();
        let name = ClassName::parse("app/Main").unwrap();

        thread::scope(|s| {
            let held = cache.lock_name(&name);
            let waiter = s.spawn(|| drop(cache.lock_name(&name)));

            // Map, the held guard's lock and mutex guard, then the waiter's clone
            while cache.lock_references(&name) < 4 {
                thread::yield_now();
            }

            drop(held);
            waiter.join().unwrap();
        });

        assert_eq!(cache.in_flight(), 0);

        drop(cache.lock_name(&name));
        assert_eq!(cache.in_flight(), 0);
    }

    #[test]
    fn definitions_expose_their_classfile() {
        let hierarchy = LoaderHierarchy::builder()
            .root(BOOTSTRAP, builtin("boot", &[]))
            .build()
            .unwrap();
        let boot = hierarchy.loader(hierarchy.bootstrap()).unwrap();

        let bytes = ClassFileBuilder::new("app/Task")
            .super_class("java/lang/Object")
            .interface("java/lang/Runnable")
            .major_version(61)
            .build()
            .unwrap();
        let name = ClassName::parse("app.Task").unwrap();
        let task = boot.define(&name, bytes.clone()).unwrap();

        assert_eq!(task.payload(), &bytes);
        assert_eq!(task.version().major_version, 61);
        assert_eq!(task.version().minor_version, 0);
        assert_eq!(task.interfaces(), &[ClassName::parse("java/lang/Runnable").unwrap()]);
        assert!(!task.class_file().is_interface());
        assert_eq!(task.class_file().this_class_name().unwrap(), "app/Task");
    }
}
