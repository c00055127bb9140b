use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use wrapp_container::{
    AddOptions, Args, Container, Dependency, EventKind, Function, GetOptions, InjectError,
    Instance, Key, RegisterError, RequireError, ResetOptions, Symbol,
};

fn counting(
    counter: &Arc<AtomicUsize>,
) -> impl Fn(&Args) -> Result<usize, InjectError> + Send + Sync + 'static {
    let counter = counter.clone();
    move |_| Ok(counter.fetch_add(1, Ordering::SeqCst))
}

#[test]
fn singleton_is_created_once_until_reset() {
    let container = Container::new();
    let created = Arc::new(AtomicUsize::new(0));
    container
        .add_singleton("service", counting(&created), ())
        .unwrap();

    let first = container.get::<usize>("service").unwrap();
    let second = container.get::<usize>("service").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(created.load(Ordering::SeqCst), 1);

    container.reset(ResetOptions::default());
    assert_eq!(*container.get::<usize>("service").unwrap(), 1);
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn transient_is_created_on_every_get() {
    let container = Container::new();
    let created = Arc::new(AtomicUsize::new(0));
    container
        .add_transient("service", counting(&created), ())
        .unwrap();

    assert_eq!(*container.get::<usize>("service").unwrap(), 0);
    assert_eq!(*container.get::<usize>("service").unwrap(), 1);
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn transients_read_current_factories() {
    let container = Container::new();
    container
        .add_transient("multiplier", |_| Ok(2), ())
        .unwrap()
        .add_transient(
            "multiplied",
            |args| Ok(2 * *args.get::<i32>(0)?),
            ["multiplier"],
        )
        .unwrap();
    assert_eq!(*container.get::<i32>("multiplied").unwrap(), 4);

    container
        .add_transient("multiplier", |_| Ok(5), AddOptions::new().replace(true))
        .unwrap();
    assert_eq!(*container.get::<i32>("multiplied").unwrap(), 10);
}

#[test]
fn missing_keys() {
    let container = Container::new();

    assert!(matches!(
        container.get::<i32>("missing"),
        Err(RequireError::ServiceNotFound(_))
    ));
    assert!(container.try_get::<i32>("missing").unwrap().is_none());
    assert!(container
        .get_with("missing", GetOptions::optional())
        .unwrap()
        .is_none());
}

#[test]
fn missing_dependency_names_the_dependency() {
    let container = Container::new();
    container
        .add_transient("service", |_| Ok(()), ["dependency"])
        .unwrap();

    let error = container.get::<()>("service").unwrap_err();
    let RequireError::ServiceNotFound(key) = error else {
        panic!("expected a missing dependency, got {error:?}");
    };
    assert_eq!(key, Key::from("dependency"));
}

#[test]
fn skip_and_optional_dependencies_inject_nothing() {
    let container = Container::new();
    container.add_instance("skip", "registered").unwrap();
    container
        .add_transient(
            "service",
            |args| {
                assert!(args.instance(0).is_none());
                assert!(args.instance(1).is_none());
                Ok(args.len())
            },
            vec![Dependency::Skip, Dependency::optional("unknown")],
        )
        .unwrap();

    assert_eq!(*container.get::<usize>("service").unwrap(), 2);
}

#[test]
fn resolver_and_inline_dependencies_bypass_the_registry() {
    let other = Container::new();
    other.add_instance("remote", 40_i32).unwrap();

    let container = Container::new();
    container
        .add_transient(
            "sum",
            |args| Ok(*args.get::<i32>(0)? + *args.get::<i32>(1)?),
            vec![
                other.resolver("remote"),
                Dependency::inline(wrapp_container::FactoryRecord::transient(|_| Ok(2_i32))),
            ],
        )
        .unwrap();

    assert_eq!(*container.get::<i32>("sum").unwrap(), 42);
    assert!(!container.has("remote"));
}

#[test]
fn symbol_and_number_keys() {
    let container = Container::new();
    let symbol = Symbol::new("service");
    container.add_instance(symbol.clone(), "by symbol").unwrap();
    container.add_instance(7_i64, "by number").unwrap();

    assert_eq!(*container.get::<&str>(symbol).unwrap(), "by symbol");
    assert_eq!(*container.get::<&str>(7_i64).unwrap(), "by number");
    assert!(!container.has(Symbol::new("service")));
}

#[test]
fn alias_follows_replacements_of_its_target() {
    let container = Container::new();
    container.add_instance("target", 1_u8).unwrap();
    container.add_alias("alias", "target").unwrap();
    assert_eq!(*container.get::<u8>("alias").unwrap(), 1);

    container
        .add_instance_with("target", 2_u8, AddOptions::new().replace(true))
        .unwrap();
    assert_eq!(*container.get::<u8>("alias").unwrap(), 2);
}

#[test]
fn replacing_with_a_self_dependency_wraps_the_previous_factory() {
    let container = Container::new();
    container.add_transient("value", |_| Ok(1), ()).unwrap();
    container
        .add_transient(
            "value",
            |args| Ok(*args.get::<i32>(0)? + 10),
            AddOptions::new().dependencies(["value"]).replace(true),
        )
        .unwrap();

    assert_eq!(*container.get::<i32>("value").unwrap(), 11);
}

#[test]
fn hooks_run_around_resolution_and_replacement() {
    let container = Container::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let (before, after, replaced) = (log.clone(), log.clone(), log.clone());

    container
        .add_singleton(
            "service",
            |_| Ok(1_u8),
            AddOptions::new()
                .before_resolving(move |_, key| before.lock().unwrap().push(format!("before {key}")))
                .after_resolving(move |_, key, _| after.lock().unwrap().push(format!("after {key}")))
                .before_replaced(move |_, key, record| {
                    replaced
                        .lock()
                        .unwrap()
                        .push(format!("replaced {key} by {}", record.kind));
                    Ok(())
                }),
        )
        .unwrap();

    container.get::<u8>("service").unwrap();
    container.get::<u8>("service").unwrap();
    container
        .add_transient("service", |_| Ok(2_u8), AddOptions::new().replace(true))
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "before service",
            "after service",
            "replaced service by transient"
        ]
    );
}

#[test]
fn before_replaced_can_veto_the_replacement() {
    let container = Container::new();
    container
        .add_instance_with(
            "locked",
            1_u8,
            AddOptions::new().before_replaced(|_, key, _| Err(RegisterError::DuplicateKey(key.clone()))),
        )
        .unwrap();

    assert!(container
        .add_instance_with("locked", 2_u8, AddOptions::new().replace(true))
        .is_err());
    assert_eq!(*container.get::<u8>("locked").unwrap(), 1);
}

#[test]
fn invalid_factories_are_rejected() {
    let container = Container::new();

    assert!(matches!(
        container.add_instance_with("value", 1_u8, ["dependency"]),
        Err(RegisterError::InvalidFactory { .. })
    ));
    assert!(!container.has("value"));
}

#[test]
fn middlewares_wrap_resolution_last_added_outermost() {
    let container = Container::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    container.add_instance("service", 1_u8).unwrap();

    for name in ["1", "2"] {
        let log = log.clone();
        container.use_middleware(move |_, key, next| {
            log.lock().unwrap().push(format!("before{name}"));
            let resolved = next(key);
            log.lock().unwrap().push(format!("after{name}"));
            resolved
        });
    }

    container.get::<u8>("service").unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        vec!["before2", "before1", "after1", "after2"]
    );
}

#[test]
fn middleware_can_substitute_values() {
    let container = Container::new();
    container.use_middleware(|_, key, next| match key.as_str() {
        Some("mocked") => Ok(Some(Instance::new(99_u8))),
        _ => next(key),
    });

    assert_eq!(*container.get::<u8>("mocked").unwrap(), 99);
}

#[test]
fn events_are_delivered_per_kind() {
    let container = Container::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let listener = {
        let seen = seen.clone();
        wrapp_container::Listener::new(move |event| {
            seen.lock().unwrap().push((event.kind(), event.key().cloned()))
        })
    };

    for event in ["add", "replace", "reset", "get", "produce"] {
        container.add_event_listener(event, &listener).unwrap();
    }
    // Listeners form a set
    container.add_event_listener("get", &listener).unwrap();

    container.add_singleton("service", |_| Ok(1_u8), ()).unwrap();
    container.get::<u8>("service").unwrap();
    container.get::<u8>("service").unwrap();
    container
        .add_singleton("service", |_| Ok(2_u8), AddOptions::new().replace(true))
        .unwrap();
    container.reset(ResetOptions::default());

    // Misses never emit get
    assert!(container.try_get::<u8>("missing").unwrap().is_none());
    assert!(container.get::<u8>("missing").is_err());

    let key = Some(Key::from("service"));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (EventKind::Add, key.clone()),
            (EventKind::Produce, key.clone()),
            (EventKind::Get, key.clone()),
            (EventKind::Get, key.clone()),
            (EventKind::Replace, key.clone()),
            (EventKind::Add, key.clone()),
            (EventKind::Reset, None),
        ]
    );

    container.remove_event_listener("get", &listener).unwrap();
    container.get::<u8>("service").unwrap();
    assert_eq!(seen.lock().unwrap().last().unwrap().0, EventKind::Produce);

    let error = container.add_event_listener("remove", &listener).unwrap_err();
    assert_eq!(error.event, "remove");

    let error = container.remove_event_listener("bogus", &listener).unwrap_err();
    assert_eq!(error.event, "bogus");
    assert_eq!(
        error.supported,
        vec!["add", "replace", "reset", "get", "produce"]
    );
}

#[test]
fn add_event_reports_the_replace_option() {
    let container = Container::new();
    let flags = Arc::new(Mutex::new(Vec::new()));
    let recorded = flags.clone();
    container.on(EventKind::Add, move |event| {
        if let wrapp_container::Event::Add { replace, .. } = event {
            recorded.lock().unwrap().push(*replace);
        }
    });

    container
        .add_instance_with("fresh", 1_u8, AddOptions::new().replace(true))
        .unwrap();
    container.add_instance("plain", 2_u8).unwrap();

    assert_eq!(*flags.lock().unwrap(), vec![true, false]);
}

#[test]
fn injecute_bind_and_call() {
    let container = Container::new();
    container.add_instance("a", 2_i32).unwrap();
    container.add_instance("b", 3_i32).unwrap();

    let sum = container
        .injecute(
            |args| Ok(*args.get::<i32>(0)? + *args.get::<i32>(1)?),
            ["a", "b"],
        )
        .unwrap();
    assert_eq!(sum, 5);
    assert!(!container.has("sum"));

    let product = container.bind(["a", "b"], |args| {
        Ok(*args.get::<i32>(0)? * *args.get::<i32>(1)?)
    });
    assert_eq!(product().unwrap(), 6);
    container
        .add_instance_with("a", 4_i32, AddOptions::new().replace(true))
        .unwrap();
    assert_eq!(product().unwrap(), 12);

    container
        .add_instance(
            "double",
            Function::new(|args| Ok(*args.get::<i32>(0)? * 2)),
        )
        .unwrap();
    let doubled = container
        .call("double", Args::from(vec![Instance::new(21_i32)]))
        .unwrap();
    assert_eq!(*doubled.downcast::<i32>().unwrap(), 42);

    assert!(matches!(
        container.call("a", Args::default()),
        Err(RequireError::NotCallable(_))
    ));
    assert!(matches!(
        container.call("double", Args::default()),
        Err(RequireError::InvocationFailed { .. })
    ));
}

#[test]
fn set_cache_instance_overrides_until_reset() {
    let container = Container::new();
    container.add_singleton("service", |_| Ok(1_u8), ()).unwrap();

    container.set_cache_instance("service", 2_u8);
    assert_eq!(*container.get::<u8>("service").unwrap(), 2);

    container.reset(ResetOptions::keys(["service"]));
    assert_eq!(*container.get::<u8>("service").unwrap(), 1);
}

#[test]
fn extend_groups_registrations() {
    let container = Container::new();
    let keys = container
        .extend(|container| -> Result<_, RegisterError> {
            container
                .add_instance("a", 1_u8)?
                .add_alias("b", "a")?;
            Ok(container.keys())
        })
        .unwrap();

    assert_eq!(keys, vec![Key::from("a"), Key::from("b")]);
}

#[test]
fn circular_dependencies_fail_at_registration() {
    let container = Container::new();
    container.add_transient("x", |_| Ok(()), ["z"]).unwrap();
    container.add_transient("y", |_| Ok(()), ["x"]).unwrap();

    let error = container.add_singleton("z", |_| Ok(()), ["y"]).unwrap_err();
    assert_eq!(
        error.to_string(),
        "Circular dependency detected z -> y -> x -> *z*."
    );

    // Replacing into a cycle is caught as well
    container.add_transient("z", |_| Ok(()), ()).unwrap();
    assert!(matches!(
        container.add_transient("z", |_| Ok(()), AddOptions::new().dependency("y").replace(true)),
        Err(RegisterError::CircularDependency(_))
    ));
}
