//! End-to-end behavior of defined stores

use pantry_core::{Context, ReactiveRecord};
use pantry_store::{
    arg, define_options_store, define_setup_store, define_store, Definition, SetupRecord, Store,
    StoreDefinition, StoreError, StoreOptions, StoreRegistry,
};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn app() -> Context {
    let cx = Context::root();
    StoreRegistry::new().install(&cx);
    cx
}

fn person_options() -> StoreOptions {
    StoreOptions::new()
        .state(|| Ok(json!({ "name": "jacky chen", "age": 40 })))
        .action("increment", |store, args| {
            let age = store.get::<i64>("age")? + arg::<i64>(args, 0)?;
            store.set("age", age)?;
            Ok(age)
        })
        .getter("doubleAge", |store| Ok(store.get::<i64>("age")? * 2))
}

fn counter() -> StoreDefinition {
    define_setup_store("counter", |s| {
        let count = s.state(0)?;
        Ok(SetupRecord::new()
            .state("count", count)
            .action("inc", |store, _| {
                let count = store.get::<i64>("count")? + 1;
                store.set("count", count)?;
                Ok(Value::Null)
            }))
    })
    .unwrap()
}

#[test]
fn test_same_id_same_instance() {
    let cx = app();
    let use_person = define_store("person", person_options()).unwrap();

    let a = use_person.use_store(&cx).unwrap();
    let b = use_person.use_store(&cx.child().child()).unwrap();
    assert!(Store::ptr_eq(&a, &b));

    // A second definition with the same id shares the instance
    let again = define_store("person", StoreOptions::new()).unwrap();
    assert!(Store::ptr_eq(&a, &again.use_store(&cx).unwrap()));
}

#[test]
fn test_registries_are_isolated() {
    let first = app();
    let second = app();
    let use_person = define_store("person", person_options()).unwrap();

    let a = use_person.use_store(&first).unwrap();
    let b = use_person.use_store(&second).unwrap();
    assert!(!Store::ptr_eq(&a, &b));

    a.call("increment", &[json!(10)]).unwrap();
    assert_eq!(a.get::<i64>("age").unwrap(), 50);
    assert_eq!(b.get::<i64>("age").unwrap(), 40);
}

#[test]
fn test_nearest_registry_wins() {
    let outer = app();
    let inner = outer.child();
    let nested = StoreRegistry::new();
    nested.install(&inner);

    let use_counter = counter();
    let a = use_counter.use_store(&outer).unwrap();
    let b = use_counter.use_store(&inner).unwrap();
    assert!(!Store::ptr_eq(&a, &b));
    assert!(nested.contains("counter"));
}

#[test]
fn test_detached_action_mutates_shared_instance() {
    let cx = app();
    let use_counter = counter();

    let inc = use_counter.use_store(&cx).unwrap().action("inc").unwrap();
    inc.call(&[]).unwrap();
    inc.call(&[]).unwrap();

    // Passed around as a callback
    let callbacks: Vec<Box<dyn Fn()>> = vec![Box::new({
        let inc = inc.clone();
        move || {
            inc.call(&[]).unwrap();
        }
    })];
    for callback in &callbacks {
        callback();
    }

    let store = use_counter.use_store(&cx).unwrap();
    assert_eq!(store.get::<i64>("count").unwrap(), 3);
}

#[test]
fn test_getter_memoization() {
    let cx = app();
    let evaluations = Rc::new(Cell::new(0));

    let use_person = {
        let evaluations = evaluations.clone();
        define_store(
            "person",
            StoreOptions::new()
                .state(|| Ok(json!({ "name": "jacky chen", "age": 40 })))
                .action("older", |store, args| {
                    let age = store.get::<i64>("age")? + arg::<i64>(args, 0)?;
                    store.set("age", age)?;
                    Ok(age)
                })
                .getter("doubleAge", move |store| {
                    evaluations.set(evaluations.get() + 1);
                    Ok(store.get::<i64>("age")? * 2)
                }),
        )
        .unwrap()
    };
    let store = use_person.use_store(&cx).unwrap();
    assert_eq!(evaluations.get(), 0);

    assert_eq!(store.get::<i64>("doubleAge").unwrap(), 80);
    assert_eq!(store.get::<i64>("doubleAge").unwrap(), 80);
    assert_eq!(evaluations.get(), 1);

    store.call("older", &[json!(5)]).unwrap();
    assert_eq!(store.get::<i64>("doubleAge").unwrap(), 90);
    assert_eq!(evaluations.get(), 2);

    store.set("name", "someone else").unwrap();
    assert_eq!(store.get::<i64>("doubleAge").unwrap(), 90);
    assert_eq!(evaluations.get(), 2);

    // Writing an equal value is not a change
    store.set("age", 45).unwrap();
    assert_eq!(store.get::<i64>("doubleAge").unwrap(), 90);
    assert_eq!(evaluations.get(), 2);
}

#[test]
fn test_getters_can_read_other_getters() {
    let cx = app();
    let use_person = define_store(
        "person",
        person_options().getter("quadAge", |store| Ok(store.get::<i64>("doubleAge")? * 2)),
    )
    .unwrap();
    let store = use_person.use_store(&cx).unwrap();

    assert_eq!(store.get::<i64>("quadAge").unwrap(), 160);
    store.call("increment", &[json!(1)]).unwrap();
    assert_eq!(store.get::<i64>("quadAge").unwrap(), 164);
}

#[test]
fn test_call_shapes_are_equivalent() {
    let by_id = define_store("x", person_options()).unwrap();
    let by_options = define_options_store(person_options().id("x")).unwrap();
    let by_pair = define_store(person_options().id("x"), ()).unwrap();

    let mut snapshots = Vec::new();
    for def in [by_id, by_options, by_pair] {
        let store = def.use_store(&app()).unwrap();
        assert_eq!(store.id(), "x");
        store.call("increment", &[json!(2)]).unwrap();
        snapshots.push(store.snapshot().unwrap());
    }

    assert_eq!(
        snapshots[0],
        json!({ "name": "jacky chen", "age": 42, "doubleAge": 84 })
    );
    assert!(snapshots.iter().all(|s| *s == snapshots[0]));
}

#[test]
fn test_options_scenario() {
    let cx = app();
    let use_store = define_store("s", person_options()).unwrap();
    let store = use_store.use_store(&cx).unwrap();

    assert_eq!(store.call("increment", &[json!(2)]).unwrap(), json!(42));
    assert_eq!(store.get::<i64>("doubleAge").unwrap(), 84);
}

#[test]
fn test_setup_scenario() {
    let cx = app();
    let use_store = define_setup_store("f", |s| {
        let a = s.reactive(json!({ "v": 10 }))?;
        let double_a = s.computed({
            let a = a.clone();
            move |_| Ok(a.get::<i64>("v")? * 2)
        });
        Ok(SetupRecord::new().record("a", a).getter("doubleA", double_a))
    })
    .unwrap();
    let store = use_store.use_store(&cx).unwrap();

    assert_eq!(store.get::<i64>("doubleA").unwrap(), 20);
    store.record("a").unwrap().set("v", 15).unwrap();
    assert_eq!(store.get::<i64>("doubleA").unwrap(), 30);
    assert_eq!(store.value("a").unwrap(), json!({ "v": 15 }));
}

#[test]
fn test_setup_action_reads_sibling_record() {
    let cx = app();
    let use_cart = define_store(
        "cart",
        Definition::setup(|s| {
            let items = s.reactive(json!({ "apples": 1 }))?;
            Ok(SetupRecord::new()
                .record("items", items)
                .action("add", |store, args| {
                    let name: String = arg(args, 0)?;
                    let items = store.record("items")?;
                    let count = items.value(&name).and_then(|v| v.as_i64()).unwrap_or(0) + 1;
                    items.set(&name, count)?;
                    Ok(count)
                }))
        }),
    )
    .unwrap();

    let add = use_cart.use_store(&cx).unwrap().action("add").unwrap();
    assert_eq!(add.call(&[json!("apples")]).unwrap(), json!(2));
    assert_eq!(add.call(&[json!("pears")]).unwrap(), json!(1));

    let store = use_cart.use_store(&cx).unwrap();
    assert_eq!(store.value("items").unwrap(), json!({ "apples": 2, "pears": 1 }));
}

#[test]
fn test_missing_context_is_an_error() {
    let use_person = define_store("person", person_options()).unwrap();
    let err = use_person.use_store(&Context::root()).unwrap_err();
    assert!(matches!(err, StoreError::NoRegistry { .. }));
}

#[test]
fn test_failed_construction_is_not_cached() {
    let cx = app();
    let attempts = Rc::new(Cell::new(0));

    let use_flaky = {
        let attempts = attempts.clone();
        define_setup_store("flaky", move |s| {
            attempts.set(attempts.get() + 1);
            if attempts.get() == 1 {
                anyhow::bail!("first attempt fails");
            }
            Ok(SetupRecord::new().state("ready", s.state(true)?))
        })
        .unwrap()
    };

    let err = use_flaky.use_store(&cx).unwrap_err();
    assert_eq!(err.to_string(), "first attempt fails");
    let registry = StoreRegistry::from_context(&cx).unwrap();
    assert!(!registry.contains("flaky"));

    let store = use_flaky.use_store(&cx).unwrap();
    assert!(store.get::<bool>("ready").unwrap());
    assert_eq!(attempts.get(), 2);
}

#[test]
fn test_failed_options_state_is_not_cached() {
    let cx = app();
    let fail = Rc::new(Cell::new(true));
    let use_remote = {
        let fail = fail.clone();
        define_store(
            "remote",
            StoreOptions::new().state(move || {
                if fail.get() {
                    anyhow::bail!("backend unavailable");
                }
                Ok(json!({ "loaded": true }))
            }),
        )
        .unwrap()
    };

    assert!(use_remote.use_store(&cx).is_err());
    let registry = StoreRegistry::from_context(&cx).unwrap();
    assert!(registry.state("remote").is_none());

    fail.set(false);
    let store = use_remote.use_store(&cx).unwrap();
    assert!(store.get::<bool>("loaded").unwrap());
    assert!(registry.state("remote").is_some());
}

#[test]
fn test_reentrant_construction_is_rejected() {
    let cx = app();
    let slot: Rc<RefCell<Option<StoreDefinition>>> = Rc::new(RefCell::new(None));

    let use_selfish = {
        let slot = slot.clone();
        let cx = cx.clone();
        define_setup_store("selfish", move |_| {
            if let Some(def) = slot.borrow().as_ref() {
                def.use_store(&cx)?;
            }
            Ok(SetupRecord::new())
        })
        .unwrap()
    };
    *slot.borrow_mut() = Some(use_selfish.clone());

    let err = use_selfish.use_store(&cx).unwrap_err();
    assert!(matches!(err, StoreError::Reentrant { ref id } if id == "selfish"));

    // The guard is released; the failure was not cached either
    let registry = StoreRegistry::from_context(&cx).unwrap();
    assert!(!registry.contains("selfish"));
    *slot.borrow_mut() = None;
    assert!(use_selfish.use_store(&cx).is_ok());
}

#[test]
fn test_setup_can_use_other_stores() {
    let cx = app();
    let use_counter = counter();

    let use_dashboard = {
        let cx = cx.clone();
        let use_counter = use_counter.clone();
        define_setup_store("dashboard", move |s| {
            let counter = use_counter.use_store(&cx)?;
            let label = s.computed(move |_| Ok(format!("count: {}", counter.get::<i64>("count")?)));
            Ok(SetupRecord::new().getter("label", label))
        })
        .unwrap()
    };

    let dashboard = use_dashboard.use_store(&cx).unwrap();
    assert_eq!(dashboard.get::<String>("label").unwrap(), "count: 0");

    use_counter.use_store(&cx).unwrap().call("inc", &[]).unwrap();
    assert_eq!(dashboard.get::<String>("label").unwrap(), "count: 1");
}

#[test]
fn test_user_errors_pass_through() {
    #[derive(Debug, thiserror::Error)]
    #[error("out of stock: {0}")]
    struct OutOfStock(String);

    let cx = app();
    let use_shop = define_store(
        "shop",
        StoreOptions::new()
            .state(|| Ok(json!({ "stock": 0 })))
            .action("buy", |store, args| {
                let item: String = arg(args, 0)?;
                if store.get::<i64>("stock")? == 0 {
                    return Err(OutOfStock(item).into());
                }
                Ok(Value::Null)
            }),
    )
    .unwrap();
    let store = use_shop.use_store(&cx).unwrap();

    match store.call("buy", &[json!("lamp")]).unwrap_err() {
        StoreError::User(err) => {
            let err = err.downcast::<OutOfStock>().unwrap();
            assert_eq!(err.0, "lamp");
        }
        other => panic!("unexpected error: {other}"),
    }

    // Store errors raised inside an action come back out as themselves
    assert!(matches!(
        store.call("buy", &[]),
        Err(StoreError::MissingArgument { index: 0 })
    ));
}

#[test]
fn test_patch_and_reset() {
    let cx = app();
    let store = define_store("person", person_options())
        .unwrap()
        .use_store(&cx)
        .unwrap();

    store.patch(json!({ "name": "chen", "age": 50 })).unwrap();
    assert_eq!(store.get::<i64>("doubleAge").unwrap(), 100);

    let raw: ReactiveRecord = StoreRegistry::from_context(&cx)
        .unwrap()
        .state("person")
        .unwrap();
    assert_eq!(raw.get::<String>("name").unwrap(), "chen");

    store.reset().unwrap();
    assert_eq!(
        store.snapshot().unwrap(),
        json!({ "name": "jacky chen", "age": 40, "doubleAge": 80 })
    );
}

#[test]
fn test_getter_reading_a_failed_getter_recovers() {
    let cx = app();
    let use_ratio = define_store(
        "ratio",
        StoreOptions::new()
            .state(|| Ok(json!({ "x": 0 })))
            .getter("inv", |store| {
                let x = store.get::<i64>("x")?;
                if x == 0 {
                    return Err(StoreError::from(anyhow::anyhow!("x is zero")));
                }
                Ok(100 / x)
            })
            .getter("safe", |store| Ok(store.get::<i64>("inv").unwrap_or(-1))),
    )
    .unwrap();
    let store = use_ratio.use_store(&cx).unwrap();

    assert_eq!(store.get::<i64>("safe").unwrap(), -1);
    assert!(store.get::<i64>("inv").is_err());

    store.set("x", 4).unwrap();
    assert_eq!(store.get::<i64>("inv").unwrap(), 25);
    assert_eq!(store.get::<i64>("safe").unwrap(), 25);

    store.set("x", 0).unwrap();
    assert_eq!(store.get::<i64>("safe").unwrap(), -1);
    store.set("x", 5).unwrap();
    assert_eq!(store.get::<i64>("safe").unwrap(), 20);
}

#[test]
fn test_getter_cycles_are_reported() {
    let cx = app();
    let use_loops = define_store(
        "loops",
        StoreOptions::new()
            .getter("itself", |store| Ok(store.get::<i64>("itself")? + 1))
            .getter("ping", |store| Ok(store.get::<i64>("pong")? + 1))
            .getter("pong", |store| Ok(store.get::<i64>("ping")? + 1)),
    )
    .unwrap();
    let store = use_loops.use_store(&cx).unwrap();

    assert!(matches!(
        store.get::<i64>("itself"),
        Err(StoreError::GetterCycle { ref getter, .. }) if getter == "itself"
    ));
    assert!(matches!(
        store.get::<i64>("ping"),
        Err(StoreError::GetterCycle { ref getter, .. }) if getter == "ping"
    ));
    assert!(matches!(
        store.value("pong"),
        Err(StoreError::GetterCycle { .. })
    ));
}
