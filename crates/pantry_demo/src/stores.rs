//! The demo application's stores

use pantry_store::{
    arg, define_setup_store, define_store, SetupRecord, StoreDefinition, StoreOptions,
};
use serde_json::json;

/// An options-style store: a person with an age
pub fn use_index() -> anyhow::Result<StoreDefinition> {
    Ok(define_store(
        "index",
        StoreOptions::new()
            .state(|| Ok(json!({ "name": "jacky chen", "age": 40 })))
            .action("increment", |store, args| {
                let age = store.get::<i64>("age")? + arg::<i64>(args, 0)?;
                store.set("age", age)?;
                Ok(age)
            })
            .getter("doubleAge", |store| Ok(store.get::<i64>("age")? * 2)),
    )?)
}

/// A setup-style store: a record and a value derived from it
pub fn use_fn_store() -> anyhow::Result<StoreDefinition> {
    Ok(define_setup_store("fnStore", |s| {
        let a = s.reactive(json!({ "v": 10 }))?;
        let double_a = s.computed({
            let a = a.clone();
            move |_| Ok(a.get::<i64>("v")? * 2)
        });
        Ok(SetupRecord::new().record("a", a).getter("doubleA", double_a))
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_core::Context;
    use pantry_store::{Store, StoreRegistry};

    #[test]
    fn test_index_store() {
        let app = Context::root();
        StoreRegistry::new().install(&app);

        let store = use_index().unwrap().use_store(&app).unwrap();
        assert_eq!(store.call("increment", &[json!(2)]).unwrap(), json!(42));
        assert_eq!(store.get::<i64>("doubleAge").unwrap(), 84);
    }

    #[test]
    fn test_fn_store_shared_between_scopes() {
        let app = Context::root();
        StoreRegistry::new().install(&app);
        let def = use_fn_store().unwrap();

        let a = def.use_store(&app.child()).unwrap();
        let b = def.use_store(&app.child()).unwrap();
        assert!(Store::ptr_eq(&a, &b));

        assert_eq!(a.get::<i64>("doubleA").unwrap(), 20);
        b.record("a").unwrap().set("v", 15).unwrap();
        assert_eq!(a.get::<i64>("doubleA").unwrap(), 30);
    }
}
