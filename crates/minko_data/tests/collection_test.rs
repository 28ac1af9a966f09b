//! Integration test for collections attached to a store.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use minko_data::{Collection, DataError, PropertyEvent, Provider, Store};

fn counter() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

fn bump(counter: &Rc<Cell<u32>>) -> impl Fn(&PropertyEvent) + 'static {
    let counter = Rc::clone(counter);
    move |_| counter.set(counter.get() + 1)
}

fn paths(log: &Rc<RefCell<Vec<String>>>) -> impl Fn(&PropertyEvent) + 'static {
    let log = Rc::clone(log);
    move |event| log.borrow_mut().push(event.path.clone())
}

#[test]
fn test_add_collection() {
    let store = Store::new();
    let c = Collection::new("test");

    c.push_back(Provider::new());
    store.add_collection(&c);

    assert!(store.collections().iter().any(|attached| Rc::ptr_eq(attached, &c)));
    assert_eq!(store.get::<u32>("test.length"), Ok(1));
}

#[test]
fn test_add_provider_to_attached_collection() {
    let store = Store::new();
    let p = Provider::new();
    let c = Collection::new("test");

    p.set("foo", 42u32);
    store.add_collection(&c);
    c.push_back(Rc::clone(&p));

    assert!(store.providers().iter().any(|listed| Rc::ptr_eq(listed, &p)));
    assert!(store.has_property("test[0].foo"));
    assert_eq!(store.get::<u32>("test[0].foo"), Ok(42));
    assert_eq!(store.get::<u32>(&format!("test[{}].foo", p.uuid())), Ok(42));
}

#[test]
fn test_remove_collection() {
    let store = Store::new();
    let p = Provider::new();
    let c = Collection::new("test");
    let removed = counter();

    p.set("foo", 42);
    c.push_back(Rc::clone(&p));
    store.add_collection(&c);
    let _slot = store.property_removed_at("test[0].foo").connect(bump(&removed));

    assert!(store.remove_collection(&c).is_ok());

    assert!(store.collections().is_empty());
    assert!(store.providers().is_empty());
    assert!(!store.has_property("test[0].foo"));
    assert!(!store.has_property("test.length"));
    assert_eq!(removed.get(), 1);
    assert!(matches!(
        store.remove_collection(&c),
        Err(DataError::CollectionNotFound { .. })
    ));
}

#[test]
fn test_remove_provider_from_collection() {
    let store = Store::new();
    let p = Provider::new();
    let c = Collection::new("test");

    p.set("foo", 42);
    c.push_back(Rc::clone(&p));
    store.add_collection(&c);
    assert!(c.remove(&p).is_ok());

    assert!(store.collections().iter().any(|attached| Rc::ptr_eq(attached, &c)));
    assert!(!store.providers().iter().any(|listed| Rc::ptr_eq(listed, &p)));
    assert_eq!(store.get::<u32>("test.length"), Ok(0));
}

#[test]
fn test_store_level_collection_helpers() {
    let store = Store::new();
    let p = Provider::new();
    p.set("foo", 1);

    store.add_provider_to_collection(&p, "bar");
    assert_eq!(store.get::<i32>("bar[0].foo"), Ok(1));

    assert!(store.remove_provider_from_collection(&p, "bar").is_ok());
    assert!(!store.has_property("bar[0].foo"));
    assert!(matches!(
        store.remove_provider_from_collection(&p, "bar"),
        Err(DataError::ProviderNotFound { .. })
    ));
    assert!(matches!(
        store.remove_provider_from_collection(&p, "nope"),
        Err(DataError::CollectionNotFound { .. })
    ));
}

#[test]
fn test_get_collection_nth() {
    let store = Store::new();
    let p0 = Provider::new();
    let p1 = Provider::new();
    let p2 = Provider::new();
    let c = Collection::new("test");

    p0.set("foo", 42);
    p1.set("foo", 4242);
    p2.set("foo", 424_242);
    store.add_collection(&c);
    assert_eq!(store.get::<u32>("test.length"), Ok(0));
    c.push_back(Rc::clone(&p0));
    assert_eq!(store.get::<u32>("test.length"), Ok(1));
    c.push_back(Rc::clone(&p1));
    assert_eq!(store.get::<u32>("test.length"), Ok(2));
    c.push_back(Rc::clone(&p2));
    assert_eq!(store.get::<u32>("test.length"), Ok(3));

    assert_eq!(store.get::<i32>("test[0].foo"), Ok(42));
    assert_eq!(store.get::<i32>("test[1].foo"), Ok(4242));
    assert_eq!(store.get::<i32>("test[2].foo"), Ok(424_242));
    assert!(!store.has_property("test[3].foo"));
}

#[test]
fn test_collection_property_added() {
    let store = Store::new();
    let p = Provider::new();
    let c = Collection::new("test");
    let added = Rc::new(Cell::new(false));

    c.push_back(Rc::clone(&p));
    store.add_collection(&c);
    let _slot = {
        let added = Rc::clone(&added);
        store.property_added().connect(move |event: &PropertyEvent| {
            added.set(
                event.property_name == "foo" && event.provider.get::<i32>("foo") == Ok(42),
            );
        })
    };

    p.set("foo", 42);

    assert!(added.get());
}

#[test]
fn test_collection_property_changed() {
    let store = Store::new();
    let p = Provider::new();
    let c = Collection::new("test");
    let changed = counter();

    c.push_back(Rc::clone(&p));
    store.add_collection(&c);
    p.set("foo", 42);
    let _slot = store.property_changed_at("test[0].foo").connect(bump(&changed));
    let _uuid = store
        .property_changed_at(&format!("test[{}].foo", p.uuid()))
        .connect(bump(&changed));

    p.set("foo", 4242);

    assert_eq!(changed.get(), 2);
}

#[test]
fn test_collection_property_changed_not() {
    let store = Store::new();
    let p = Provider::new();
    let c = Collection::new("test");
    let changed = counter();

    c.push_back(Rc::clone(&p));
    store.add_collection(&c);
    p.set("foo", 42);
    let _slot = store.property_changed_at("test[0].foo").connect(bump(&changed));

    p.set("foo", 42);

    assert_eq!(changed.get(), 0);
}

#[test]
fn test_collection_property_removed() {
    let store = Store::new();
    let p = Provider::new();
    let c = Collection::new("test");
    let removed = Rc::new(RefCell::new(Vec::new()));

    p.set("foo", 42);
    c.push_back(Rc::clone(&p));
    store.add_collection(&c);
    let _slot = store.property_removed().connect(paths(&removed));

    p.unset("foo");

    assert_eq!(*removed.borrow(), vec![String::from("test[0].foo")]);
}

#[test]
fn test_collection_nth_property_changed() {
    let store = Store::new();
    let p0 = Provider::new();
    let p1 = Provider::new();
    let c = Collection::new("test");
    let changed = Rc::new(Cell::new(false));

    p0.set("foo", 42);
    p1.set("foo", 4242);
    c.push_back(Rc::clone(&p0)).push_back(Rc::clone(&p1));
    store.add_collection(&c);
    let _slot = {
        let changed = Rc::clone(&changed);
        store
            .property_changed_at("test[1].foo")
            .connect(move |event: &PropertyEvent| {
                changed.set(event.provider.get::<i32>(&event.property_name) == Ok(42));
            })
    };

    p1.set("foo", 42);

    assert!(changed.get());
}

#[test]
fn test_collection_property_pointer_consistency() {
    let store = Store::new();
    let p0 = Provider::new();
    let p1 = Provider::new();
    let c = Collection::new("test");

    p0.set("foo", 42);
    p1.set("foo", 4242);
    c.push_back(Rc::clone(&p0)).push_back(Rc::clone(&p1));
    store.add_collection(&c);

    assert_eq!(
        store.get_pointer::<i32>("test[0].foo"),
        store.get_pointer::<i32>("test[0].foo")
    );
    assert_eq!(store.get_pointer::<i32>("test[0].foo"), p0.get_pointer::<i32>("foo"));
    assert_eq!(store.get_pointer::<i32>("test[1].foo"), p1.get_pointer::<i32>("foo"));
    assert_ne!(
        store.get_pointer::<i32>("test[0].foo"),
        store.get_pointer::<i32>("test[1].foo")
    );
}

#[test]
fn test_provider_added_twice_in_collection_removed_once() {
    let store = Store::new();
    let p = Provider::new();
    let added = Rc::new(RefCell::new(Vec::new()));
    let added_first = counter();
    let added_second = counter();

    p.set("foo", 42);
    let _all = store.property_added().connect(paths(&added));
    let _first = store.property_added_at("bar[0].foo").connect(bump(&added_first));
    let _second = store.property_added_at("bar[1].foo").connect(bump(&added_second));

    store.add_provider_to_collection(&p, "bar");
    store.add_provider_to_collection(&p, "bar");

    let foo_paths: Vec<String> = added
        .borrow()
        .iter()
        .filter(|path| path.ends_with(".foo"))
        .cloned()
        .collect();
    assert_eq!(
        foo_paths,
        vec![
            String::from("bar[0].foo"),
            String::from("bar[0].foo"),
            String::from("bar[1].foo"),
        ]
    );
    assert_eq!(added_first.get(), 2);
    assert_eq!(added_second.get(), 1);
    assert_eq!(store.get::<i32>("bar[1].foo"), Ok(42));

    assert!(store.remove_provider_from_collection(&p, "bar").is_ok());

    assert!(store.has_property("bar[0].foo"));
    assert!(!store.has_property("bar[1].foo"));
    assert!(store.has_property(&format!("bar[{}].foo", p.uuid())));
    assert_eq!(store.get::<u32>("bar.length"), Ok(1));
}

#[test]
fn test_removal_reindexes_following_items() {
    let store = Store::new();
    let p0 = Provider::new();
    let p1 = Provider::new();
    let c = Collection::new("lights");
    let removed = Rc::new(RefCell::new(Vec::new()));
    let added = Rc::new(RefCell::new(Vec::new()));

    p0.set("color", 0);
    p1.set("color", 1);
    c.push_back(Rc::clone(&p0)).push_back(Rc::clone(&p1));
    store.add_collection(&c);
    let _r = store.property_removed().connect(paths(&removed));
    let _a = store.property_added().connect(paths(&added));

    assert!(c.remove(&p0).is_ok());

    assert_eq!(store.get::<i32>("lights[0].color"), Ok(1));
    assert!(!store.has_property("lights[1].color"));
    assert!(!store.has_property(&format!("lights[{}].color", p0.uuid())));
    assert!(removed.borrow().contains(&String::from("lights[1].color")));
    assert!(added.borrow().contains(&String::from("lights[0].color")));
}

#[test]
fn test_insert_shifts_positional_paths() {
    let store = Store::new();
    let p0 = Provider::new();
    let p1 = Provider::new();
    let c = Collection::new("lights");

    p0.set("color", 0);
    p1.set("color", 1);
    store.add_collection(&c);
    c.push_back(Rc::clone(&p0));
    assert!(c.insert(0, Rc::clone(&p1)).is_ok());

    assert_eq!(store.get::<i32>("lights[0].color"), Ok(1));
    assert_eq!(store.get::<i32>("lights[1].color"), Ok(0));
    assert_eq!(store.get::<u32>("lights.length"), Ok(2));
}

#[test]
fn test_removing_last_element_stays_in_range() {
    let store = Store::new();
    let c = Collection::new("items");
    let p0 = Provider::new();
    let p1 = Provider::new();
    let removed = Rc::new(RefCell::new(Vec::new()));

    p0.set("x", 0);
    p1.set("x", 1);
    c.push_back(Rc::clone(&p0)).push_back(Rc::clone(&p1));
    store.add_collection(&c);
    let _slot = store.property_removed().connect(paths(&removed));

    assert!(c.erase(1).is_ok());

    assert_eq!(*removed.borrow(), vec![String::from("items[1].x")]);
}

#[test]
fn test_length_changes_on_push() {
    let store = Store::new();
    let c = Collection::new("items");
    let length_changes = counter();

    store.add_collection(&c);
    let _slot = store.property_changed_at("items.length").connect(bump(&length_changes));

    c.push_back(Provider::new());
    c.push_back(Provider::new());

    assert_eq!(length_changes.get(), 2);
}

#[test]
fn test_clear_detaches_everything() {
    let store = Store::new();
    let c = Collection::new("items");
    let p = Provider::new();
    p.set("x", 1);

    c.push_back(Rc::clone(&p)).push_back(Provider::new());
    store.add_collection(&c);
    c.clear();

    assert!(store.providers().is_empty());
    assert!(!store.has_property("items[0].x"));
    assert_eq!(store.get::<u32>("items.length"), Ok(0));
}
