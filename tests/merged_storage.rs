use std::sync::Arc;

use kvkit::{
    DynamicStorage, MemoryStorage, MergedStorage, PreferencesStorage, ReadOnlyPlistStorage,
    ReadableDynamicStorage, ReadableStorage, ReadableTypedStorage, Storage, TypedStorage, Value,
};
use tempfile::TempDir;

#[test]
fn defaults_layer_under_user_settings() {
    let temp_dir = TempDir::new().expect("unable to create temporary working directory");
    let mut defaults = plist::Dictionary::new();
    defaults.insert("Theme".to_owned(), plist::Value::String("light".to_owned()));
    defaults.insert("FontSize".to_owned(), plist::Value::Integer(12.into()));
    plist::Value::Dictionary(defaults)
        .to_file_xml(temp_dir.path().join("Defaults.plist"))
        .unwrap();

    let user = Arc::new(PreferencesStorage::open(temp_dir.path().join("prefs")).unwrap());
    user.set_string("dark", "Theme");
    let defaults =
        Arc::new(ReadOnlyPlistStorage::open_resource("Defaults", temp_dir.path()).unwrap());

    let settings = MergedStorage::default().with(user.clone()).with(defaults);
    assert_eq!(settings.string_value("Theme").as_deref(), Some("dark"));
    assert_eq!(settings.int_value("FontSize"), Some(12));
    assert_eq!(settings.count(), 3);

    user.remove_value("Theme");
    assert_eq!(settings.string_value("Theme").as_deref(), Some("light"));
    assert!(!settings.has_value("Missing"));
}

#[test]
fn dictionary_lets_later_stores_win() {
    let a = Arc::new(MemoryStorage::new());
    a.set(Value::from("a"), "k1");
    let b = Arc::new(MemoryStorage::new());
    b.set(Value::from("b"), "k1");
    b.set(Value::from("c"), "k2");

    let merged = MergedStorage::default().with(a).with(b);
    let dictionary = merged.dictionary();
    assert_eq!(merged.value("k1"), Some(Value::from("a")));
    assert_eq!(dictionary["k1"], Value::from("b"));
    assert_eq!(dictionary["k2"], Value::from("c"));
    assert_eq!(dictionary.len(), 2);
    assert_eq!(merged.count(), 3);
}

#[test]
fn empty_view_has_nothing() {
    let merged = MergedStorage::new(Vec::new());
    assert_eq!(merged.count(), 0);
    assert!(merged.dictionary().is_empty());
    assert_eq!(merged.value("anything"), None);
}
