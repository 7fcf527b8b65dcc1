use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use kvkit::storages::{InMemoryUbiquitousStore, MemoryVault};
use kvkit::{
    KeychainStorage, MemoryStorage, Number, PlistStorage, PreferencesStorage, ReadableStorage,
    ReadableTypedStorage, Storage, TypedStorage, UbiquitousStorage,
};
use rust_decimal::Decimal;
use tempfile::TempDir;

fn assert_bool_integrity(storage: &dyn TypedStorage) {
    for value in [true, false] {
        assert!(storage.set_bool(value, "Bool"), "failed to set Bool");
        assert_eq!(storage.bool_value("Bool"), Some(value));
    }
}

fn assert_int_integrity(storage: &dyn TypedStorage) {
    for value in [5, i64::MIN, i64::MAX] {
        assert!(storage.set_int(value, "Int"), "failed to set Int");
        assert_eq!(storage.int_value("Int"), Some(value));
    }
}

fn assert_decimal_integrity(storage: &dyn TypedStorage) {
    for raw in ["5", "5.55"] {
        let value = Decimal::from_str(raw).unwrap();
        assert!(storage.set_decimal(value, "Decimal"), "failed to set Decimal");
        assert_eq!(storage.decimal_value("Decimal"), Some(value));
    }
}

fn assert_double_integrity(storage: &dyn TypedStorage) {
    assert!(storage.set_double(5.55, "Double"));
    assert_eq!(storage.double_value("Double"), Some(5.55));
}

// A store either keeps a non-finite double intact or refuses it, leaving
// nothing behind.
fn assert_non_finite_double(storage: &dyn TypedStorage) {
    for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        let count = storage.count();
        if storage.set_double(value, "NonFinite") {
            let read = storage.double_value("NonFinite").expect("stored value must read back");
            assert!(read == value || (read.is_nan() && value.is_nan()), "{value} read as {read}");
            assert!(storage.remove_value("NonFinite"));
        } else {
            assert!(!storage.has_value("NonFinite"), "rejected {value} left a value");
            assert_eq!(storage.count(), count, "rejected {value} changed count");
        }
    }
}

fn assert_float_integrity(storage: &dyn TypedStorage) {
    assert!(storage.set_float(5.55, "Float"));
    assert_eq!(storage.float_value("Float"), Some(5.55f32));
}

fn assert_number_integrity(storage: &dyn TypedStorage) {
    assert!(storage.set_number(Number::Integer(42), "Number"));
    assert_eq!(storage.number_value("Number"), Some(Number::Integer(42)));
}

fn assert_data_integrity(storage: &dyn TypedStorage) {
    let value = [0x11u8, 0x22, 0x33, 0x44];
    assert!(storage.set_data(&value, "Data"));
    assert_eq!(storage.data_value("Data").as_deref(), Some(&value[..]));
}

fn assert_string_integrity(storage: &dyn TypedStorage) {
    let long = "a".repeat(1000);
    for (key, value) in [("shortText", "My text"), ("longText", long.as_str()), ("emptyText", "")] {
        assert!(storage.set_string(value, key), "failed to set {key}");
        assert_eq!(storage.string_value(key).as_deref(), Some(value));
    }
}

fn assert_update(storage: &dyn TypedStorage) {
    assert!(storage.set_bool(true, "Value"));
    assert!(storage.set_bool(false, "Value"));
    assert_eq!(storage.bool_value("Value"), Some(false));
}

fn assert_has_value(storage: &dyn TypedStorage) {
    assert!(!storage.has_value("Value"), "value must not exist before it is set");
    assert!(storage.set_bool(true, "Value"));
    assert!(storage.has_value("Value"), "value must exist after it is set");
    assert!(!storage.has_value("UnrelatedValue"));
    assert!(storage.remove_value("Value"));
    assert!(!storage.has_value("Value"), "value must not exist after removal");
}

fn assert_count(storage: &dyn TypedStorage) {
    let keys = ["First", "Second", "Third"];
    for key in keys {
        assert!(storage.set_bool(true, key));
    }
    assert_eq!(storage.count(), keys.len());

    assert!(storage.set_bool(false, keys[0]));
    assert_eq!(storage.count(), keys.len(), "updates must not change count");

    assert!(storage.remove_value(keys[0]));
    assert_eq!(storage.count(), keys.len() - 1);

    assert!(storage.remove_all());
    assert_eq!(storage.count(), 0);
}

fn assert_remove_all(storage: &dyn TypedStorage) {
    let keys = ["First", "Second", "Third"];
    for key in keys {
        assert!(storage.set_bool(true, key));
    }
    assert!(storage.remove_all());
    assert!(keys.iter().all(|key| !storage.has_value(key)));
}

fn assert_remove_keeps_unrelated(storage: &dyn TypedStorage) {
    assert!(storage.set_bool(true, "Value"));
    assert!(storage.set_int(5, "IntValue"));
    assert!(storage.remove_value("Value"));
    assert!(!storage.has_value("Value"));
    assert_eq!(storage.int_value("IntValue"), Some(5));
}

fn assert_remove_missing(storage: &dyn TypedStorage) {
    assert!(storage.remove_value("NeverSet"));
}

fn assert_pop(storage: &dyn TypedStorage) {
    assert!(storage.set_string("token", "Pop"));
    assert_eq!(storage.pop_string_value("Pop").as_deref(), Some("token"));
    assert!(!storage.has_value("Pop"));
    assert_eq!(storage.pop_int_value("Pop"), None);
}

macro_rules! typed_storage_tests {
    ($name:ident, $make:expr) => {
        mod $name {
            use super::*;

            #[test]
            fn bool_integrity() {
                let (_guard, storage) = $make;
                assert_bool_integrity(&storage);
            }

            #[test]
            fn int_integrity() {
                let (_guard, storage) = $make;
                assert_int_integrity(&storage);
            }

            #[test]
            fn decimal_integrity() {
                let (_guard, storage) = $make;
                assert_decimal_integrity(&storage);
            }

            #[test]
            fn double_integrity() {
                let (_guard, storage) = $make;
                assert_double_integrity(&storage);
            }

            #[test]
            fn non_finite_double() {
                let (_guard, storage) = $make;
                assert_non_finite_double(&storage);
            }

            #[test]
            fn float_integrity() {
                let (_guard, storage) = $make;
                assert_float_integrity(&storage);
            }

            #[test]
            fn number_integrity() {
                let (_guard, storage) = $make;
                assert_number_integrity(&storage);
            }

            #[test]
            fn data_integrity() {
                let (_guard, storage) = $make;
                assert_data_integrity(&storage);
            }

            #[test]
            fn string_integrity() {
                let (_guard, storage) = $make;
                assert_string_integrity(&storage);
            }

            #[test]
            fn update() {
                let (_guard, storage) = $make;
                assert_update(&storage);
            }

            #[test]
            fn has_value() {
                let (_guard, storage) = $make;
                assert_has_value(&storage);
            }

            #[test]
            fn count() {
                let (_guard, storage) = $make;
                assert_count(&storage);
            }

            #[test]
            fn remove_all() {
                let (_guard, storage) = $make;
                assert_remove_all(&storage);
            }

            #[test]
            fn remove_keeps_unrelated() {
                let (_guard, storage) = $make;
                assert_remove_keeps_unrelated(&storage);
            }

            #[test]
            fn remove_missing() {
                let (_guard, storage) = $make;
                assert_remove_missing(&storage);
            }

            #[test]
            fn pop() {
                let (_guard, storage) = $make;
                assert_pop(&storage);
            }
        }
    };
}

fn temp_dir() -> TempDir {
    TempDir::new().expect("unable to create temporary working directory")
}

typed_storage_tests!(memory, ((), MemoryStorage::new()));

typed_storage_tests!(preferences, {
    let dir = temp_dir();
    let storage = PreferencesStorage::open(dir.path()).unwrap();
    (dir, storage)
});

typed_storage_tests!(ubiquitous, {
    let storage = UbiquitousStorage::new(Arc::new(InMemoryUbiquitousStore::default()));
    ((), storage)
});

typed_storage_tests!(keychain, {
    let storage = KeychainStorage::new(Arc::new(MemoryVault::new())).with_identifier("com.example.typed");
    ((), storage)
});

typed_storage_tests!(plist, {
    let dir = temp_dir();
    let storage =
        PlistStorage::with_window(dir.path().join("PlistStorage.plist"), Duration::from_millis(50))
            .unwrap();
    (dir, storage)
});
