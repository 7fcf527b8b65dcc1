use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::{Number, Value};

/// Read access shared by every store.
pub trait ReadableStorage {
    /// Returns the number of stored entries.
    fn count(&self) -> usize;

    /// Returns `true` if a read of `key` would return a value.
    fn has_value(&self, key: &str) -> bool;
}

/// Typed read access.
///
/// Every getter returns `None` both for a missing key and for a value that
/// cannot be coerced to the requested kind.
pub trait ReadableTypedStorage: ReadableStorage {
    /// Gets the text stored under `key`.
    fn string_value(&self, key: &str) -> Option<String>;

    /// Gets the integer stored under `key`.
    fn int_value(&self, key: &str) -> Option<i64>;

    /// Gets the double stored under `key`.
    fn double_value(&self, key: &str) -> Option<f64>;

    /// Gets the single-precision float stored under `key`.
    fn float_value(&self, key: &str) -> Option<f32>;

    /// Gets the decimal stored under `key`.
    fn decimal_value(&self, key: &str) -> Option<Decimal>;

    /// Gets the boolean stored under `key`.
    fn bool_value(&self, key: &str) -> Option<bool>;

    /// Gets the number of any kind stored under `key`.
    fn number_value(&self, key: &str) -> Option<Number>;

    /// Gets the byte blob stored under `key`.
    fn data_value(&self, key: &str) -> Option<Vec<u8>>;
}

/// Untyped read access.
///
/// Typed reads come for free: every dynamic store is also a
/// [`ReadableTypedStorage`] coercing the result of [`value`](Self::value).
pub trait ReadableDynamicStorage: ReadableStorage {
    /// Gets the value stored under `key`.
    fn value(&self, key: &str) -> Option<Value>;

    /// Returns the whole store as a key-value mapping.
    fn dictionary(&self) -> HashMap<String, Value>;
}

impl<T: ReadableDynamicStorage + ?Sized> ReadableTypedStorage for T {
    fn string_value(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn int_value(&self, key: &str) -> Option<i64> {
        self.value(key)?.as_i64()
    }

    fn double_value(&self, key: &str) -> Option<f64> {
        self.value(key)?.as_f64()
    }

    fn float_value(&self, key: &str) -> Option<f32> {
        self.value(key)?.as_f32()
    }

    fn decimal_value(&self, key: &str) -> Option<Decimal> {
        self.value(key)?.as_decimal()
    }

    fn bool_value(&self, key: &str) -> Option<bool> {
        self.value(key)?.as_bool()
    }

    fn number_value(&self, key: &str) -> Option<Number> {
        self.value(key)?.as_number()
    }

    fn data_value(&self, key: &str) -> Option<Vec<u8>> {
        match self.value(key)? {
            Value::Data(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Removal access shared by every writable store.
///
/// The boolean results mean "completed without a backend error", not
/// "something was removed".
pub trait Storage: ReadableStorage {
    /// Removes the entry for `key`, if any.
    fn remove_value(&self, key: &str) -> bool;

    /// Removes every entry.
    fn remove_all(&self) -> bool;
}

/// Typed write access.
///
/// Setters overwrite any previous value and return `false` only if the
/// backend rejected the value.
pub trait TypedStorage: Storage + ReadableTypedStorage {
    /// Stores text under `key`.
    fn set_string(&self, value: &str, key: &str) -> bool;

    /// Stores an integer under `key`.
    fn set_int(&self, value: i64, key: &str) -> bool;

    /// Stores a double under `key`.
    fn set_double(&self, value: f64, key: &str) -> bool;

    /// Stores a single-precision float under `key`.
    fn set_float(&self, value: f32, key: &str) -> bool;

    /// Stores a decimal under `key`.
    fn set_decimal(&self, value: Decimal, key: &str) -> bool;

    /// Stores a boolean under `key`.
    fn set_bool(&self, value: bool, key: &str) -> bool;

    /// Stores a number of any kind under `key`.
    fn set_number(&self, value: Number, key: &str) -> bool;

    /// Stores a byte blob under `key`.
    fn set_data(&self, value: &[u8], key: &str) -> bool;

    /// Reads the text under `key` and removes the entry.
    fn pop_string_value(&self, key: &str) -> Option<String> {
        let value = self.string_value(key);
        self.remove_value(key);
        value
    }

    /// Reads the integer under `key` and removes the entry.
    fn pop_int_value(&self, key: &str) -> Option<i64> {
        let value = self.int_value(key);
        self.remove_value(key);
        value
    }

    /// Reads the double under `key` and removes the entry.
    fn pop_double_value(&self, key: &str) -> Option<f64> {
        let value = self.double_value(key);
        self.remove_value(key);
        value
    }

    /// Reads the float under `key` and removes the entry.
    fn pop_float_value(&self, key: &str) -> Option<f32> {
        let value = self.float_value(key);
        self.remove_value(key);
        value
    }

    /// Reads the decimal under `key` and removes the entry.
    fn pop_decimal_value(&self, key: &str) -> Option<Decimal> {
        let value = self.decimal_value(key);
        self.remove_value(key);
        value
    }

    /// Reads the boolean under `key` and removes the entry.
    fn pop_bool_value(&self, key: &str) -> Option<bool> {
        let value = self.bool_value(key);
        self.remove_value(key);
        value
    }

    /// Reads the number under `key` and removes the entry.
    fn pop_number_value(&self, key: &str) -> Option<Number> {
        let value = self.number_value(key);
        self.remove_value(key);
        value
    }

    /// Reads the blob under `key` and removes the entry.
    fn pop_data_value(&self, key: &str) -> Option<Vec<u8>> {
        let value = self.data_value(key);
        self.remove_value(key);
        value
    }
}

/// Untyped write access.
///
/// Every dynamic store is also a [`TypedStorage`] whose setters forward to
/// [`set`](Self::set).
pub trait DynamicStorage: Storage + ReadableDynamicStorage {
    /// Stores `value` under `key`, overwriting any previous value.
    fn set(&self, value: Value, key: &str) -> bool;

    /// Stores every pair of `values`, one `set` at a time.
    ///
    /// The batch is not atomic: a failing pair does not undo earlier ones.
    fn set_values(&self, values: HashMap<String, Value>) {
        for (key, value) in values {
            self.set(value, &key);
        }
    }

    /// Reads the value under `key` and removes the entry.
    fn pop_value(&self, key: &str) -> Option<Value> {
        let value = self.value(key);
        self.remove_value(key);
        value
    }

    /// Stores `value` under `key`, or removes the entry when `value` is `None`.
    fn update(&self, key: &str, value: Option<Value>) -> bool {
        match value {
            Some(value) => self.set(value, key),
            None => self.remove_value(key),
        }
    }
}

impl<T: DynamicStorage + ?Sized> TypedStorage for T {
    fn set_string(&self, value: &str, key: &str) -> bool {
        self.set(Value::from(value), key)
    }

    fn set_int(&self, value: i64, key: &str) -> bool {
        self.set(Value::Integer(value), key)
    }

    fn set_double(&self, value: f64, key: &str) -> bool {
        self.set(Value::Double(value), key)
    }

    fn set_float(&self, value: f32, key: &str) -> bool {
        self.set(Value::from(value), key)
    }

    fn set_decimal(&self, value: Decimal, key: &str) -> bool {
        self.set(Value::Decimal(value), key)
    }

    fn set_bool(&self, value: bool, key: &str) -> bool {
        self.set(Value::Boolean(value), key)
    }

    fn set_number(&self, value: Number, key: &str) -> bool {
        self.set(Value::from(value), key)
    }

    fn set_data(&self, value: &[u8], key: &str) -> bool {
        self.set(Value::Data(value.to_vec()), key)
    }
}

mod keychain;
mod memory;
mod merged;
mod plist;
mod preferences;
mod ubiquitous;

pub use self::keychain::{
    AccessLevel, AccessPolicy, DeviceState, ItemQuery, KeychainStorage, MemoryVault,
    SecureItemStore, VaultError, VaultItem,
};
#[cfg(feature = "keychain")]
pub use self::keychain::KeyringVault;
pub use self::memory::MemoryStorage;
pub use self::merged::MergedStorage;
pub use self::plist::{PlistFormat, PlistStorage, ReadOnlyPlistStorage, DEFAULT_DEBOUNCE_WINDOW};
pub use self::preferences::PreferencesStorage;
pub use self::ubiquitous::{InMemoryUbiquitousStore, UbiquitousKeyValueStore, UbiquitousStorage};
