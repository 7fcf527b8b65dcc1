use std::env;
use std::sync::Arc;

use log::{debug, warn};
use rust_decimal::Decimal;

use super::{ReadableStorage, ReadableTypedStorage, Storage, TypedStorage};
use crate::Number;

#[cfg(feature = "keychain")]
mod os;
mod vault;

#[cfg(feature = "keychain")]
pub use self::os::KeyringVault;
pub use self::vault::{
    AccessLevel, AccessPolicy, DeviceState, ItemQuery, MemoryVault, SecureItemStore, VaultError,
    VaultItem,
};

/// Secure storage backed by a [`SecureItemStore`].
///
/// Every value is written as an opaque blob: text as UTF-8, numbers of any
/// kind as a JSON-encoded [`Number`]. Reads decode symmetrically, and a blob
/// that does not decode reads as `None`.
pub struct KeychainStorage {
    identifier: String,
    access_group: Option<String>,
    policy: AccessPolicy,
    vault: Arc<dyn SecureItemStore>,
}

impl KeychainStorage {
    /// Creates a storage over `vault` in the namespace of the running
    /// executable.
    pub fn new(vault: Arc<dyn SecureItemStore>) -> Self {
        Self {
            identifier: default_identifier(),
            access_group: None,
            policy: AccessPolicy::default(),
            vault,
        }
    }

    /// Uses `identifier` as the namespace of every item.
    ///
    /// The identifier must stay the same across the whole application for
    /// previously stored items to remain reachable.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Scopes items to a group shared by cooperating applications.
    pub fn with_access_group(mut self, access_group: impl Into<String>) -> Self {
        self.access_group = Some(access_group.into());
        self
    }

    /// Applies `policy` to every item this storage writes.
    pub fn with_access_policy(mut self, policy: AccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Namespace of the stored items.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Sharing group of the stored items, if any.
    pub fn access_group(&self) -> Option<&str> {
        self.access_group.as_deref()
    }

    /// Accessibility applied to written items.
    pub fn access_policy(&self) -> AccessPolicy {
        self.policy
    }

    fn namespace_query(&self) -> ItemQuery {
        ItemQuery::namespace(&self.identifier, self.access_group.as_deref(), self.policy)
    }

    fn key_query(&self, key: &str) -> ItemQuery {
        self.namespace_query().for_key(key)
    }

    fn add(&self, data: &[u8], key: &str) -> bool {
        let query = self.key_query(key);
        match self.vault.add(&query, data) {
            Ok(()) => true,
            Err(VaultError::DuplicateItem) => match self.vault.update(&query, data) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to update secure item {}: {}", key, e);
                    false
                }
            },
            Err(e) => {
                warn!("Failed to add secure item {}: {}", key, e);
                false
            }
        }
    }

    fn add_number(&self, number: Number, key: &str) -> bool {
        if !number.is_finite() {
            warn!("Rejected secure number {}: non-finite double", key);
            return false;
        }
        match serde_json::to_vec(&number) {
            Ok(data) => self.add(&data, key),
            Err(e) => {
                warn!("Failed to encode secure number {}: {}", key, e);
                false
            }
        }
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.vault.copy_matching(&self.key_query(key)) {
            Ok(data) => Some(data),
            Err(VaultError::ItemNotFound) => None,
            Err(e) => {
                debug!("Secure item {} is unavailable: {}", key, e);
                None
            }
        }
    }
}

fn default_identifier() -> String {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "KeychainStorage".to_owned())
}

impl ReadableStorage for KeychainStorage {
    fn count(&self) -> usize {
        match self.vault.copy_all(&self.namespace_query().returning_all()) {
            Ok(items) => items
                .iter()
                .filter(|item| item.account.is_some() && item.data.is_some())
                .count(),
            Err(VaultError::ItemNotFound) => 0,
            Err(e) => {
                warn!("Failed to enumerate secure items: {}", e);
                0
            }
        }
    }

    fn has_value(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl ReadableTypedStorage for KeychainStorage {
    fn string_value(&self, key: &str) -> Option<String> {
        String::from_utf8(self.get(key)?).ok()
    }

    fn int_value(&self, key: &str) -> Option<i64> {
        self.number_value(key)?.as_i64()
    }

    fn double_value(&self, key: &str) -> Option<f64> {
        self.number_value(key)?.as_f64()
    }

    fn float_value(&self, key: &str) -> Option<f32> {
        self.number_value(key)?.as_f32()
    }

    fn decimal_value(&self, key: &str) -> Option<Decimal> {
        self.number_value(key)?.as_decimal()
    }

    fn bool_value(&self, key: &str) -> Option<bool> {
        Some(self.number_value(key)?.as_bool())
    }

    fn number_value(&self, key: &str) -> Option<Number> {
        serde_json::from_slice(&self.get(key)?).ok()
    }

    fn data_value(&self, key: &str) -> Option<Vec<u8>> {
        self.get(key)
    }
}

impl Storage for KeychainStorage {
    fn remove_value(&self, key: &str) -> bool {
        match self.vault.delete(&self.key_query(key)) {
            Ok(()) | Err(VaultError::ItemNotFound) => true,
            Err(e) => {
                warn!("Failed to delete secure item {}: {}", key, e);
                false
            }
        }
    }

    fn remove_all(&self) -> bool {
        match self.vault.delete(&self.namespace_query()) {
            Ok(()) | Err(VaultError::ItemNotFound) => true,
            Err(e) => {
                warn!("Failed to delete secure items of {}: {}", self.identifier, e);
                false
            }
        }
    }
}

impl TypedStorage for KeychainStorage {
    fn set_string(&self, value: &str, key: &str) -> bool {
        self.add(value.as_bytes(), key)
    }

    fn set_int(&self, value: i64, key: &str) -> bool {
        self.add_number(Number::Integer(value), key)
    }

    fn set_double(&self, value: f64, key: &str) -> bool {
        self.add_number(Number::Double(value), key)
    }

    fn set_float(&self, value: f32, key: &str) -> bool {
        self.add_number(Number::Double(f64::from(value)), key)
    }

    fn set_decimal(&self, value: Decimal, key: &str) -> bool {
        self.add_number(Number::Decimal(value), key)
    }

    fn set_bool(&self, value: bool, key: &str) -> bool {
        self.add_number(Number::Boolean(value), key)
    }

    fn set_number(&self, value: Number, key: &str) -> bool {
        self.add_number(value, key)
    }

    fn set_data(&self, value: &[u8], key: &str) -> bool {
        self.add(value, key)
    }
}
