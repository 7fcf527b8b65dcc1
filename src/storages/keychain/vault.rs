use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

/// When the vault lets an item be read, relative to the device lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Readable regardless of lock state.
    Always,
    /// Readable once the device was unlocked after the last restart.
    AfterFirstUnlock,
    /// Readable only while the device is unlocked.
    WhenUnlocked,
    /// Readable only while unlocked, and only on devices with a passcode.
    WhenPasscodeSet,
}

/// Accessibility of the items a store writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AccessPolicy {
    /// Lock state required to read the item.
    pub level: AccessLevel,
    /// When set, the item never migrates to another device via backups.
    pub this_device_only: bool,
}

impl AccessPolicy {
    /// Policy at `level` that may migrate through encrypted backups.
    pub fn new(level: AccessLevel) -> Self {
        Self {
            level,
            this_device_only: false,
        }
    }

    /// Same policy, pinned to this device.
    pub fn this_device_only(self) -> Self {
        Self {
            this_device_only: true,
            ..self
        }
    }

    /// Returns `true` if items under this policy can be read in `state`.
    pub fn allows(&self, state: DeviceState) -> bool {
        match self.level {
            AccessLevel::Always => true,
            AccessLevel::AfterFirstUnlock => state.unlocked_since_boot,
            AccessLevel::WhenUnlocked => state.unlocked,
            AccessLevel::WhenPasscodeSet => state.unlocked && state.passcode_set,
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(AccessLevel::WhenUnlocked)
    }
}

/// Lock state of the device the vault runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceState {
    /// The device was unlocked at least once since it started.
    pub unlocked_since_boot: bool,
    /// The device is currently unlocked.
    pub unlocked: bool,
    /// The device has a passcode configured.
    pub passcode_set: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            unlocked_since_boot: true,
            unlocked: true,
            passcode_set: true,
        }
    }
}

/// A request against the vault.
///
/// Omitting `account` widens the query to the whole namespace formed by
/// `service` and `access_group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    /// Namespace identifier.
    pub service: String,
    /// Group shared by cooperating applications.
    pub access_group: Option<String>,
    /// Per-entry account discriminator.
    pub account: Option<String>,
    /// Per-entry generic discriminator.
    pub generic: Option<Vec<u8>>,
    /// Accessibility applied to inserted items.
    pub policy: AccessPolicy,
    /// Enumeration should report item attributes (the account).
    pub return_attributes: bool,
    /// Enumeration should report item data.
    pub return_data: bool,
}

impl ItemQuery {
    /// Query for the whole namespace.
    pub fn namespace(service: &str, access_group: Option<&str>, policy: AccessPolicy) -> Self {
        Self {
            service: service.to_owned(),
            access_group: access_group.map(str::to_owned),
            account: None,
            generic: None,
            policy,
            return_attributes: false,
            return_data: false,
        }
    }

    /// Narrows the query to the item stored for `key`.
    pub fn for_key(mut self, key: &str) -> Self {
        self.generic = Some(key.as_bytes().to_vec());
        self.account = Some(key.to_owned());
        self
    }

    /// Requests both attributes and data of every matched item.
    pub fn returning_all(mut self) -> Self {
        self.return_attributes = true;
        self.return_data = true;
        self
    }

    fn matches(&self, id: &ItemId, item: &StoredItem) -> bool {
        id.service == self.service
            && self
                .access_group
                .as_ref()
                .map_or(true, |group| id.access_group.as_ref() == Some(group))
            && self
                .account
                .as_ref()
                .map_or(true, |account| &id.account == account)
            && self
                .generic
                .as_ref()
                .map_or(true, |generic| &item.generic == generic)
    }
}

/// An item returned by an enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultItem {
    /// Account attribute, if attributes were requested.
    pub account: Option<String>,
    /// Item data, if data was requested.
    pub data: Option<Vec<u8>>,
}

/// Status reported by the vault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// An item with the same identity already exists.
    #[error("Item already exists")]
    DuplicateItem,

    /// No item matched the query.
    #[error("Item not found")]
    ItemNotFound,

    /// The item exists but its access policy forbids reading it now.
    #[error("Interaction not allowed in the current device state")]
    InteractionNotAllowed,

    /// Any other failure of the underlying store.
    #[error("Vault error: {0}")]
    Backend(String),
}

/// An OS-style secure item store.
pub trait SecureItemStore: Send + Sync {
    /// Inserts a new item. Fails with `DuplicateItem` if it already exists.
    fn add(&self, query: &ItemQuery, data: &[u8]) -> Result<(), VaultError>;

    /// Replaces the data of an existing item.
    fn update(&self, query: &ItemQuery, data: &[u8]) -> Result<(), VaultError>;

    /// Returns the data of the single item matched by `query`.
    fn copy_matching(&self, query: &ItemQuery) -> Result<Vec<u8>, VaultError>;

    /// Returns every item matched by `query`, filled according to its
    /// `return_attributes` and `return_data` flags.
    fn copy_all(&self, query: &ItemQuery) -> Result<Vec<VaultItem>, VaultError>;

    /// Deletes every item matched by `query`.
    fn delete(&self, query: &ItemQuery) -> Result<(), VaultError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ItemId {
    service: String,
    access_group: Option<String>,
    account: String,
}

#[derive(Debug, Clone)]
struct StoredItem {
    generic: Vec<u8>,
    data: Vec<u8>,
    policy: AccessPolicy,
}

/// A process-local vault that enforces access policies against a simulated
/// device lock state.
#[derive(Debug, Default)]
pub struct MemoryVault {
    items: Mutex<HashMap<ItemId, StoredItem>>,
    state: RwLock<DeviceState>,
}

impl MemoryVault {
    /// Creates an empty vault on an unlocked device with a passcode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the simulated device lock state.
    pub fn set_device_state(&self, state: DeviceState) {
        *self.state.write() = state;
    }

    /// Returns the simulated device lock state.
    pub fn device_state(&self) -> DeviceState {
        *self.state.read()
    }

    fn item_id(query: &ItemQuery) -> Result<ItemId, VaultError> {
        let account = query
            .account
            .clone()
            .ok_or_else(|| VaultError::Backend("query does not name an account".to_owned()))?;
        Ok(ItemId {
            service: query.service.clone(),
            access_group: query.access_group.clone(),
            account,
        })
    }
}

impl SecureItemStore for MemoryVault {
    fn add(&self, query: &ItemQuery, data: &[u8]) -> Result<(), VaultError> {
        let id = Self::item_id(query)?;
        if query.policy.level == AccessLevel::WhenPasscodeSet && !self.device_state().passcode_set {
            return Err(VaultError::Backend("device has no passcode".to_owned()));
        }
        let mut items = self.items.lock();
        // An ungrouped query names the item in every group.
        let duplicate = match &id.access_group {
            Some(_) => items.contains_key(&id),
            None => items
                .keys()
                .any(|known| known.service == id.service && known.account == id.account),
        };
        if duplicate {
            return Err(VaultError::DuplicateItem);
        }
        items.insert(
            id,
            StoredItem {
                generic: query.generic.clone().unwrap_or_default(),
                data: data.to_vec(),
                policy: query.policy,
            },
        );
        Ok(())
    }

    fn update(&self, query: &ItemQuery, data: &[u8]) -> Result<(), VaultError> {
        let state = self.device_state();
        let mut items = self.items.lock();
        let mut found = false;
        for (id, item) in items.iter_mut() {
            if query.matches(id, item) {
                if !item.policy.allows(state) {
                    return Err(VaultError::InteractionNotAllowed);
                }
                item.data = data.to_vec();
                found = true;
            }
        }
        if found {
            Ok(())
        } else {
            Err(VaultError::ItemNotFound)
        }
    }

    fn copy_matching(&self, query: &ItemQuery) -> Result<Vec<u8>, VaultError> {
        let state = self.device_state();
        let items = self.items.lock();
        let item = items
            .iter()
            .find(|(id, item)| query.matches(id, item))
            .map(|(_, item)| item)
            .ok_or(VaultError::ItemNotFound)?;
        if !item.policy.allows(state) {
            return Err(VaultError::InteractionNotAllowed);
        }
        Ok(item.data.clone())
    }

    fn copy_all(&self, query: &ItemQuery) -> Result<Vec<VaultItem>, VaultError> {
        let state = self.device_state();
        let items = self.items.lock();
        let found: Vec<VaultItem> = items
            .iter()
            .filter(|(id, item)| query.matches(id, item) && item.policy.allows(state))
            .map(|(id, item)| VaultItem {
                account: query.return_attributes.then(|| id.account.clone()),
                data: query.return_data.then(|| item.data.clone()),
            })
            .collect();
        if found.is_empty() {
            Err(VaultError::ItemNotFound)
        } else {
            Ok(found)
        }
    }

    fn delete(&self, query: &ItemQuery) -> Result<(), VaultError> {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|id, item| !query.matches(id, item));
        if items.len() == before {
            Err(VaultError::ItemNotFound)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(key: &str) -> ItemQuery {
        ItemQuery::namespace("app", None, AccessPolicy::default()).for_key(key)
    }

    #[test]
    fn add_twice_is_duplicate() {
        let vault = MemoryVault::new();
        vault.add(&query("k"), b"1").unwrap();
        assert_eq!(vault.add(&query("k"), b"2"), Err(VaultError::DuplicateItem));
        vault.update(&query("k"), b"2").unwrap();
        assert_eq!(vault.copy_matching(&query("k")).unwrap(), b"2");
    }

    #[test]
    fn ungrouped_add_sees_grouped_item() {
        let vault = MemoryVault::new();
        let grouped = ItemQuery::namespace("app", Some("group"), AccessPolicy::default()).for_key("k");
        vault.add(&grouped, b"1").unwrap();
        assert_eq!(vault.add(&query("k"), b"2"), Err(VaultError::DuplicateItem));

        vault.update(&query("k"), b"2").unwrap();
        assert_eq!(vault.copy_matching(&grouped).unwrap(), b"2");
        let all = ItemQuery::namespace("app", None, AccessPolicy::default()).returning_all();
        assert_eq!(vault.copy_all(&all).unwrap().len(), 1);
    }

    #[test]
    fn locked_device_hides_when_unlocked_items() {
        let vault = MemoryVault::new();
        vault.add(&query("k"), b"secret").unwrap();
        vault.set_device_state(DeviceState {
            unlocked: false,
            ..DeviceState::default()
        });
        assert_eq!(
            vault.copy_matching(&query("k")),
            Err(VaultError::InteractionNotAllowed)
        );
    }

    #[test]
    fn after_first_unlock_survives_relock() {
        let vault = MemoryVault::new();
        let policy = AccessPolicy::new(AccessLevel::AfterFirstUnlock).this_device_only();
        let query = ItemQuery::namespace("app", None, policy).for_key("k");
        vault.add(&query, b"v").unwrap();
        vault.set_device_state(DeviceState {
            unlocked: false,
            ..DeviceState::default()
        });
        assert_eq!(vault.copy_matching(&query).unwrap(), b"v");
        vault.set_device_state(DeviceState {
            unlocked_since_boot: false,
            unlocked: false,
            passcode_set: true,
        });
        assert_eq!(
            vault.copy_matching(&query),
            Err(VaultError::InteractionNotAllowed)
        );
    }

    #[test]
    fn passcode_policy_requires_passcode() {
        let vault = MemoryVault::new();
        vault.set_device_state(DeviceState {
            passcode_set: false,
            ..DeviceState::default()
        });
        let query = ItemQuery::namespace("app", None, AccessPolicy::new(AccessLevel::WhenPasscodeSet))
            .for_key("k");
        assert!(matches!(vault.add(&query, b"v"), Err(VaultError::Backend(_))));
    }

    #[test]
    fn namespaces_are_isolated() {
        let vault = MemoryVault::new();
        vault.add(&query("k"), b"a").unwrap();
        let other = ItemQuery::namespace("other", None, AccessPolicy::default()).for_key("k");
        assert_eq!(vault.copy_matching(&other), Err(VaultError::ItemNotFound));

        let all = ItemQuery::namespace("app", None, AccessPolicy::default()).returning_all();
        let items = vault.copy_all(&all).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].account.as_deref(), Some("k"));
        assert_eq!(items[0].data.as_deref(), Some(&b"a"[..]));
    }
}
