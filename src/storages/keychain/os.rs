use std::collections::HashMap;
use std::sync::Arc;

use keyring::Entry;
use log::debug;
use parking_lot::Mutex;

use super::vault::{ItemQuery, SecureItemStore, VaultError, VaultItem};

/// Appended to a namespace's service to form the service of its index.
const INDEX_SERVICE_SUFFIX: &str = ".kvkit-index";
const INDEX_ACCOUNT: &str = "accounts";

#[derive(Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    target: Option<String>,
    service: String,
    account: String,
}

/// [`SecureItemStore`] over the OS credential store, through `keyring`.
///
/// The OS stores reachable this way cannot list their items, so every
/// namespace keeps an index entry naming its accounts, under a service of
/// its own so no key can overwrite it. Access policies are left to the OS
/// defaults.
///
/// One `keyring::Entry` is created per credential and reused afterwards,
/// which also lets process-local credential builders see earlier writes.
#[derive(Default)]
pub struct KeyringVault {
    entries: Mutex<HashMap<EntryKey, Arc<Entry>>>,
    // Serializes index read-modify-write cycles.
    index_lock: Mutex<()>,
}

impl KeyringVault {
    /// Creates a vault over the platform's default credential store.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, target: Option<&str>, service: &str, account: &str) -> Result<Arc<Entry>, VaultError> {
        let key = EntryKey {
            target: target.map(str::to_owned),
            service: service.to_owned(),
            account: account.to_owned(),
        };
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&key) {
            return Ok(Arc::clone(entry));
        }
        let entry = match target {
            Some(target) => Entry::new_with_target(target, service, account),
            None => Entry::new(service, account),
        }
        .map_err(backend)?;
        let entry = Arc::new(entry);
        entries.insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    fn item_entry(&self, query: &ItemQuery, account: &str) -> Result<Arc<Entry>, VaultError> {
        self.entry(query.access_group.as_deref(), &query.service, account)
    }

    fn index_entry(&self, query: &ItemQuery) -> Result<Arc<Entry>, VaultError> {
        let service = format!("{}{}", query.service, INDEX_SERVICE_SUFFIX);
        self.entry(query.access_group.as_deref(), &service, INDEX_ACCOUNT)
    }

    fn account(query: &ItemQuery) -> Result<&str, VaultError> {
        query
            .account
            .as_deref()
            .ok_or_else(|| VaultError::Backend("query does not name an account".to_owned()))
    }

    fn read_index(&self, query: &ItemQuery) -> Result<Vec<String>, VaultError> {
        match self.index_entry(query)?.get_secret() {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| VaultError::Backend(e.to_string())),
            Err(keyring::Error::NoEntry) => Ok(Vec::new()),
            Err(e) => Err(backend(e)),
        }
    }

    fn write_index(&self, query: &ItemQuery, accounts: &[String]) -> Result<(), VaultError> {
        let entry = self.index_entry(query)?;
        if accounts.is_empty() {
            return match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(backend(e)),
            };
        }
        let bytes = serde_json::to_vec(accounts).map_err(|e| VaultError::Backend(e.to_string()))?;
        entry.set_secret(&bytes).map_err(backend)
    }
}

fn backend(e: keyring::Error) -> VaultError {
    match e {
        keyring::Error::NoEntry => VaultError::ItemNotFound,
        e => VaultError::Backend(e.to_string()),
    }
}

impl SecureItemStore for KeyringVault {
    fn add(&self, query: &ItemQuery, data: &[u8]) -> Result<(), VaultError> {
        let account = Self::account(query)?;
        let _guard = self.index_lock.lock();
        let entry = self.item_entry(query, account)?;
        match entry.get_secret() {
            Ok(_) => return Err(VaultError::DuplicateItem),
            Err(keyring::Error::NoEntry) => {}
            Err(e) => return Err(backend(e)),
        }
        entry.set_secret(data).map_err(backend)?;

        let mut accounts = self.read_index(query)?;
        if !accounts.iter().any(|known| known == account) {
            accounts.push(account.to_owned());
            self.write_index(query, &accounts)?;
        }
        Ok(())
    }

    fn update(&self, query: &ItemQuery, data: &[u8]) -> Result<(), VaultError> {
        let entry = self.item_entry(query, Self::account(query)?)?;
        entry.get_secret().map_err(backend)?;
        entry.set_secret(data).map_err(backend)
    }

    fn copy_matching(&self, query: &ItemQuery) -> Result<Vec<u8>, VaultError> {
        self.item_entry(query, Self::account(query)?)?
            .get_secret()
            .map_err(backend)
    }

    fn copy_all(&self, query: &ItemQuery) -> Result<Vec<VaultItem>, VaultError> {
        let accounts = self.read_index(query)?;
        let mut items = Vec::with_capacity(accounts.len());
        for account in accounts {
            let data = match self.item_entry(query, &account)?.get_secret() {
                Ok(data) => data,
                Err(keyring::Error::NoEntry) => {
                    debug!("Indexed secure item {} is gone", account);
                    continue;
                }
                Err(e) => return Err(backend(e)),
            };
            items.push(VaultItem {
                account: query.return_attributes.then_some(account),
                data: query.return_data.then_some(data),
            });
        }
        if items.is_empty() {
            Err(VaultError::ItemNotFound)
        } else {
            Ok(items)
        }
    }

    fn delete(&self, query: &ItemQuery) -> Result<(), VaultError> {
        let _guard = self.index_lock.lock();
        let mut accounts = self.read_index(query)?;
        let targets: Vec<String> = match &query.account {
            Some(account) => vec![account.clone()],
            None => accounts.clone(),
        };
        if targets.is_empty() {
            return Err(VaultError::ItemNotFound);
        }

        let mut deleted = false;
        for account in &targets {
            match self.item_entry(query, account)?.delete_credential() {
                Ok(()) => deleted = true,
                Err(keyring::Error::NoEntry) => {}
                Err(e) => return Err(backend(e)),
            }
        }
        accounts.retain(|known| !targets.contains(known));
        self.write_index(query, &accounts)?;

        if deleted {
            Ok(())
        } else {
            Err(VaultError::ItemNotFound)
        }
    }
}
