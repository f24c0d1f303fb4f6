use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::Error;

/// Get/set/delete of secrets by key. Keys look like `<profile>::token`.
pub trait SecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;
    fn set(&self, key: &str, secret: &str) -> Result<(), Error>;
    fn delete(&self, key: &str) -> Result<(), Error>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Pick a backend for this platform, falling back to memory.
pub fn detect(service_name: &str) -> Box<dyn SecretStore> {
    match platform_store(service_name) {
        Ok(store) => {
            log::info!("Using {} for secrets", store.backend());
            store
        }
        Err(e) => {
            log::warn!("{}; secrets kept in memory", e);
            Box::new(MemoryStore::new())
        }
    }
}

#[cfg(target_os = "linux")]
fn platform_store(service_name: &str) -> Result<Box<dyn SecretStore>, Error> {
    Ok(Box::new(KeyringStore::connect(service_name)?))
}

#[cfg(target_os = "macos")]
fn platform_store(service_name: &str) -> Result<Box<dyn SecretStore>, Error> {
    Ok(Box::new(MacKeychainStore::new(service_name)))
}

#[cfg(windows)]
fn platform_store(service_name: &str) -> Result<Box<dyn SecretStore>, Error> {
    Ok(Box::new(WindowsCredentialStore::new(service_name)))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn platform_store(_service_name: &str) -> Result<Box<dyn SecretStore>, Error> {
    Err(Error::SecureStorage(
        "No secure storage backend for this platform".into(),
    ))
}

/// Credential Manager target name for a key, e.g. `vikunja_flow:home::token`.
#[cfg_attr(not(windows), allow(dead_code))]
fn credential_target(service: &str, key: &str) -> String {
    format!("{}:{}", service, key)
}

/// Process-local secrets. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    secrets: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, Error> {
        self.secrets
            .lock()
            .map_err(|_| Error::SecureStorage("In-memory secret store poisoned".into()))
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, secret: &str) -> Result<(), Error> {
        self.lock()?.insert(key.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Secret Service keyring (GNOME Keyring, KWallet) through `oo7`.
///
/// `oo7` is async; each call runs to completion on a private
/// current-thread runtime.
#[cfg(target_os = "linux")]
pub struct KeyringStore {
    service: String,
    runtime: tokio::runtime::Runtime,
}

#[cfg(target_os = "linux")]
impl KeyringStore {
    pub fn connect(service_name: &str) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::SecureStorage(format!("Failed to start keyring runtime: {}", e)))?;
        let store = Self {
            service: service_name.to_string(),
            runtime,
        };
        // Probe once so a missing daemon is noticed at start-up.
        store.keyring()?;
        Ok(store)
    }

    fn keyring(&self) -> Result<oo7::Keyring, Error> {
        self.runtime
            .block_on(oo7::Keyring::new())
            .map_err(|e| Error::SecureStorage(format!("Failed to connect to keyring: {}", e)))
    }

    fn attributes<'a>(&'a self, key: &'a str) -> HashMap<&'a str, &'a str> {
        let mut attrs = HashMap::new();
        attrs.insert("service", self.service.as_str());
        attrs.insert("account", key);
        attrs
    }
}

#[cfg(target_os = "linux")]
impl SecretStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let keyring = self.keyring()?;
        let attrs = self.attributes(key);
        self.runtime.block_on(async {
            let items = keyring
                .search_items(&attrs)
                .await
                .map_err(|e| Error::SecureStorage(format!("Failed to search keyring: {}", e)))?;
            let Some(item) = items.first() else {
                return Ok(None);
            };
            let secret_bytes = item
                .secret()
                .await
                .map_err(|e| Error::SecureStorage(format!("Failed to read secret: {}", e)))?;
            let secret = String::from_utf8(secret_bytes.to_vec())
                .map_err(|e| Error::SecureStorage(format!("Invalid UTF-8 in secret: {}", e)))?;
            Ok(Some(secret).filter(|s| !s.is_empty()))
        })
    }

    fn set(&self, key: &str, secret: &str) -> Result<(), Error> {
        let keyring = self.keyring()?;
        let attrs = self.attributes(key);
        let label = format!("{} token ({})", self.service, key);
        self.runtime.block_on(async {
            keyring
                .create_item(&label, &attrs, secret.as_bytes(), true)
                .await
                .map_err(|e| Error::SecureStorage(format!("Failed to store secret: {}", e)))
        })
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        let keyring = self.keyring()?;
        let attrs = self.attributes(key);
        self.runtime.block_on(async {
            let items = keyring
                .search_items(&attrs)
                .await
                .map_err(|e| Error::SecureStorage(format!("Failed to search keyring: {}", e)))?;
            for item in items {
                item.delete()
                    .await
                    .map_err(|e| Error::SecureStorage(format!("Failed to delete secret: {}", e)))?;
            }
            Ok(())
        })
    }

    fn backend(&self) -> &'static str {
        "secret-service"
    }
}

/// macOS login keychain via the `security` tool.
pub struct MacKeychainStore {
    service: String,
}

impl MacKeychainStore {
    pub fn new(service_name: &str) -> Self {
        Self {
            service: service_name.to_string(),
        }
    }

    fn security(&self, args: &[&str]) -> Result<std::process::Output, Error> {
        std::process::Command::new("security")
            .args(args)
            .output()
            .map_err(|e| Error::SecureStorage(format!("Failed to run security: {}", e)))
    }
}

impl SecretStore for MacKeychainStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let output = self.security(&["find-generic-password", "-a", key, "-s", &self.service, "-w"])?;
        if !output.status.success() {
            return Ok(None);
        }
        let secret = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(secret).filter(|s| !s.is_empty()))
    }

    fn set(&self, key: &str, secret: &str) -> Result<(), Error> {
        let output = self.security(&[
            "add-generic-password",
            "-a",
            key,
            "-s",
            &self.service,
            "-w",
            secret,
            "-U",
        ])?;
        if !output.status.success() {
            return Err(Error::SecureStorage(format!(
                "security add-generic-password failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        // A missing item is not an error.
        self.security(&["delete-generic-password", "-a", key, "-s", &self.service])?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "macos-keychain"
    }
}

/// Windows Credential Manager, one generic credential per key.
#[cfg(windows)]
pub struct WindowsCredentialStore {
    service: String,
}

#[cfg(windows)]
impl WindowsCredentialStore {
    pub fn new(service_name: &str) -> Self {
        Self {
            service: service_name.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, Error> {
        keyring::Entry::new_with_target(&credential_target(&self.service, key), &self.service, key)
            .map_err(|e| Error::SecureStorage(format!("Invalid credential {}: {}", key, e)))
    }
}

#[cfg(windows)]
impl SecretStore for WindowsCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(secret).filter(|s| !s.is_empty())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::SecureStorage(format!("CredReadW failed: {}", e))),
        }
    }

    fn set(&self, key: &str, secret: &str) -> Result<(), Error> {
        self.entry(key)?
            .set_password(secret)
            .map_err(|e| Error::SecureStorage(format!("CredWriteW failed: {}", e)))
    }

    fn delete(&self, key: &str) -> Result<(), Error> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::SecureStorage(format!("CredDeleteW failed: {}", e))),
        }
    }

    fn backend(&self) -> &'static str {
        "windows-credential"
    }
}
