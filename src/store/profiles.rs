use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::secrets::SecretStore;
use crate::core::profile::{AuthMethod, Profile};
use crate::error::{Error, Result};

fn default_verify_tls() -> bool {
    true
}

/// A profile as written to `profiles.json`. Never carries the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredProfile {
    base_url: String,
    auth_method: AuthMethod,
    #[serde(default = "default_verify_tls")]
    verify_tls: bool,
    #[serde(default)]
    default_list_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProfilesDocument {
    #[serde(default)]
    profiles: BTreeMap<String, StoredProfile>,
    #[serde(default)]
    active: Option<String>,
}

/// Named profiles on disk plus their tokens in the secret store.
pub struct ProfileStore {
    path: PathBuf,
    document: ProfilesDocument,
    secrets: Box<dyn SecretStore>,
}

impl ProfileStore {
    /// Load `path`, or start empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>, secrets: Box<dyn SecretStore>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let document = load_document(&path)?;
        log::debug!(
            "Loaded {} profile(s) from {} (secrets: {})",
            document.profiles.len(),
            path.display(),
            secrets.backend()
        );
        Ok(Self {
            path,
            document,
            secrets,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Profile names in sorted order.
    pub fn list_profiles(&self) -> Vec<String> {
        self.document.profiles.keys().cloned().collect()
    }

    pub fn get_profile(&self, name: &str, include_secret: bool) -> Result<Profile> {
        let stored = self
            .document
            .profiles
            .get(name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))?;
        let token = if include_secret {
            self.secrets.get(&credential_key(name))?
        } else {
            None
        };
        Ok(Profile {
            name: name.to_string(),
            base_url: stored.base_url.clone(),
            auth_method: stored.auth_method,
            verify_tls: stored.verify_tls,
            default_list_id: stored.default_list_id,
            token,
        })
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        if !self.document.profiles.contains_key(name) {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        if self.document.active.as_deref() == Some(name) {
            return Ok(());
        }
        self.document.active = Some(name.to_string());
        log::info!("Active profile is now {}", name);
        self.persist()
    }

    pub fn active_profile_name(&self) -> Option<&str> {
        self.document.active.as_deref()
    }

    pub fn get_active_profile(&self) -> Result<Profile> {
        let name = self
            .active_profile_name()
            .ok_or_else(|| Error::ProfileNotFound("No active profile configured".into()))?;
        self.get_profile(name, true)
    }

    /// Insert or replace a profile. A `None` token clears the stored secret.
    ///
    /// The first profile saved becomes active.
    pub fn save_profile(&mut self, profile: &Profile, token: Option<&str>) -> Result<()> {
        let key = credential_key(&profile.name);
        match token.filter(|t| !t.is_empty()) {
            Some(token) => self.secrets.set(&key, token).map_err(|e| match e {
                Error::SecureStorage(msg) => {
                    Error::SecureStorage(format!("Secure storage unavailable: {}", msg))
                }
                other => other,
            })?,
            None => self.secrets.delete(&key)?,
        }

        self.document.profiles.insert(
            profile.name.clone(),
            StoredProfile {
                base_url: profile.trimmed_base_url().to_string(),
                auth_method: profile.auth_method,
                verify_tls: profile.verify_tls,
                default_list_id: profile.default_list_id,
            },
        );
        if self.document.active.is_none() {
            self.document.active = Some(profile.name.clone());
        }
        log::info!("Saved profile {}", profile.name);
        self.persist()
    }

    /// Delete a profile and its secret. If it was active, another profile
    /// (or none) takes over.
    pub fn remove_profile(&mut self, name: &str) -> Result<()> {
        if self.document.profiles.remove(name).is_none() {
            return Err(Error::ProfileNotFound(name.to_string()));
        }
        self.secrets.delete(&credential_key(name))?;
        if self.document.active.as_deref() == Some(name) {
            self.document.active = self.document.profiles.keys().next().cloned();
        }
        log::info!("Removed profile {}", name);
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.document)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

fn credential_key(profile_name: &str) -> String {
    format!("{}::token", profile_name)
}

fn load_document(path: &Path) -> Result<ProfilesDocument> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ProfilesDocument::default()),
        Err(e) => return Err(e.into()),
    };
    let mut document: ProfilesDocument = serde_json::from_str(&content)?;
    if let Some(active) = &document.active {
        if !document.profiles.contains_key(active) {
            log::warn!("Active profile {} no longer exists, clearing", active);
            document.active = None;
        }
    }
    Ok(document)
}
