use std::{collections::HashMap, path::Path};

use sensei_pssh::KeyId;

use crate::error::SenseiResult;

/// Content keys by key id, loaded once from `keyfile.json`.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    keys: HashMap<KeyId, String>,
}

impl KeyStore {
    /// Loads `{ "<kid>": "<key>" }`. A missing file yields an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> SenseiResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(
                "Key file {} not found, encrypted lectures will fail",
                path.display()
            );
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)?;
        let store = Self::from_json(&data)?;
        tracing::info!("Loaded {} keys from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn from_json(data: &str) -> SenseiResult<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(data)?;
        Ok(raw.into_iter().collect())
    }

    pub fn get(&self, kid: &KeyId) -> Option<&str> {
        self.keys.get(kid).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for KeyStore {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let keys = iter
            .into_iter()
            .map(|(kid, key)| {
                (
                    KeyId::from_hex(kid),
                    key.as_ref().trim().to_ascii_lowercase(),
                )
            })
            .collect();
        Self { keys }
    }
}
