//! Persisted record layouts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Storage;
use crate::error::Result;

/// Prefix of per-name key records.
pub const KEY_PREFIX: &str = "key/";
/// Entry holding the fingerprint to name map.
pub const INDEX_ENTRY: &str = "keyIDToNameMap";

/// One named key as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Binary private entity with every signature
    #[serde(rename = "SerializedKey", with = "base64_bytes")]
    pub serialized_key: Vec<u8>,
    #[serde(rename = "Exportable", default)]
    pub exportable: bool,
    /// Empty when publication is off
    #[serde(rename = "TransparencyLogAddress", default)]
    pub transparency_log_address: String,
}

impl KeyRecord {
    pub fn storage_key(name: &str) -> String {
        format!("{}{}", KEY_PREFIX, name)
    }

    pub fn load(storage: &dyn Storage, name: &str) -> Result<Option<Self>> {
        match storage.get(&Self::storage_key(name))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, storage: &dyn Storage, name: &str) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;
        storage.put(&Self::storage_key(name), &bytes)
    }

    pub fn log_address(&self) -> Option<&str> {
        if self.transparency_log_address.is_empty() {
            None
        } else {
            Some(&self.transparency_log_address)
        }
    }
}

/// Fingerprint (uppercase hex) to key name.
///
/// Indexes written with lowercase hex are accepted and normalized on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameIndex(BTreeMap<String, String>);

impl NameIndex {
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        let Some(bytes) = storage.get(INDEX_ENTRY)? else {
            return Ok(Self::default());
        };
        let stored: BTreeMap<String, String> = serde_json::from_slice(&bytes)?;
        Ok(Self(
            stored
                .into_iter()
                .map(|(fingerprint, name)| (fingerprint.to_uppercase(), name))
                .collect(),
        ))
    }

    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;
        storage.put(INDEX_ENTRY, &bytes)
    }

    pub fn lookup(&self, fingerprint: &str) -> Option<&str> {
        self.0.get(&fingerprint.to_uppercase()).map(String::as_str)
    }

    /// Point `fingerprint` at `name`, dropping older fingerprints of that name.
    pub fn bind(&mut self, fingerprint: &str, name: &str) {
        self.unbind_name(name);
        self.0.insert(fingerprint.to_uppercase(), name.to_string());
    }

    pub fn unbind_name(&mut self, name: &str) {
        self.0.retain(|_, bound| bound != name);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::MemoryStorage;

    #[test]
    fn test_record_layout() {
        let record = KeyRecord {
            serialized_key: vec![1, 2, 3],
            exportable: true,
            transparency_log_address: String::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["SerializedKey"], "AQID");
        assert_eq!(json["Exportable"], true);
        assert_eq!(json["TransparencyLogAddress"], "");
        assert!(record.log_address().is_none());
    }

    #[test]
    fn test_record_round_trip_through_storage() {
        let storage = MemoryStorage::new();
        assert!(KeyRecord::load(&storage, "missing").unwrap().is_none());

        let record = KeyRecord {
            serialized_key: b"entity".to_vec(),
            exportable: false,
            transparency_log_address: "https://rekor.example".to_string(),
        };
        record.save(&storage, "test").unwrap();
        assert!(storage.get("key/test").unwrap().is_some());
        assert_eq!(KeyRecord::load(&storage, "test").unwrap().unwrap(), record);
    }

    #[test]
    fn test_name_index() {
        let mut index = NameIndex::default();
        index.bind("abcd", "alice");
        assert_eq!(index.lookup("ABCD"), Some("alice"));

        // Rebinding a name drops its previous fingerprint.
        index.bind("ef01", "alice");
        assert_eq!(index.lookup("abcd"), None);
        assert_eq!(index.len(), 1);

        index.unbind_name("alice");
        assert!(index.is_empty());
    }

    #[test]
    fn test_name_index_persistence() {
        let storage = MemoryStorage::new();
        assert!(NameIndex::load(&storage).unwrap().is_empty());

        let mut index = NameIndex::default();
        index.bind("AA", "a");
        index.save(&storage).unwrap();
        assert_eq!(storage.get(INDEX_ENTRY).unwrap().unwrap(), br#"{"AA":"a"}"#);
        assert_eq!(NameIndex::load(&storage).unwrap(), index);
    }

    #[test]
    fn test_name_index_lowercase_entries() {
        let storage = MemoryStorage::new();
        storage
            .put(INDEX_ENTRY, br#"{"48dac4c4cba9fbce":"a","Ab12":"b"}"#)
            .unwrap();

        let mut index = NameIndex::load(&storage).unwrap();
        assert_eq!(index.lookup("48dac4c4cba9fbce"), Some("a"));
        assert_eq!(index.lookup("48DAC4C4CBA9FBCE"), Some("a"));
        assert_eq!(index.lookup("ab12"), Some("b"));

        // Rebinding replaces the lowercase entry instead of shadowing it.
        index.bind("48DAC4C4CBA9FBCE", "c");
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("48dac4c4cba9fbce"), Some("c"));
    }
}
